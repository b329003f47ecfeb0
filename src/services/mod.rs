pub mod history;
pub mod progress;
pub mod question_source;
pub mod scoring;

pub use history::HistoryService;
pub use progress::ProgressService;
pub use question_source::{OpenTdbProvider, QuestionProvider, QuestionSource};
pub use scoring::ScoringService;
