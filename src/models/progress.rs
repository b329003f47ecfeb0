// src/models/progress.rs

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::Question;

/// Represents one row of the 'progress' collection: the resumable state of an
/// identity's in-flight attempt. At most one row exists per email.
///
/// Every field defaults, because rows written before question sets were
/// persisted carry neither `questions` nor (sometimes) `visited`. A body
/// without `email` reads as an empty one and is rejected by the handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub email: String,

    /// The session's question set, options in their displayed order.
    /// Empty for legacy rows.
    #[serde(default)]
    pub questions: Vec<Question>,

    /// One slot per question; `None` means unanswered.
    #[serde(default)]
    pub answers: Vec<Option<String>>,

    #[serde(default)]
    pub index: usize,

    #[serde(default)]
    pub visited: BTreeSet<usize>,

    #[serde(default)]
    pub marked: BTreeSet<usize>,

    /// When the attempt started, as epoch milliseconds on the wire.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,

    /// Stamped by the server on every save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressSnapshot {
    /// A row written before question sets were persisted alongside progress.
    pub fn is_legacy(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Marker returned when an identity has no live progress row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyProgress {
    pub empty: bool,
}

/// Result of loading progress: either the snapshot or an explicit
/// `{"empty": true}` marker, never `null`.
///
/// `Empty` is tried first: a snapshot body has defaults for every field and
/// would otherwise swallow the marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressLoad {
    Empty(EmptyProgress),
    Snapshot(ProgressSnapshot),
}

impl ProgressLoad {
    pub fn empty() -> Self {
        ProgressLoad::Empty(EmptyProgress { empty: true })
    }

    pub fn into_snapshot(self) -> Option<ProgressSnapshot> {
        match self {
            ProgressLoad::Snapshot(snapshot) => Some(snapshot),
            ProgressLoad::Empty(_) => None,
        }
    }
}

impl From<Option<ProgressSnapshot>> for ProgressLoad {
    fn from(found: Option<ProgressSnapshot>) -> Self {
        found.map_or_else(ProgressLoad::empty, ProgressLoad::Snapshot)
    }
}

/// Query string shared by the progress and attempts routes.
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}
