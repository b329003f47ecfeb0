pub mod clock;
pub mod cookie;
pub mod html;
pub mod jwt;
pub mod password;
