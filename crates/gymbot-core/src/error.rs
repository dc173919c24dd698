use thiserror::Error;

/// Errors shared across the gymbot crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown weekday: {0}")]
    InvalidWeekday(String),

    #[error("Invalid time (expected HH:MM): {0}")]
    InvalidTime(String),

    #[error("Unknown center: {0}")]
    UnknownCenter(String),

    #[error("Unknown class: {0}")]
    UnknownClass(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
