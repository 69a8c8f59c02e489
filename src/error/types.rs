use thiserror::Error;

use crate::logging::LoggingError;

/// Unified result type for the navigation engine.
pub type Result<T> = std::result::Result<T, NavError>;

/// Programmer errors rejected at construction time.
///
/// Soft navigation failures (popping an empty stack, pushing before mount,
/// popping to a route that is not on the stack) never surface here; they are
/// absorbed as no-ops or deferred by the component that receives them.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("route path `{0}` is declared more than once")]
    DuplicateRoutePath(String),
    #[error("navigation stack `{0}` is declared more than once")]
    DuplicateStack(String),
    #[error("identifier must not be empty")]
    EmptyIdentifier,
    #[error("navigation stack `{0}` not found")]
    UnknownStack(String),
    #[error("invalid routing command: {0}")]
    InvalidCommand(String),
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Logging(#[from] LoggingError),
}
