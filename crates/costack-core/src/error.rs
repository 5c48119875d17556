//! Error types for the costack engine

use core::fmt;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Engine has not been started yet (no stack anchor recorded)
    NotStarted,

    /// Engine is already running a routine section
    AlreadyStarted,

    /// No routine slots available (configured cap reached)
    RoutineLimit,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotStarted => write!(f, "engine not started"),
            EngineError::AlreadyStarted => write!(f, "engine already started"),
            EngineError::RoutineLimit => write!(f, "no routine slots available"),
        }
    }
}

impl std::error::Error for EngineError {}
