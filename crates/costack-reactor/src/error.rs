//! Error types for the reactor and the cooperative socket wrappers

use core::fmt;
use nix::errno::Errno;

/// Result type for reactor operations
pub type ReactorResult<T> = Result<T, ReactorError>;

/// Errors from the reactor and the cooperative I/O wrappers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorError {
    /// An OS call failed
    Os(Errno),

    /// The reactor was shut down while the operation was blocked
    Stopped,
}

impl fmt::Display for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactorError::Os(errno) => write!(f, "os error: {errno}"),
            ReactorError::Stopped => write!(f, "reactor stopped"),
        }
    }
}

impl std::error::Error for ReactorError {}

impl From<Errno> for ReactorError {
    fn from(errno: Errno) -> Self {
        ReactorError::Os(errno)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ReactorError::Stopped.to_string(), "reactor stopped");
        assert!(ReactorError::Os(Errno::EAGAIN).to_string().contains("EAGAIN"));
    }
}
