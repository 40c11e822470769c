//! Common error types for the smart-garden services

use thiserror::Error;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by all crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_missing() -> Result<String> {
        Ok(std::fs::read_to_string("/nonexistent/huerto/config.toml")?)
    }

    #[test]
    fn test_io_error_converts_with_question_mark() {
        let err = read_missing().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO error: "));
    }

    #[test]
    fn test_messages_carry_context() {
        assert_eq!(
            Error::Config("Parse TOML failed: bad key".to_string()).to_string(),
            "Configuration error: Parse TOML failed: bad key"
        );
        assert_eq!(
            Error::Internal("Invalid cached Estado 7".to_string()).to_string(),
            "Internal error: Invalid cached Estado 7"
        );
    }
}
