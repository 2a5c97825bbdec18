//! Error types shared across the engine

use thiserror::Error;

/// Errors produced while loading catalog data or evaluating a request
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request failed validation before any product was evaluated
    #[error("{0}")]
    InvalidInput(String),

    /// Rule predicate JSON is structurally invalid
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// A catalog file contained a value outside its enumeration
    #[error("unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        EngineError::UnknownValue { kind, value: value.into() }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_displays_message_verbatim() {
        let err = EngineError::InvalidInput("Invalid client age: must be between 0 and 120".into());
        assert_eq!(err.to_string(), "Invalid client age: must be between 0 and 120");
    }

    #[test]
    fn test_unknown_value_message() {
        let err = EngineError::unknown("gender", "X");
        assert_eq!(err.to_string(), "unknown gender: X");
    }
}
