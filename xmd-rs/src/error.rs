//! Error types shared across the crate.
//!
//! Parsing never aborts: problems are collected as [`ParseError`]s and the
//! offending line is skipped.  Evaluation failures travel as [`EvalError`]
//! until they are caught by `try`/`catch` or reach the top of the program.

use thiserror::Error;

use crate::config::ConfigError;

/// A recoverable syntax problem.  The parser records it and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }
}

/// An evaluation failure.  `Display` yields the bare message, which is what
/// a `catch` variable receives.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        EvalError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for EvalError {
    fn from(s: String) -> Self {
        EvalError(s)
    }
}

impl From<&str> for EvalError {
    fn from(s: &str) -> Self {
        EvalError(s.to_owned())
    }
}

/// Top-level error used by the document processor and the CLI.
#[derive(Debug, Error)]
pub enum XmdError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config {0}")]
    Config(#[from] ConfigError),

    #[error("parse error at {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Eval(#[from] EvalError),
}

pub type Result<T> = std::result::Result<T, XmdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_error_displays_bare_message() {
        assert_eq!(EvalError::new("boom").to_string(), "boom");
    }

    #[test]
    fn parse_error_display_has_position() {
        let e = ParseError::new(3, 7, "unterminated string");
        assert_eq!(e.to_string(), "3:7: unterminated string");
    }

    #[test]
    fn xmd_error_wraps_eval() {
        let e: XmdError = EvalError::new("bad").into();
        assert_eq!(e.to_string(), "bad");
    }
}
