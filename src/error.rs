//! Custom error types for peoplelint.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, LintError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for peoplelint operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum LintError {
    /// Raw text could not be recovered into JSON even after the aggressive pass.
    ///
    /// Carries the parser's 1-based position and a snippet of the pre-cleaned
    /// text around the failure point so the corruption can be located in the
    /// source paste.
    #[error("JSON parse failed even after aggressive pre-clean. line={line} col={column} around: {snippet}")]
    Recovery {
        /// 1-based line of the parse failure
        line: usize,
        /// 1-based column of the parse failure
        column: usize,
        /// Text window around the failure point
        snippet: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `LintError`
pub type Result<T> = std::result::Result<T, LintError>;
