//! Unified error hierarchy for lapfix
//!
//! Each stage of the pipeline has its own error enum; `LapfixError` wraps them
//! so callers can propagate with `?` and still inspect what went wrong.

use std::path::PathBuf;
use thiserror::Error;

use crate::export::ExportError;

/// Top-level error type for all lapfix operations
#[derive(Debug, Error)]
pub enum LapfixError {
    /// Document reading errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Lap summary extraction errors
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Lap edit errors
    #[error("Edit error: {0}")]
    Edit(#[from] EditError),

    /// Corrected stream generation errors
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors raised while reading an activity document
#[derive(Debug, Error)]
pub enum ImportError {
    /// File not found at specified path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Unsupported format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// The document is not well-formed XML
    #[error("Malformed document at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    /// An element carried text that could not be interpreted
    #[error("Invalid value in {element}: {value:?}")]
    InvalidValue { element: String, value: String },

    /// The document contains no laps
    #[error("Document contains no laps")]
    NoLaps,
}

/// Errors raised while deriving lap summaries from recorded laps
#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    /// A required per-lap field is absent
    #[error("Lap {lap_number} is missing required field {field}")]
    MissingField { lap_number: u32, field: &'static str },

    /// A required per-lap field is not a finite, non-negative number
    #[error("Lap {lap_number} has invalid {field}: {value}")]
    InvalidField {
        lap_number: u32,
        field: &'static str,
        value: f64,
    },
}

/// Errors raised by edit operations. State is left unchanged when returned.
#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    /// No lap with the given number exists in the session
    #[error("Unknown lap: {lap_number}")]
    UnknownLap { lap_number: u32 },

    /// Bulk edit selected no laps
    #[error("No laps selected")]
    EmptySelection,

    /// Bulk edit supplied no value on either axis
    #[error("No value supplied for speed, distance, incline or elevation")]
    NoValues,

    /// Both members of an axis pair were supplied
    #[error("Conflicting values: {first} and {second} cannot be combined")]
    ConflictingValues {
        first: &'static str,
        second: &'static str,
    },

    /// A non-finite value was supplied
    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

/// Errors raised while generating the corrected sample stream
#[derive(Debug, Error, PartialEq)]
pub enum SynthesisError {
    /// Lap summaries and document timeline disagree on lap count
    #[error("Lap count mismatch: {summaries} lap summaries but {timeline} laps in document")]
    LapCountMismatch { summaries: usize, timeline: usize },
}

/// Result type alias for lapfix operations
pub type Result<T> = std::result::Result<T, LapfixError>;

impl LapfixError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, LapfixError::Io(_))
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LapfixError::Edit(_) => ErrorSeverity::Warning,
            LapfixError::Validation(_) => ErrorSeverity::Warning,
            LapfixError::Import(ImportError::FileNotFound { .. }) => ErrorSeverity::Warning,
            LapfixError::Synthesis(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            LapfixError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find activity file: {}", path.display())
            }
            LapfixError::Import(ImportError::Malformed { .. }) => {
                "The activity file is not a valid TCX document.".to_string()
            }
            LapfixError::Extract(ExtractError::MissingField { lap_number, field }) => {
                format!(
                    "Lap {} has no {} element. The activity file appears to be damaged.",
                    lap_number, field
                )
            }
            LapfixError::Edit(EditError::EmptySelection) => {
                "Please select at least one lap.".to_string()
            }
            LapfixError::Edit(EditError::NoValues) => {
                "Please enter a value to update.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Internal inconsistency that indicates a bug in the caller
    Critical,
    /// Error that prevents the operation
    Error,
    /// Rejected input; re-issuing a corrected call succeeds
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
