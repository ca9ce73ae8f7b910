//! Error types for the VedDB client core.
//!
//! Every failure carries a human-readable message. Errors caused by user input
//! or by the remote database are returned (or recorded into history) at the
//! operation boundary; only broken invariants surface as [`VeddbError::Internal`].

use thiserror::Error;

/// Convenience alias used across the crate.
pub type VeddbResult<T> = Result<T, VeddbError>;

/// Main error type for the VedDB client core.
#[derive(Debug, Error)]
pub enum VeddbError {
    /// A required field is missing or malformed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Name of the offending field, if known.
        field: Option<String>,
    },

    /// A file or serialized query is structurally invalid.
    #[error("Format error: {message}")]
    Format {
        /// Human-readable error message.
        message: String,
    },

    /// A structured-text edit does not parse. Recoverable.
    #[error("Parse error: {message}")]
    Parse {
        /// Parser message.
        message: String,
        /// Line of the failure (1-indexed).
        line: Option<usize>,
        /// Column of the failure (1-indexed).
        column: Option<usize>,
    },

    /// Operation is not valid in the current state.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Human-readable error message.
        message: String,
    },

    /// The remote query call failed.
    #[error("{message}")]
    Transport {
        /// Message reported by the transport.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Writing a portable connection file failed.
    #[error("Encoding error: {message}")]
    Encoding {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local durable storage error.
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected internal error (broken invariant).
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl VeddbError {
    // ========== Constructors ==========

    /// Create a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a new validation error for a named field.
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a new format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format { message: message.into() }
    }

    /// Create a parse error without a position.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into(), line: None, column: None }
    }

    /// Create a parse error from a `serde_json` failure, keeping its position.
    pub fn parse_json(err: &serde_json::Error) -> Self {
        let (line, column) = if err.line() == 0 {
            (None, None)
        } else {
            (Some(err.line()), Some(err.column()))
        };
        Self::Parse { message: err.to_string(), line, column }
    }

    /// Create a new invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Create a new transport error with source.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding { message: message.into(), source: None }
    }

    /// Create a new encoding error with source.
    pub fn encoding_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Encoding { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new storage error.
    pub fn storage(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self::Storage { message: message.into(), hint: hint.map(String::from), source: None }
    }

    /// Create a new storage error with source.
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage { message: message.into(), hint: None, source: Some(Box::new(source)) }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    // ========== Methods ==========

    /// Check if this error is a recoverable structured-text parse failure.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Check if this error is a validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error is a format failure.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// Check if this error was raised because of the current state.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Validation",
            Self::Format { .. } => "Format",
            Self::Parse { .. } => "Parse",
            Self::InvalidState { .. } => "State",
            Self::Transport { .. } => "Transport",
            Self::Encoding { .. } => "Encoding",
            Self::Storage { .. } => "Storage",
            Self::Config { .. } => "Config",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Validation { .. } => Some("Fill in the required fields and try again"),
            Self::Format { .. } => Some("The file is not a valid VedDB connection file"),
            Self::Parse { .. } => Some("Fix the query text or discard the edit"),
            Self::InvalidState { .. } => None,
            Self::Transport { .. } => Some("Check that the database server is reachable"),
            Self::Encoding { .. } => Some("Check the destination path and permissions"),
            Self::Storage { hint, .. } => hint.as_deref(),
            Self::Config { .. } => None,
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }

    /// Get the position of a parse failure (if applicable).
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Self::Parse { line: Some(line), column: Some(column), .. } => Some((*line, *column)),
            _ => None,
        }
    }

    /// Convert to user-displayable error info.
    pub fn to_error_info(&self) -> ErrorInfo {
        let error_type = format!("{} Error", self.category());
        let message = self.to_string();
        let hint = self.hint().map(String::from);

        let technical_detail = match self {
            Self::Parse { line: Some(line), column: Some(column), .. } => {
                Some(format!("Line: {line}\nColumn: {column}"))
            }
            Self::Validation { field: Some(field), .. } => Some(format!("Field: {field}")),
            _ => None,
        };

        ErrorInfo { error_type, message, hint, technical_detail }
    }
}

/// User-displayable error information.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Category name (e.g., "Parse Error").
    pub error_type: String,
    /// User-friendly message.
    pub message: String,
    /// Actionable suggestion.
    pub hint: Option<String>,
    /// Technical detail for "Show Details" expansion.
    pub technical_detail: Option<String>,
}

// ========== Error Conversions ==========

/// Convert from rusqlite::Error to VeddbError.
impl From<rusqlite::Error> for VeddbError {
    fn from(err: rusqlite::Error) -> Self {
        VeddbError::Storage {
            message: err.to_string(),
            hint: Some("The local database may be corrupted".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from std::io::Error to VeddbError.
impl From<std::io::Error> for VeddbError {
    fn from(err: std::io::Error) -> Self {
        VeddbError::Storage {
            message: err.to_string(),
            hint: Some("Check file permissions and disk space".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from serde_json::Error to VeddbError.
impl From<serde_json::Error> for VeddbError {
    fn from(err: serde_json::Error) -> Self {
        VeddbError::Storage {
            message: format!("JSON error: {err}"),
            hint: Some("Data may be corrupted".to_string()),
            source: Some(Box::new(err)),
        }
    }
}
