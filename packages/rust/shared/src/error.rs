//! Error types for buildconf.
//!
//! Library crates use [`BuildConfError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all buildconf operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildConfError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The job template file does not exist.
    #[error("job template not found: {path:?}")]
    TemplateNotFound { path: PathBuf },

    /// A template or live job document is not well-formed.
    #[error("document parse error: {message}")]
    DocumentParse { message: String },

    /// A path expression could not be evaluated.
    #[error("query error in `{expression}`: {message}")]
    Query { expression: String, message: String },

    /// A required anchor element is missing from a job document.
    #[error("required element missing from job document: {path}")]
    MissingAnchor { path: String },

    /// The job repository rejected a create/update/delete request.
    #[error("job repository error: {message}")]
    RepositoryAdapter { message: String },

    /// The job does not exist in the job repository.
    #[error("job not found: {name}")]
    JobNotFound { name: String },

    /// The agent descriptor could not be written.
    #[error("failed to write agent descriptor {path:?}: {message}")]
    DescriptorWrite { path: PathBuf, message: String },

    /// Serialization of a model or descriptor failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BuildConfError>;

impl BuildConfError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a document parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::DocumentParse {
            message: msg.into(),
        }
    }

    /// Create a query error for the given path expression.
    pub fn query(expression: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Query {
            expression: expression.into(),
            message: msg.into(),
        }
    }

    /// Create a job repository error from any displayable message.
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::RepositoryAdapter {
            message: msg.into(),
        }
    }

    /// Create a serialization error from any displayable message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
