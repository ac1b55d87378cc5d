//! Error types for the extraction pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for pass and process level operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors scoped to a single certificate record.
///
/// The record is skipped and the pass continues with the next one.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A required field is absent or not a string
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A payload is not valid base64
    #[error("base64 decode error in `{field}`: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A decoded payload is not UTF-8 text
    #[error("decoded `{field}` is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// A domain name cannot be used as a single path component
    #[error("unusable domain name `{0}`")]
    UnsafeName(String),
}

/// Errors that abort a pass or the whole process.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A required root directory could not be created
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The ACME document does not exist
    #[error("ACME file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The ACME document could not be read
    #[error("failed to read ACME file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The ACME document is not valid JSON
    #[error("ACME file {} is not valid JSON: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A certificate collection has a shape key normalization cannot handle
    #[error("unsupported document shape at `{location}`: expected a list, found {found}")]
    UnsupportedShape { location: String, found: &'static str },

    /// Output could not be written; partial output is no longer trustworthy
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file watcher could not be set up
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Termination signal handlers could not be registered
    #[error("failed to register signal handler: {0}")]
    Signal(#[source] io::Error),
}

impl ExtractError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExtractError::CreateRoot { .. } => 1,
            ExtractError::SourceMissing(_) => 2,
            ExtractError::Read { .. } | ExtractError::InvalidJson { .. } => 3,
            ExtractError::UnsupportedShape { .. } => 4,
            ExtractError::WriteFailure { .. } => 5,
            ExtractError::Watch(_) | ExtractError::Signal(_) => 6,
        }
    }

    /// Whether the watch loop may log this error and wait for the next change.
    ///
    /// Write failures always terminate the process.
    pub fn is_pass_fatal_only(&self) -> bool {
        matches!(
            self,
            ExtractError::SourceMissing(_)
                | ExtractError::Read { .. }
                | ExtractError::InvalidJson { .. }
                | ExtractError::UnsupportedShape { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            ExtractError::CreateRoot {
                path: "/x".into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
            ExtractError::SourceMissing("/acme/acme.json".into()),
            ExtractError::InvalidJson {
                path: "/acme/acme.json".into(),
                source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            },
            ExtractError::UnsupportedShape {
                location: "Certificates".into(),
                found: "object",
            },
            ExtractError::WriteFailure {
                path: "/certs/x".into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        ];
        let codes: Vec<u8> = errors.iter().map(ExtractError::exit_code).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_write_failure_is_process_fatal() {
        let err = ExtractError::WriteFailure {
            path: "/certs/x".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!err.is_pass_fatal_only());
        assert!(ExtractError::SourceMissing("/a".into()).is_pass_fatal_only());
    }
}
