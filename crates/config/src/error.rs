//! Error types for configuration parsing and validation.

use thiserror::Error;

/// Errors raised while building or validating an [`ExtractConfig`](crate::ExtractConfig).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A boolean option held something other than a truth word
    #[error("invalid truth value: {0:?}")]
    InvalidBool(String),

    /// A color option was not a valid SGR parameter list
    #[error("invalid ANSI color code: {0:?}")]
    InvalidColor(String),

    /// The chain delimiter must not be empty
    #[error("chain delimiter must not be empty")]
    EmptyDelimiter,

    /// The wildcard token must be a single, non-empty path component
    #[error("invalid wildcard replacement token: {0:?}")]
    InvalidWildcardToken(String),

    /// The ACME file name must name a file, not a path
    #[error("invalid ACME file name: {0:?}")]
    InvalidAcmeFile(String),
}
