//! Configuration for the ACME certificate extractor
//!
//! The extractor reads a single immutable [`ExtractConfig`], built once at
//! startup from the environment and command line, and shared read-only with
//! every pipeline stage.
//!
//! # Example
//!
//! ```
//! use acme_extract_config::ExtractConfig;
//!
//! let config = ExtractConfig {
//!     certs_dir: "/srv/certs".into(),
//!     domain_allow_list: vec!["example.com".to_string()],
//!     ..Default::default()
//! };
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.sanitize("*.Example.com"), "STAR.example.com");
//! assert!(!config.is_allowed("other.com"));
//! ```

mod colors;
mod error;
mod parse;
mod validate;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use colors::{AnsiColor, ColorScheme};
pub use error::ConfigError;
pub use parse::{parse_bool, parse_domain_list};

/// Default name of the ACME state file
pub const DEFAULT_ACME_FILE: &str = "acme.json";

/// Default directory holding the ACME state file
pub const DEFAULT_ACME_DIR: &str = "/acme";

/// Default output root for extracted certificates
pub const DEFAULT_CERTS_DIR: &str = "/certs";

/// Default working directory of the container image
pub const DEFAULT_WORK_DIR: &str = "/certs_extract";

/// Default replacement for `*` in wildcard domain names
pub const DEFAULT_WILDCARD_TOKEN: &str = "STAR";

/// Marker that begins every PEM certificate block
pub const DEFAULT_CHAIN_DELIMITER: &str = "-----BEGIN CERTIFICATE-----";

/// Root configuration for the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// File name of the ACME state document
    pub acme_file: String,

    /// Directory containing the ACME state document
    pub acme_dir: PathBuf,

    /// Output root for extracted certificates
    pub certs_dir: PathBuf,

    /// Working directory (informational; the pipeline never writes here)
    pub work_dir: PathBuf,

    /// Token substituted for `*` in wildcard names
    pub wildcard_token: String,

    /// Marker used to split the leaf certificate from its issuer chain
    pub chain_delimiter: String,

    /// When non-empty, only records whose primary name is listed are extracted
    pub domain_allow_list: Vec<String>,

    /// Verbose logging
    pub debug: bool,

    /// Write `flat/<name>.*` files next to the per-domain directories
    pub flat_enabled: bool,

    /// Keep timestamped copies under `archive/<name>/<timestamp>`
    pub archive_enabled: bool,

    /// Log level colors
    pub colors: ColorScheme,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            acme_file: DEFAULT_ACME_FILE.to_string(),
            acme_dir: PathBuf::from(DEFAULT_ACME_DIR),
            certs_dir: PathBuf::from(DEFAULT_CERTS_DIR),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            wildcard_token: DEFAULT_WILDCARD_TOKEN.to_string(),
            chain_delimiter: DEFAULT_CHAIN_DELIMITER.to_string(),
            domain_allow_list: Vec::new(),
            debug: false,
            flat_enabled: true,
            archive_enabled: true,
            colors: ColorScheme::default(),
        }
    }
}

impl ExtractConfig {
    /// Full path of the ACME state document
    pub fn acme_path(&self) -> PathBuf {
        self.acme_dir.join(&self.acme_file)
    }

    /// Make a domain name safe to use as a path component.
    ///
    /// Lower-cases the name and replaces every `*` with the wildcard token.
    pub fn sanitize(&self, name: &str) -> String {
        name.to_lowercase().replace('*', &self.wildcard_token)
    }

    /// Whether records for `name` should be extracted.
    ///
    /// An empty allow-list admits every name. Matching is exact.
    pub fn is_allowed(&self, name: &str) -> bool {
        self.domain_allow_list.is_empty() || self.domain_allow_list.iter().any(|d| d == name)
    }
}
