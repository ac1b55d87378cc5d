//! Output file layout.
//!
//! ```text
//! certs/<name>/{privkey.pem,cert.pem,chain.pem,fullchain.pem}
//! flat/<name>.key
//! flat/<name>.crt
//! flat/<name>.chain.pem
//! flat/<name>_full.crt
//! archive/<name>/<YYYYMMDDHHMMSS>/{privkey.pem,cert.pem,chain.pem,fullchain.pem}
//! ```
//!
//! `<name>` is the sanitized domain: lower-cased, `*` replaced by the
//! configured wildcard token.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use acme_extract_config::ExtractConfig;

use crate::record::{CertificateRecord, SourceField};

/// Per-domain directories
pub const CERTS_DIR: &str = "certs";
/// Shared directory with domain-prefixed file names
pub const FLAT_DIR: &str = "flat";
/// Timestamped copies
pub const ARCHIVE_DIR: &str = "archive";

/// File name of the full chain inside a per-domain directory
pub const FULLCHAIN_FILE: &str = "fullchain.pem";

/// Archive directory timestamp, sortable and second-granular
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const DOMAIN_FILES: [(&str, SourceField); 4] = [
    ("privkey.pem", SourceField::Pkey),
    ("cert.pem", SourceField::Crt),
    ("chain.pem", SourceField::Chain),
    (FULLCHAIN_FILE, SourceField::Full),
];

/// A single file to write, relative to the certificates root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    pub relative_directory: PathBuf,
    pub filename: String,
    pub source_field: SourceField,
}

impl FileTarget {
    /// Path relative to the certificates root.
    pub fn relative_path(&self) -> PathBuf {
        self.relative_directory.join(&self.filename)
    }
}

/// Which optional layouts are enabled; per-domain directories always are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
    pub flat_enabled: bool,
    pub archive_enabled: bool,
}

impl From<&ExtractConfig> for LayoutOptions {
    fn from(config: &ExtractConfig) -> Self {
        Self {
            flat_enabled: config.flat_enabled,
            archive_enabled: config.archive_enabled,
        }
    }
}

/// Directory → file name → source field for one record.
///
/// Colliding directories merge; a file planned twice keeps the last field,
/// which is harmless because every entry comes from the same record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutPlan {
    dirs: BTreeMap<PathBuf, BTreeMap<String, SourceField>>,
}

impl LayoutPlan {
    fn insert(&mut self, dir: PathBuf, filename: String, field: SourceField) {
        self.dirs.entry(dir).or_default().insert(filename, field);
    }

    /// Planned directories, sorted.
    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        self.dirs.keys().map(PathBuf::as_path)
    }

    /// Every planned file.
    pub fn targets(&self) -> impl Iterator<Item = FileTarget> + '_ {
        self.dirs.iter().flat_map(|(dir, files)| {
            files.iter().map(move |(filename, field)| FileTarget {
                relative_directory: dir.clone(),
                filename: filename.clone(),
                source_field: *field,
            })
        })
    }

    /// Number of planned files.
    pub fn len(&self) -> usize {
        self.dirs.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

/// Computes the files a record expands to.
#[derive(Debug, Clone)]
pub struct LayoutPlanner<F> {
    sanitize: F,
    options: LayoutOptions,
}

impl<F> LayoutPlanner<F>
where
    F: Fn(&str) -> String,
{
    pub fn new(sanitize: F, options: LayoutOptions) -> Self {
        Self { sanitize, options }
    }

    /// Plan all targets for `record`, stamping archives with `now`.
    pub fn plan(&self, record: &CertificateRecord, now: DateTime<Local>) -> LayoutPlan {
        let mut plan = LayoutPlan::default();
        let stamp = now.format(ARCHIVE_TIMESTAMP_FORMAT).to_string();

        for name in record.names() {
            let name = (self.sanitize)(name);

            let domain_dir = Path::new(CERTS_DIR).join(&name);
            for (file, field) in DOMAIN_FILES {
                plan.insert(domain_dir.clone(), file.to_string(), field);
            }

            if self.options.flat_enabled {
                let flat_dir = PathBuf::from(FLAT_DIR);
                plan.insert(flat_dir.clone(), format!("{name}.key"), SourceField::Pkey);
                plan.insert(flat_dir.clone(), format!("{name}.crt"), SourceField::Crt);
                plan.insert(flat_dir.clone(), format!("{name}.chain.pem"), SourceField::Chain);
                plan.insert(flat_dir, format!("{name}_full.crt"), SourceField::Full);
            }

            if self.options.archive_enabled {
                let archive_dir = Path::new(ARCHIVE_DIR).join(&name).join(&stamp);
                for (file, field) in DOMAIN_FILES {
                    plan.insert(archive_dir.clone(), file.to_string(), field);
                }
            }
        }

        plan
    }
}

/// Canonical full-chain path for a domain, relative to the certificates root.
pub fn canonical_fullchain(sanitized_name: &str) -> PathBuf {
    Path::new(CERTS_DIR).join(sanitized_name).join(FULLCHAIN_FILE)
}
