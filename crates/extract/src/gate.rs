//! Decides whether a record's files need to be written.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use acme_extract_config::ExtractConfig;

use crate::layout::canonical_fullchain;
use crate::record::CertificateRecord;

/// Outcome of the change gate for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Write every target of the record
    Write,
    /// The record's primary name is not in the allow-list
    NotAllowed,
    /// The on-disk full chain already matches
    Unchanged,
}

impl GateDecision {
    pub fn should_write(self) -> bool {
        self == GateDecision::Write
    }
}

/// Gate evaluated once per record, before any of its files are written.
#[derive(Debug)]
pub struct ChangeGate<'a> {
    config: &'a ExtractConfig,
}

impl<'a> ChangeGate<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        Self { config }
    }

    /// Check the allow-list, then compare the canonical full chain byte for byte.
    pub fn check(&self, record: &CertificateRecord) -> GateDecision {
        if !self.config.is_allowed(&record.name) {
            return GateDecision::NotAllowed;
        }

        let path = self
            .config
            .certs_dir
            .join(canonical_fullchain(&self.config.sanitize(&record.name)));

        match read_existing(&path) {
            Ok(Some(existing)) if existing == record.full_chain_pem.as_bytes() => {
                GateDecision::Unchanged
            }
            Ok(_) => GateDecision::Write,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Cannot read existing full chain, rewriting"
                );
                GateDecision::Write
            }
        }
    }
}

fn read_existing(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No existing full chain");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, full: &str) -> CertificateRecord {
        CertificateRecord {
            name: name.to_string(),
            sans: Vec::new(),
            private_key_pem: "K".into(),
            full_chain_pem: full.into(),
            leaf_cert_pem: full.into(),
            remainder_chain_pem: String::new(),
        }
    }

    fn setup(allow: &[&str]) -> (TempDir, ExtractConfig) {
        let dir = TempDir::new().unwrap();
        let config = ExtractConfig {
            certs_dir: dir.path().to_path_buf(),
            domain_allow_list: allow.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        (dir, config)
    }

    fn write_fullchain(config: &ExtractConfig, name: &str, content: &str) {
        let path = config.certs_dir.join(canonical_fullchain(name));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_no_existing_file_writes() {
        let (_dir, config) = setup(&[]);
        let gate = ChangeGate::new(&config);
        assert_eq!(gate.check(&record("a.com", "X")), GateDecision::Write);
    }

    #[test]
    fn test_identical_content_is_unchanged() {
        let (_dir, config) = setup(&[]);
        write_fullchain(&config, "a.com", "X");
        let gate = ChangeGate::new(&config);
        assert_eq!(gate.check(&record("a.com", "X")), GateDecision::Unchanged);
        assert_eq!(gate.check(&record("a.com", "Y")), GateDecision::Write);
        // Trailing newline counts
        assert_eq!(gate.check(&record("a.com", "X\n")), GateDecision::Write);
    }

    #[test]
    fn test_wildcard_uses_sanitized_path() {
        let (_dir, config) = setup(&[]);
        write_fullchain(&config, "STAR.a.com", "X");
        let gate = ChangeGate::new(&config);
        assert_eq!(gate.check(&record("*.a.com", "X")), GateDecision::Unchanged);
    }

    #[test]
    fn test_allow_list() {
        let (_dir, config) = setup(&["example.com"]);
        let gate = ChangeGate::new(&config);
        assert_eq!(gate.check(&record("example.com", "X")), GateDecision::Write);
        assert_eq!(gate.check(&record("other.com", "X")), GateDecision::NotAllowed);
        assert!(!GateDecision::NotAllowed.should_write());
    }
}
