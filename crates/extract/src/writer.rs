//! Writes planned files under the certificates root.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::error::{ExtractError, ExtractResult};
use crate::layout::LayoutPlan;
use crate::record::CertificateRecord;

/// Filesystem writer rooted at the certificates directory.
#[derive(Debug)]
pub struct Writer {
    root: PathBuf,
}

impl Writer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every target in `plan` with the matching record field.
    ///
    /// Each file is replaced atomically, so a reader sees either the old or
    /// the new content of that file. Returns the number of files written.
    pub fn write(&self, plan: &LayoutPlan, record: &CertificateRecord) -> ExtractResult<usize> {
        let mut written = 0;

        for dir in plan.directories() {
            ensure_dir(&self.root.join(dir))?;
        }

        for target in plan.targets() {
            let path = self.root.join(target.relative_path());
            replace_file(&path, record.field(target.source_field).as_bytes())
                .map_err(|source| ExtractError::WriteFailure {
                    path: path.clone(),
                    source,
                })?;
            trace!(path = %path.display(), field = ?target.source_field, "Wrote file");
            written += 1;
        }

        debug!(domain = %record.name, files = written, "Wrote certificate files");
        Ok(written)
    }
}

/// Create `path` and its parents; an existing directory is fine.
pub fn ensure_dir(path: &Path) -> ExtractResult<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(source) => Err(ExtractError::WriteFailure {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn replace_file(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;

    // Temp files are created 0600; consumers of the output expect plain files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))?;
    }

    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutOptions, LayoutPlanner};
    use acme_extract_config::ExtractConfig;
    use chrono::Local;
    use tempfile::TempDir;

    fn record() -> CertificateRecord {
        CertificateRecord {
            name: "a.com".into(),
            sans: vec!["b.com".into()],
            private_key_pem: "KEY".into(),
            full_chain_pem: "LEAFCHAIN".into(),
            leaf_cert_pem: "LEAF".into(),
            remainder_chain_pem: "CHAIN".into(),
        }
    }

    fn plan(flat: bool) -> LayoutPlan {
        let config = ExtractConfig::default();
        LayoutPlanner::new(
            |n: &str| config.sanitize(n),
            LayoutOptions {
                flat_enabled: flat,
                archive_enabled: false,
            },
        )
        .plan(&record(), Local::now())
    }

    #[test]
    fn test_writes_all_targets() {
        let dir = TempDir::new().unwrap();
        let writer = Writer::new(dir.path());

        let written = writer.write(&plan(true), &record()).unwrap();
        assert_eq!(written, 16);

        let read = |p: &str| fs::read_to_string(dir.path().join(p)).unwrap();
        assert_eq!(read("certs/a.com/privkey.pem"), "KEY");
        assert_eq!(read("certs/b.com/cert.pem"), "LEAF");
        assert_eq!(read("certs/b.com/chain.pem"), "CHAIN");
        assert_eq!(read("flat/a.com_full.crt"), "LEAFCHAIN");
    }

    #[test]
    fn test_overwrites_existing_files() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("certs/a.com/cert.pem");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "OLD CONTENT THAT IS LONGER").unwrap();

        Writer::new(dir.path()).write(&plan(false), &record()).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "LEAF");

        // No temp files left behind
        let entries = fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 4);
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x/y");
        ensure_dir(&path).unwrap();
        ensure_dir(&path).unwrap();
        assert!(path.is_dir());
    }

    #[test]
    fn test_file_in_the_way_is_write_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("certs"), "not a directory").unwrap();

        let err = Writer::new(dir.path())
            .write(&plan(false), &record())
            .unwrap_err();
        assert!(matches!(err, ExtractError::WriteFailure { .. }));
        assert_eq!(err.exit_code(), 5);
    }
}
