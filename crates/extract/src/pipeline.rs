//! One extraction pass: parse → build → plan → gate → write.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error, info, warn};

use acme_extract_config::ExtractConfig;

use crate::document::{load_document, parse};
use crate::error::{ExtractError, ExtractResult};
use crate::gate::{ChangeGate, GateDecision};
use crate::layout::{LayoutOptions, LayoutPlanner};
use crate::record::CertificateRecord;
use crate::writer::{ensure_dir, Writer};

/// Counters for one pass. Every record lands in exactly one of the first four.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Records whose files were written
    pub written: usize,
    /// Records skipped because the full chain did not change
    pub unchanged: usize,
    /// Records skipped by the allow-list
    pub filtered: usize,
    /// Records that could not be built
    pub failed: usize,
    /// Files written across all records
    pub files_written: usize,
}

impl PassReport {
    /// Records seen in this pass.
    pub fn records(&self) -> usize {
        self.written + self.unchanged + self.filtered + self.failed
    }
}

/// Runs extraction passes with a fixed configuration.
#[derive(Debug, Clone)]
pub struct Extractor {
    config: Arc<ExtractConfig>,
}

impl Extractor {
    pub fn new(config: Arc<ExtractConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Create the ACME and certificates directories.
    pub fn prepare_roots(&self) -> ExtractResult<()> {
        for dir in [&self.config.acme_dir, &self.config.certs_dir] {
            ensure_dir(dir).map_err(|e| match e {
                ExtractError::WriteFailure { path, source } => {
                    ExtractError::CreateRoot { path, source }
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Confirm the source document exists and is JSON before watching it.
    pub fn check_source(&self) -> ExtractResult<()> {
        let path = self.config.acme_path();
        if !path.is_file() {
            return Err(ExtractError::SourceMissing(path));
        }
        load_document(&path).map(|_| ())
    }

    /// Run one full pass over the source document.
    pub fn run_pass(&self) -> ExtractResult<PassReport> {
        let path = self.config.acme_path();
        let document = load_document(&path)?;
        let parsed = parse(&document)?;

        info!(
            path = %path.display(),
            certificates = parsed.records.len(),
            version = %parsed.version,
            "Processing ACME file"
        );

        let config = &*self.config;
        let planner = LayoutPlanner::new(
            |name: &str| config.sanitize(name),
            LayoutOptions::from(config),
        );
        let gate = ChangeGate::new(config);
        let writer = Writer::new(&config.certs_dir);
        let mut report = PassReport::default();

        for (index, raw) in parsed.records.iter().enumerate() {
            let built = CertificateRecord::from_raw(raw, parsed.version, &config.chain_delimiter);
            let record = match built {
                Ok(record) => record,
                Err(e) => {
                    error!(index, error = %e, "Skipping certificate record");
                    report.failed += 1;
                    continue;
                }
            };

            match gate.check(&record) {
                GateDecision::NotAllowed => {
                    warn!(
                        domain = %record.name,
                        "Skipped since it is not in the domain allow-list"
                    );
                    report.filtered += 1;
                }
                GateDecision::Unchanged => {
                    info!(
                        domain = %record.name,
                        "Skipped since there was no change on fullchain"
                    );
                    report.unchanged += 1;
                }
                GateDecision::Write => {
                    let plan = planner.plan(&record, Local::now());
                    report.files_written += writer.write(&plan, &record)?;
                    report.written += 1;

                    if record.sans.is_empty() {
                        info!(domain = %record.name, "Certificate extracted");
                    } else {
                        info!(
                            domain = %record.name,
                            sans = %record.sans.join(", "),
                            "Certificate extracted"
                        );
                    }
                }
            }
        }

        debug!(?report, "Pass complete");
        Ok(report)
    }
}
