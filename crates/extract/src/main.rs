//! acme-extract - Main entry point
//!
//! Extracts certificates from a reverse proxy's ACME state file and keeps the
//! extracted PEM files in sync with it.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use tracing::{debug, error, info, warn};

use acme_extract::logging;
use acme_extract::{ExtractError, Extractor, WatchLoop};
use acme_extract_config::{
    parse_bool, parse_domain_list, AnsiColor, ColorScheme, ExtractConfig, DEFAULT_ACME_DIR,
    DEFAULT_ACME_FILE, DEFAULT_CERTS_DIR, DEFAULT_CHAIN_DELIMITER, DEFAULT_WILDCARD_TOKEN,
    DEFAULT_WORK_DIR,
};

/// Exit code for unusable configuration (EX_CONFIG)
const CONFIG_EXIT_CODE: u8 = 78;

/// acme-extract - Extract certificates from an ACME state file
#[derive(Parser, Debug)]
#[command(name = "acme-extract")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// ACME state file name
    #[arg(long, env = "ACMEFILE", default_value = DEFAULT_ACME_FILE)]
    acme_file: String,

    /// Directory containing the ACME state file
    #[arg(long, env = "ACMEDIR", default_value = DEFAULT_ACME_DIR)]
    acme_dir: PathBuf,

    /// Output directory for extracted certificates
    #[arg(long, env = "CERTSDIR", default_value = DEFAULT_CERTS_DIR)]
    certs_dir: PathBuf,

    /// Working directory
    #[arg(long, env = "WORKDIR", default_value = DEFAULT_WORK_DIR)]
    work_dir: PathBuf,

    /// Replacement for `*` in wildcard domain names
    #[arg(long, env = "REPLACE_ASTERISK", default_value = DEFAULT_WILDCARD_TOKEN)]
    replace_asterisk: String,

    /// Marker separating certificates in a chain
    #[arg(
        long,
        env = "CERTSPLIT",
        default_value = DEFAULT_CHAIN_DELIMITER,
        allow_hyphen_values = true
    )]
    cert_split: String,

    /// Comma separated list of domains to extract (empty extracts all)
    #[arg(long, env = "LIMIT_FQDN", default_value = "")]
    limit_fqdn: String,

    /// Enable verbose logging (debug level)
    #[arg(
        long,
        env = "DEBUG",
        default_value = "false",
        value_parser = parse_bool,
        action = ArgAction::Set
    )]
    debug: bool,

    /// Also write flat/<domain>.* files
    #[arg(
        long,
        env = "STORE_FLAT_CRTS",
        default_value = "true",
        value_parser = parse_bool,
        action = ArgAction::Set
    )]
    store_flat_crts: bool,

    /// Keep timestamped copies under archive/
    #[arg(
        long,
        env = "CRT_ARCHIVE",
        default_value = "true",
        value_parser = parse_bool,
        action = ArgAction::Set
    )]
    crt_archive: bool,

    /// ANSI color for errors
    #[arg(long, env = "COLOR_ERROR", default_value = "1;31")]
    color_error: AnsiColor,

    /// ANSI color for debug output
    #[arg(long, env = "COLOR_INFO", default_value = "0")]
    color_info: AnsiColor,

    /// ANSI color for successful extraction
    #[arg(long, env = "COLOR_SUCCESS", default_value = "0;32")]
    color_success: AnsiColor,

    /// ANSI color for warnings
    #[arg(long, env = "COLOR_WARN", default_value = "0;33")]
    color_warn: AnsiColor,

    /// Run a single extraction pass and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn into_config(self) -> Result<ExtractConfig> {
        let config = ExtractConfig {
            acme_file: self.acme_file,
            acme_dir: self.acme_dir,
            certs_dir: self.certs_dir,
            work_dir: self.work_dir,
            wildcard_token: self.replace_asterisk,
            chain_delimiter: self.cert_split,
            domain_allow_list: parse_domain_list(&self.limit_fqdn),
            debug: self.debug,
            flat_enabled: self.store_flat_crts,
            archive_enabled: self.crt_archive,
            colors: ColorScheme {
                error: self.color_error,
                info: self.color_info,
                success: self.color_success,
                warn: self.color_warn,
            },
        };

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    // A missing .env file is not an error; variables may come from the environment
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match parse_failure_code(&e) {
            Some(code) => {
                let _ = e.print();
                return ExitCode::from(code);
            }
            None => e.exit(),
        },
    };
    let once = cli.once;

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("acme-extract: {e:#}");
            return ExitCode::from(CONFIG_EXIT_CODE);
        }
    };

    logging::init(&config);

    match run(Arc::new(config), once) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Cannot proceed");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Exit code for a rejected command line, or `None` for help and version output.
fn parse_failure_code(err: &clap::Error) -> Option<u8> {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => None,
        _ => Some(CONFIG_EXIT_CODE),
    }
}

/// Install the termination handlers, then serve until stopped.
fn run(config: Arc<ExtractConfig>, once: bool) -> Result<(), ExtractError> {
    match serde_json::to_string(&*config) {
        Ok(json) => debug!(config = %json, "Effective configuration"),
        Err(e) => warn!(error = %e, "Cannot serialize configuration"),
    }

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop)).map_err(ExtractError::Signal)?;
    }

    serve(Extractor::new(config), Arc::clone(&stop), once)?;

    if stop.load(Ordering::SeqCst) {
        warn!("Termination signal received; stopping process");
    }
    Ok(())
}

/// Bootstrap and run the startup pass, then watch unless `once` is set or
/// the stop flag went up while the startup pass was running.
fn serve(extractor: Extractor, stop: Arc<AtomicBool>, once: bool) -> Result<(), ExtractError> {
    extractor.prepare_roots()?;
    extractor.check_source()?;

    let report = extractor.run_pass()?;
    info!(
        written = report.written,
        unchanged = report.unchanged,
        filtered = report.filtered,
        failed = report.failed,
        "Initial extraction finished"
    );

    if once || stop.load(Ordering::SeqCst) {
        return Ok(());
    }

    WatchLoop::new(extractor, stop).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::json;
    use tempfile::TempDir;

    fn extractor(dir: &TempDir) -> Extractor {
        Extractor::new(Arc::new(ExtractConfig {
            acme_dir: dir.path().join("acme"),
            certs_dir: dir.path().join("certs"),
            flat_enabled: false,
            archive_enabled: false,
            ..Default::default()
        }))
    }

    #[test]
    fn test_invalid_values_exit_with_config_code() {
        for args in [
            ["acme-extract", "--store-flat-crts", "maybe"],
            ["acme-extract", "--debug", "perhaps"],
            ["acme-extract", "--color-error", "red"],
        ] {
            let err = Cli::try_parse_from(args).unwrap_err();
            assert_eq!(parse_failure_code(&err), Some(CONFIG_EXIT_CODE));
            assert_ne!(parse_failure_code(&err), Some(2));
        }
    }

    #[test]
    fn test_help_and_version_are_not_failures() {
        let err = Cli::try_parse_from(["acme-extract", "--help"]).unwrap_err();
        assert_eq!(parse_failure_code(&err), None);

        let err = Cli::try_parse_from(["acme-extract", "--version"]).unwrap_err();
        assert_eq!(parse_failure_code(&err), None);
    }

    #[test]
    fn test_stop_during_startup_finishes_pass() {
        let dir = TempDir::new().unwrap();
        let extractor = extractor(&dir);
        extractor.prepare_roots().unwrap();

        let cert = format!(
            "{0}\nLEAF\n-----END CERTIFICATE-----\n{0}\nISSUER\n-----END CERTIFICATE-----\n",
            "-----BEGIN CERTIFICATE-----"
        );
        let doc = json!({"Certificates": [{
            "domain": {"main": "a.com", "sans": ["b.com"]},
            "key": STANDARD.encode("KEY"),
            "certificate": STANDARD.encode(&cert),
        }]});
        std::fs::write(extractor.config().acme_path(), doc.to_string()).unwrap();

        // Raised before serving starts: the startup pass still runs to completion
        // and no watcher is installed.
        let stop = Arc::new(AtomicBool::new(true));
        serve(extractor, stop, false).unwrap();

        for name in ["a.com", "b.com"] {
            for file in ["privkey.pem", "cert.pem", "chain.pem", "fullchain.pem"] {
                assert!(dir.path().join("certs/certs").join(name).join(file).is_file());
            }
        }
    }

    #[test]
    fn test_once_returns_after_startup_pass() {
        let dir = TempDir::new().unwrap();
        let extractor = extractor(&dir);
        extractor.prepare_roots().unwrap();
        std::fs::write(extractor.config().acme_path(), "{}").unwrap();

        serve(extractor, Arc::new(AtomicBool::new(false)), true).unwrap();
    }

    #[test]
    fn test_missing_source_keeps_its_exit_code() {
        let dir = TempDir::new().unwrap();
        let err = serve(extractor(&dir), Arc::new(AtomicBool::new(false)), true).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
