//! ACME certificate extractor
//!
//! Reads a reverse proxy's ACME state document and writes each certificate,
//! its private key and its issuer chain out as PEM files, then keeps the
//! output in sync while the document changes.
//!
//! # Pipeline
//!
//! ```text
//! acme.json ─► document::parse ─► normalize ─► CertificateRecord
//!                                                   │
//!         Writer ◄── ChangeGate ◄── LayoutPlanner ◄─┘
//! ```
//!
//! [`Extractor::run_pass`] runs the pipeline once; [`WatchLoop`] runs it
//! again whenever the document is modified.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use acme_extract::Extractor;
//! use acme_extract_config::ExtractConfig;
//!
//! let extractor = Extractor::new(Arc::new(ExtractConfig::default()));
//! extractor.prepare_roots()?;
//! let report = extractor.run_pass()?;
//! println!("{} certificate(s) written", report.written);
//! # Ok::<(), acme_extract::ExtractError>(())
//! ```

pub mod codec;
pub mod document;
pub mod error;
pub mod gate;
pub mod layout;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod watch;
pub mod writer;

pub use document::{parse, ParsedDocument, SchemaVersion};
pub use error::{ExtractError, ExtractResult, RecordError};
pub use gate::{ChangeGate, GateDecision};
pub use layout::{FileTarget, LayoutOptions, LayoutPlan, LayoutPlanner};
pub use pipeline::{Extractor, PassReport};
pub use record::{CertificateRecord, SourceField};
pub use watch::{Debouncer, WatchLoop};
pub use writer::Writer;
