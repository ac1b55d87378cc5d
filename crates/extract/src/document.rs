//! ACME document shape detection.
//!
//! Three layouts are understood, probed in this order:
//!
//! ```text
//! v1:              {"DomainsCertificate": {"Certs": [...]}}
//! v2:              {"Certificates": [...]}
//! v2 per resolver: {"<resolver>": {"Certificates": [...]}, ...}
//! ```
//!
//! The first layout that matches is authoritative. Top-level entries of a
//! per-resolver document without certificates are reported and skipped.

use std::fmt;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExtractError, ExtractResult};
use crate::normalize::normalize_collection;

/// Schema generation of an ACME document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V1,
    V2,
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVersion::V1 => f.write_str("v1"),
            SchemaVersion::V2 => f.write_str("v2"),
        }
    }
}

/// Records pooled from a document, keys already lower-cased.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub version: SchemaVersion,
    pub records: Vec<Value>,
    /// Top-level entries that carried no certificates
    pub unhandled: Vec<String>,
}

/// Read and parse the ACME document at `path`.
pub fn load_document(path: &Path) -> ExtractResult<Value> {
    let content = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExtractError::SourceMissing(path.to_path_buf())
        } else {
            ExtractError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_slice(&content).map_err(|source| ExtractError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Detect the document layout and collect its certificate records.
pub fn parse(document: &Value) -> ExtractResult<ParsedDocument> {
    if let Some(domains) = truthy(document.get("DomainsCertificate")) {
        debug!("Handling ACME v1 document");
        let records = match domains.get("Certs") {
            Some(certs) => normalize_collection("DomainsCertificate.Certs", certs)?,
            None => {
                warn!("ACME v1 document has no DomainsCertificate.Certs list");
                Vec::new()
            }
        };
        return Ok(ParsedDocument {
            version: SchemaVersion::V1,
            records,
            unhandled: Vec::new(),
        });
    }

    if let Some(certs) = truthy(document.get("Certificates")) {
        debug!("Handling ACME v2 document");
        return Ok(ParsedDocument {
            version: SchemaVersion::V2,
            records: normalize_collection("Certificates", certs)?,
            unhandled: Vec::new(),
        });
    }

    let mut parsed = ParsedDocument {
        version: SchemaVersion::V2,
        records: Vec::new(),
        unhandled: Vec::new(),
    };

    let Some(resolvers) = document.as_object() else {
        warn!("ACME document is not an object, nothing to extract");
        return Ok(parsed);
    };

    for (key, resolver) in resolvers {
        match truthy(resolver.get("Certificates")) {
            Some(certs) => {
                debug!(resolver = %key, "Handling ACME v2 resolver");
                let location = format!("{key}.Certificates");
                parsed
                    .records
                    .extend(normalize_collection(&location, certs)?);
            }
            None => {
                warn!(
                    resolver = %key,
                    "ACME document contains an entry that cannot be handled"
                );
                parsed.unhandled.push(key.clone());
            }
        }
    }

    if parsed.records.is_empty() {
        warn!("ACME document holds no recognizable certificates");
    }

    Ok(parsed)
}

/// Python-style truthiness: absent, null, false, zero and empty values are false.
fn truthy(value: Option<&Value>) -> Option<&Value> {
    let value = value?;
    let truthy = match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    };
    truthy.then_some(value)
}
