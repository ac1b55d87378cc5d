//! Normalized certificate records.

use serde_json::Value;

use crate::codec::{decode_pem, split_chain};
use crate::document::SchemaVersion;
use crate::error::RecordError;

/// One certificate with its key and chain, decoded and split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Primary domain
    pub name: String,
    /// Alternate domains, in document order
    pub sans: Vec<String>,
    pub private_key_pem: String,
    pub full_chain_pem: String,
    pub leaf_cert_pem: String,
    pub remainder_chain_pem: String,
}

/// Which record value a file receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceField {
    /// Private key
    Pkey,
    /// Leaf certificate
    Crt,
    /// Issuer chain without the leaf
    Chain,
    /// Leaf followed by issuer chain
    Full,
}

impl CertificateRecord {
    /// Build a record from a raw, key-normalized document entry.
    pub fn from_raw(
        raw: &Value,
        version: SchemaVersion,
        delimiter: &str,
    ) -> Result<Self, RecordError> {
        let (name, pkey, full, sans) = match version {
            SchemaVersion::V1 => (
                string_at(raw, &["certificate", "domain"], "certificate.domain")?,
                string_at(raw, &["certificate", "privatekey"], "certificate.privatekey")?,
                string_at(raw, &["certificate", "certificate"], "certificate.certificate")?,
                sans_at(raw, &["domains", "sans"]),
            ),
            SchemaVersion::V2 => (
                string_at(raw, &["domain", "main"], "domain.main")?,
                string_at(raw, &["key"], "key")?,
                string_at(raw, &["certificate"], "certificate")?,
                sans_at(raw, &["domain", "sans"]),
            ),
        };

        for domain in std::iter::once(name).chain(sans.iter().map(String::as_str)) {
            check_name(domain)?;
        }

        let private_key_pem = decode_pem("key", pkey)?;
        let full_chain_pem = decode_pem("certificate", full)?;
        let (leaf, remainder) = split_chain(&full_chain_pem, delimiter);
        let (leaf_cert_pem, remainder_chain_pem) = (leaf.to_string(), remainder.to_string());

        Ok(Self {
            name: name.to_string(),
            sans,
            private_key_pem,
            full_chain_pem,
            leaf_cert_pem,
            remainder_chain_pem,
        })
    }

    /// Primary name followed by the SANs.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.sans.iter().map(String::as_str))
    }

    /// Content for a given output field.
    pub fn field(&self, field: SourceField) -> &str {
        match field {
            SourceField::Pkey => &self.private_key_pem,
            SourceField::Crt => &self.leaf_cert_pem,
            SourceField::Chain => &self.remainder_chain_pem,
            SourceField::Full => &self.full_chain_pem,
        }
    }
}

/// Names become directory and file names under the output root.
fn check_name(name: &str) -> Result<(), RecordError> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(RecordError::UnsafeName(name.to_string()));
    }
    Ok(())
}

fn lookup<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(raw, |node, key| node.get(key))
}

fn string_at<'a>(
    raw: &'a Value,
    path: &[&str],
    field: &'static str,
) -> Result<&'a str, RecordError> {
    lookup(raw, path)
        .and_then(Value::as_str)
        .ok_or(RecordError::MissingField(field))
}

/// SANs are optional; absent or malformed lists read as empty.
fn sans_at(raw: &Value, path: &[&str]) -> Vec<String> {
    lookup(raw, path)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
