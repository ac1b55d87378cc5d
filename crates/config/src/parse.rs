//! Parsing helpers for environment-style option values.

use crate::ConfigError;

/// Parse a truth word.
///
/// Accepts `y`, `yes`, `t`, `true`, `on`, `1` and `n`, `no`, `f`, `false`,
/// `off`, `0`, ignoring case and surrounding whitespace.
pub fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool(value.to_string())),
    }
}

/// Split a comma separated domain list, trimming entries and dropping empties.
pub fn parse_domain_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
