//! ANSI colors for log output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// An SGR parameter list such as `1;31`, rendered as `ESC [ <params> m`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnsiColor(String);

impl AnsiColor {
    /// Escape sequence that resets all attributes
    pub const RESET: &'static str = "\u{1b}[0m";

    /// The raw SGR parameters
    pub fn params(&self) -> &str {
        &self.0
    }

    /// The full escape sequence
    pub fn escape(&self) -> String {
        format!("\u{1b}[{}m", self.0)
    }
}

impl FromStr for AnsiColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s.split(';')
                .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ConfigError::InvalidColor(s.to_string()))
        }
    }
}

impl fmt::Display for AnsiColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.escape())
    }
}

/// Colors per log severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub error: AnsiColor,
    pub info: AnsiColor,
    pub success: AnsiColor,
    pub warn: AnsiColor,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            error: AnsiColor("1;31".to_string()),
            info: AnsiColor("0".to_string()),
            success: AnsiColor("0;32".to_string()),
            warn: AnsiColor("0;33".to_string()),
        }
    }
}
