//! Configuration parsing
//!
//! TOML (primary) and JSON are both read into a `serde_json::Value` tree first so
//! that environment expansion can run on every string before typed decoding.

use contracts::{TwinBlueprint, TwinError};
use serde_json::Value;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML into an untyped tree
pub fn parse_toml(content: &str) -> Result<Value, TwinError> {
    toml::from_str(content).map_err(|e| {
        TwinError::configuration(format!("TOML parse error: {e}")).with_detail("format", "toml")
    })
}

/// Parse JSON into an untyped tree
pub fn parse_json(content: &str) -> Result<Value, TwinError> {
    serde_json::from_str(content).map_err(|e| {
        TwinError::configuration(format!("JSON parse error: {e}")).with_detail("format", "json")
    })
}

/// Parse by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<Value, TwinError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

/// Decode an (already expanded) tree into a blueprint
pub fn decode(tree: Value) -> Result<TwinBlueprint, TwinError> {
    serde_json::from_value(tree)
        .map_err(|e| TwinError::configuration(format!("invalid configuration: {e}")))
}
