//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Expand `${VAR}` / `${VAR:-default}` references and apply `EDGE_TWIN_*` overrides
//! - Validate configuration legality
//! - Generate `TwinBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("twin.toml")).unwrap();
//! println!("Twin: {}", blueprint.runtime.twin_id);
//! ```

mod env;
mod parser;
mod validator;

pub use contracts::TwinBlueprint;
pub use env::{expand_str, ENV_OVERRIDES};
pub use parser::ConfigFormat;

use contracts::TwinError;
use std::path::Path;
use tracing::debug;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<TwinBlueprint, TwinError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        debug!(path = %path.display(), ?format, "Loading configuration");
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string, resolving against the process environment
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<TwinBlueprint, TwinError> {
        Self::load_with_env(content, format, &env::process_env)
    }

    /// Load configuration from string with an explicit environment lookup
    pub fn load_with_env<F>(
        content: &str,
        format: ConfigFormat,
        lookup: &F,
    ) -> Result<TwinBlueprint, TwinError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut tree = parser::parse(content, format)?;
        env::expand_tree(&mut tree, lookup);
        env::apply_overrides(&mut tree, lookup)?;
        let blueprint = parser::decode(tree)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Run validation rules on an already built blueprint
    pub fn validate(blueprint: &TwinBlueprint) -> Result<(), TwinError> {
        validator::validate(blueprint)
    }

    /// Serialize TwinBlueprint to TOML string
    pub fn to_toml(blueprint: &TwinBlueprint) -> Result<String, TwinError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| TwinError::configuration(format!("TOML serialize error: {e}")))
    }

    /// Serialize TwinBlueprint to JSON string
    pub fn to_json(blueprint: &TwinBlueprint) -> Result<String, TwinError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| TwinError::configuration(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, TwinError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            TwinError::configuration("cannot determine file format from extension")
                .with_detail("path", path.display())
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            TwinError::configuration(format!("unsupported config format: .{ext}"))
                .with_detail("path", path.display())
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, TwinError> {
        std::fs::read_to_string(path).map_err(|e| {
            TwinError::configuration(format!("cannot read configuration file: {e}"))
                .with_detail("path", path.display())
        })
    }
}
