//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_twin;
pub use validate::run_validate;

use std::path::Path;

use contracts::TwinBlueprint;

use crate::error::{CliError, Result};

/// Load and validate a configuration file
pub(crate) fn load_blueprint(path: &Path) -> Result<TwinBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config(path.display().to_string(), e))
}

/// Non-fatal issues worth reporting before a run
pub(crate) fn collect_warnings(blueprint: &TwinBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - records go to the default stdout sink".to_string());
    }

    if blueprint.runtime.workers > 1 && blueprint.model.kind == "kalman" {
        warnings.push(format!(
            "{} workers share one stateful kalman filter - message order across workers is not preserved",
            blueprint.runtime.workers
        ));
    }

    if !blueprint.health.enabled {
        warnings.push("Health server disabled - /healthz and /readyz unavailable".to_string());
    }

    warnings
}
