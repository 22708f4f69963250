//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::TwinBlueprint;
use dispatcher::SinkRegistry;
use serde::Serialize;
use tracing::info;
use transform::TransformRegistry;

use super::{collect_warnings, load_blueprint};
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    twin_id: String,
    asset_id: String,
    model: String,
    model_version: String,
    workers: usize,
    topic_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    let checked = load_blueprint(&args.config)
        .map_err(|e| e.to_string())
        .and_then(|blueprint| check_components(&blueprint).map(|()| blueprint));

    match checked {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    twin_id: blueprint.runtime.twin_id.clone(),
                    asset_id: blueprint.runtime.asset_id.clone(),
                    model: blueprint.model.kind.clone(),
                    model_version: blueprint.model.version.clone(),
                    workers: blueprint.runtime.workers,
                    topic_count: blueprint.broker.topics.len(),
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(error) => ValidationResult {
            valid: false,
            config_path,
            error: Some(error),
            warnings: None,
            summary: None,
        },
    }
}

/// Model and sink kinds must resolve through the registries
fn check_components(blueprint: &TwinBlueprint) -> Result<(), String> {
    TransformRegistry::with_builtins()
        .create(&blueprint.model.kind)
        .map_err(|e| e.to_string())?;
    SinkRegistry::with_builtins()
        .build_all(&blueprint.sinks)
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Twin: {} (asset {})", summary.twin_id, summary.asset_id);
            println!("  Model: {} v{}", summary.model, summary.model_version);
            println!("  Workers: {}", summary.workers);
            println!("  Topics: {}", summary.topic_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
