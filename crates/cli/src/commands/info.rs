//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::TwinBlueprint;
use dispatcher::SinkRegistry;
use serde::Serialize;
use tracing::info;
use transform::TransformRegistry;

use super::load_blueprint;
use crate::cli::InfoArgs;

#[derive(Serialize)]
struct Info {
    version: &'static str,
    transforms: Vec<String>,
    sinks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<ConfigInfo>,
}

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    twin_id: String,
    asset_id: String,
    broker: String,
    topics: Vec<String>,
    model: String,
    model_version: String,
    workers: usize,
    queue_size: usize,
    overflow_policy: String,
    sinks: Vec<SinkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    health: Option<String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    kind: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration info");
            Some(config_info(&load_blueprint(path)?))
        }
        None => None,
    };

    let info = Info {
        version: env!("CARGO_PKG_VERSION"),
        transforms: TransformRegistry::with_builtins()
            .kinds()
            .into_iter()
            .map(String::from)
            .collect(),
        sinks: SinkRegistry::with_builtins()
            .kinds()
            .into_iter()
            .map(String::from)
            .collect(),
        config,
    };

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize info")?;
        println!("{json}");
    } else {
        print_info(&info);
    }
    Ok(())
}

fn config_info(blueprint: &TwinBlueprint) -> ConfigInfo {
    ConfigInfo {
        twin_id: blueprint.runtime.twin_id.clone(),
        asset_id: blueprint.runtime.asset_id.clone(),
        broker: format!("{}:{}", blueprint.broker.host, blueprint.broker.port),
        topics: blueprint.broker.topics.clone(),
        model: blueprint.model.kind.clone(),
        model_version: blueprint.model.version.clone(),
        workers: blueprint.runtime.workers,
        queue_size: blueprint.runtime.queue_size,
        overflow_policy: blueprint.runtime.queue_overflow_policy.to_string(),
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                kind: s.kind.clone(),
            })
            .collect(),
        health: blueprint
            .health
            .enabled
            .then(|| format!("{}:{}", blueprint.health.host, blueprint.health.port)),
    }
}

fn print_info(info: &Info) {
    println!("\n=== edge-twin {} ===\n", info.version);
    println!("Transforms: {}", info.transforms.join(", "));
    println!("Sinks:      {}", info.sinks.join(", "));

    let Some(config) = &info.config else {
        println!();
        return;
    };

    println!("\nTwin: {} (asset {})", config.twin_id, config.asset_id);
    println!("  Broker: {}", config.broker);
    for topic in &config.topics {
        println!("    - {topic}");
    }
    println!("  Model: {} v{}", config.model, config.model_version);
    println!(
        "  Workers: {}, queue {} ({})",
        config.workers, config.queue_size, config.overflow_policy
    );
    if config.sinks.is_empty() {
        println!("  Sinks: stdout (default)");
    } else {
        println!("  Sinks:");
        for sink in &config.sinks {
            println!("    - {} ({})", sink.name, sink.kind);
        }
    }
    match &config.health {
        Some(addr) => println!("  Health: http://{addr}"),
        None => println!("  Health: disabled"),
    }
    println!();
}
