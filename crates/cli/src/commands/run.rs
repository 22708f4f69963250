//! `run` command implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::TwinBlueprint;
use ingestion::MockBroker;
use runtime::{RuntimeStats, TwinRuntime};
use tracing::{info, warn};

use super::{collect_warnings, load_blueprint};
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::simulator::{concrete_topic, AssetSimulator, SimulatorConfig};

/// Execute the `run` command
pub async fn run_twin(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)?;
    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint).context("Invalid command line override")?;

    info!(
        twin_id = %blueprint.runtime.twin_id,
        asset_id = %blueprint.runtime.asset_id,
        model = %blueprint.model.kind,
        workers = blueprint.runtime.workers,
        topics = ?blueprint.broker.topics,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );
    for warning in collect_warnings(&blueprint) {
        warn!("{warning}");
    }

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let broker = MockBroker::new(format!("{}:{}", blueprint.broker.host, blueprint.broker.port));
    let simulator_config = (!args.no_simulator).then(|| simulator_config(&blueprint, args));

    let twin = TwinRuntime::from_blueprint(blueprint, broker.clone()).map_err(CliError::from)?;

    let started = Instant::now();
    twin.start().await.map_err(CliError::from)?;
    if let Some(addr) = twin.health_addr() {
        info!(addr = %addr, "Health endpoints: /healthz /readyz /metrics");
    }

    let simulating = Arc::new(AtomicBool::new(true));
    let simulator = simulator_config
        .map(|config| AssetSimulator::new(config).spawn(broker.clone(), Arc::clone(&simulating)));

    wait_for_shutdown(args.duration).await;

    simulating.store(false, Ordering::SeqCst);
    if let Some(handle) = simulator {
        handle.abort();
    }
    twin.stop().await;

    let stats = twin.stats();
    info!(
        received = stats.metrics.messages_received,
        processed = stats.metrics.messages_processed,
        dropped = stats.metrics.messages_dropped,
        duration_secs = started.elapsed().as_secs_f64(),
        "Twin finished"
    );

    if args.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialize statistics")?;
        println!("{json}");
    } else {
        print_summary(&stats, started.elapsed());
    }
    Ok(())
}

fn apply_overrides(blueprint: &mut TwinBlueprint, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding broker host from CLI");
        blueprint.broker.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding broker port from CLI");
        blueprint.broker.port = port;
    }
    if let Some(workers) = args.workers {
        info!(workers, "Overriding worker count from CLI");
        blueprint.runtime.workers = workers;
    }
    if let Some(port) = args.health_port {
        info!(port, "Overriding health port from CLI");
        blueprint.health.port = port;
    }
}

fn simulator_config(blueprint: &TwinBlueprint, args: &RunArgs) -> SimulatorConfig {
    let asset_id = &blueprint.runtime.asset_id;
    let topic = blueprint
        .broker
        .topics
        .first()
        .map(|pattern| concrete_topic(pattern, asset_id))
        .unwrap_or_else(|| format!("sensors/{asset_id}/temperature"));

    let mut config = SimulatorConfig::new(asset_id.clone(), topic);
    config.interval = Duration::from_millis(args.interval_ms.max(1));
    config.anomaly_rate = args.anomaly_rate;
    config.seed = args.seed;
    config
}

/// Wait for Ctrl+C, SIGTERM or the optional duration
async fn wait_for_shutdown(duration_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let deadline = async {
        if duration_secs == 0 {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(Duration::from_secs(duration_secs)).await;
    };

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, stopping twin"),
        _ = terminate => warn!("Received SIGTERM, stopping twin"),
        _ = deadline => info!(duration_secs, "Run duration elapsed"),
    }
}

fn print_summary(stats: &RuntimeStats, elapsed: Duration) {
    let m = &stats.metrics;
    println!("\n=== Twin Statistics ===\n");
    println!("Twin:      {} (asset {})", stats.twin_id, stats.asset_id);
    println!("State:     {}", stats.state);
    println!("Duration:  {:.2}s", elapsed.as_secs_f64());
    println!("Workers:   {}", stats.workers);
    println!("\nMessages");
    println!("  received:   {}", m.messages_received);
    println!("  processed:  {}", m.messages_processed);
    println!("  dropped:    {} ({:.2}%)", m.messages_dropped, stats.drop_rate());
    println!("  rate:       {:.2} msg/s", m.processing_rate);
    println!("\nErrors");
    println!("  processing: {}", m.processing_errors);
    println!("  sink write: {}", m.sink_write_errors);
    println!("  connection: {}", m.connection_errors);

    if let Some(queue) = stats.queue {
        println!(
            "\nQueue: {}/{} ({}), {} dropped",
            queue.size, queue.capacity, queue.overflow_policy, queue.dropped
        );
    }

    println!("\nSinks");
    for sink in &stats.sinks {
        println!(
            "  - {}: {} written, {} failed",
            sink.name, sink.counters.write_count, sink.counters.failure_count
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use contracts::{ModelSection, RuntimeSection};

    fn blueprint() -> TwinBlueprint {
        TwinBlueprint {
            runtime: RuntimeSection::new("twin", "pump-7"),
            broker: contracts::BrokerSection {
                topics: vec!["plant/+/temp".into()],
                ..Default::default()
            },
            model: ModelSection::new("passthrough"),
            sinks: Vec::new(),
            health: contracts::HealthSection::disabled(),
        }
    }

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["run"];
        argv.extend_from_slice(extra);
        RunArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_overrides_applied() {
        let mut bp = blueprint();
        apply_overrides(
            &mut bp,
            &args(&["--host", "broker.local", "--port", "8883", "--workers", "4", "--health-port", "0"]),
        );
        assert_eq!(bp.broker.host, "broker.local");
        assert_eq!(bp.broker.port, 8883);
        assert_eq!(bp.runtime.workers, 4);
        assert_eq!(bp.health.port, 0);
    }

    #[test]
    fn test_simulator_topic_matches_subscription() {
        let config = simulator_config(&blueprint(), &args(&["--interval-ms", "0", "--seed", "9"]));
        assert_eq!(config.topic, "plant/pump-7/temp");
        assert_eq!(config.interval, Duration::from_millis(1));
        assert_eq!(config.seed, Some(9));
    }
}
