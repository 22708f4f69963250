//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// edge-twin - telemetry digital twin runtime
#[derive(Parser, Debug)]
#[command(
    name = "edge-twin",
    author,
    version,
    about = "Telemetry digital twin runtime",
    long_about = "Streams asset telemetry from a broker through a transform and out to sinks.\n\n\
                  Subscribes to configured topics, runs every message through the configured \n\
                  model and fans the resulting twin records out to every sink."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EDGE_TWIN_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EDGE_TWIN_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default level handed to the subscriber; `RUST_LOG` still wins
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the twin until Ctrl-C, SIGTERM or --duration
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration and registered components
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "EDGE_TWIN_CONFIG")]
    pub config: PathBuf,

    /// Override broker host from configuration
    #[arg(long)]
    pub host: Option<String>,

    /// Override broker port from configuration
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the number of workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Override the health server port (0 = ephemeral)
    #[arg(long)]
    pub health_port: Option<u16>,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "EDGE_TWIN_DURATION")]
    pub duration: u64,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, default_value = "0", env = "EDGE_TWIN_METRICS_PORT")]
    pub metrics_port: u16,

    /// Milliseconds between simulated readings
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Probability of an anomalous spike per simulated reading
    #[arg(long, default_value = "0.05")]
    pub anomaly_rate: f64,

    /// Seed for the simulated asset (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Do not publish simulated telemetry
    #[arg(long)]
    pub no_simulator: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Print final statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; omit to list registered components only
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "edge-twin",
            "-v",
            "run",
            "--config",
            "twin.toml",
            "--port",
            "1884",
            "--duration",
            "5",
            "--no-simulator",
        ])
        .unwrap();

        assert_eq!(cli.log_level(), "debug");
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("twin.toml"));
        assert_eq!(args.port, Some(1884));
        assert_eq!(args.duration, 5);
        assert!(args.no_simulator);
        assert_eq!(args.interval_ms, 1000);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["edge-twin", "-q", "-v", "validate"]).is_err());
        let cli = Cli::try_parse_from(["edge-twin", "-q", "info"]).unwrap();
        assert_eq!(cli.log_level(), "warn");
    }
}
