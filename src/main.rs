//! agent-circuit
//!
//! Command-line front end for the breaker library.
//!
//! ```text
//! agent-circuit [--config file.toml] presets
//! agent-circuit  --config file.toml  validate
//! agent-circuit [--config file.toml] simulate [--breaker name] [--preset p] ...
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use agent_circuit::breaker::{BreakerRegistry, Preset};
use agent_circuit::config::{load_config, AppConfig, BreakerConfig, BreakerSpec};
use agent_circuit::health::HealthReporter;
use agent_circuit::lifecycle::{signals, Shutdown};
use agent_circuit::observability::{logging, metrics};
use agent_circuit::simulation::{run_simulation, simulation_breaker, SimulationPlan};

#[derive(Parser)]
#[command(name = "agent-circuit")]
#[command(about = "Circuit breaker toolkit for agent coordination calls", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the preset table
    Presets,
    /// Validate the configuration and print the resolved breakers
    Validate,
    /// Drive a randomized workload through a breaker
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct SimulateArgs {
    /// Breaker name; taken from the config file when defined there.
    #[arg(short, long, default_value = "simulated")]
    breaker: String,

    /// Preset used when the breaker is not in the config file.
    #[arg(short, long, default_value = "standard")]
    preset: Preset,

    #[arg(long, default_value_t = 100)]
    calls: u32,

    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Fraction of calls failing with a dependency error.
    #[arg(long, default_value_t = 0.5)]
    failure_rate: f64,

    /// Fraction of calls failing with a validation error (not counted).
    #[arg(long, default_value_t = 0.0)]
    invalid_rate: f64,

    /// Fraction of calls that outlast the breaker timeout.
    #[arg(long, default_value_t = 0.0)]
    slow_rate: f64,

    #[arg(long, default_value_t = 20)]
    latency_ms: u64,

    #[arg(long, default_value_t = 50)]
    pause_ms: u64,

    /// Serve a fallback value when the breaker rejects.
    #[arg(long)]
    fallback: bool,

    /// Print state changes as they happen.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability).map_err(|e| e as Box<dyn std::error::Error>)?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "agent-circuit starting");

    match cli.command {
        Commands::Presets => {
            let table: BTreeMap<&str, BreakerConfig> = Preset::ALL
                .iter()
                .map(|p| (p.as_str(), p.config()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Commands::Validate => {
            if cli.config.is_none() {
                return Err("validate requires --config".into());
            }
            let resolved: Vec<BreakerConfig> =
                config.breakers.iter().map(BreakerSpec::resolve).collect();
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Commands::Simulate(args) => simulate(&config, args).await?,
    }

    Ok(())
}

async fn simulate(config: &AppConfig, args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let breaker_config = match config.breakers.iter().find(|s| s.name == args.breaker) {
        Some(spec) => spec.resolve(),
        None => BreakerConfig {
            name: args.breaker.clone(),
            ..args.preset.config()
        },
    };

    tracing::info!(
        breaker = %breaker_config.name,
        failure_threshold = breaker_config.failure_threshold,
        volume_threshold = breaker_config.volume_threshold,
        timeout_ms = breaker_config.timeout_ms,
        "Breaker configured"
    );

    let breaker = simulation_breaker(breaker_config);
    let registry = Arc::new(BreakerRegistry::new());
    registry.insert(breaker.clone());

    let _watch = args.watch.then(|| {
        breaker.on_state_change(|event| {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{}", line);
            }
        })
    });

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    let reporter = tokio::spawn(
        HealthReporter::new(registry.clone(), config.reporter.clone()).run(shutdown.subscribe()),
    );

    let plan = SimulationPlan {
        calls: args.calls,
        concurrency: args.concurrency,
        failure_rate: args.failure_rate,
        invalid_rate: args.invalid_rate,
        slow_rate: args.slow_rate,
        latency_ms: args.latency_ms,
        pause_ms: args.pause_ms,
        use_fallback: args.fallback,
    };
    let report = run_simulation(&breaker, &plan, Some(&shutdown)).await;

    shutdown.trigger();
    let _ = reporter.await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
