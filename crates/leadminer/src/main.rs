//! `leadminer` daemon: runs the mining engine until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use leadminer::config::{load_config, EngineConfig};
use leadminer::db::{default_database_path, Database};
use leadminer::logging::init_logging;
use leadminer::{
    ConfigError, Environment, EnvironmentHandle, MiningEngine, ScriptedProvider, Store,
};

#[derive(Parser)]
#[command(name = "leadminer", version)]
#[command(about = "Run lead-mining jobs until interrupted", long_about = None)]
struct Args {
    /// JSON config file (built-in defaults when omitted)
    #[arg(env = "LEADMINER_CONFIG")]
    config: Option<PathBuf>,

    /// Partition to start in, overriding the config file
    #[arg(long, value_parser = parse_environment)]
    environment: Option<Environment>,
}

fn parse_environment(value: &str) -> Result<Environment, String> {
    match value {
        "production" => Ok(Environment::Production),
        "staging" => Ok(Environment::Staging),
        other => Err(format!(
            "unknown environment '{}', expected production or staging",
            other
        )),
    }
}

fn load_engine_config(args: &Args) -> Result<EngineConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(environment) = args.environment {
        config.environment = environment;
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match load_engine_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("leadminer: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = init_logging(&config.log_level, config.log_json) {
        eprintln!("leadminer: {}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(config).await {
        error!("leadminer stopped with an error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting leadminer v{}", env!("CARGO_PKG_VERSION"));

    let db_path = config
        .database_path
        .clone()
        .or_else(default_database_path)
        .ok_or_else(|| ConfigError::Validation {
            message: "No database_path configured and no home directory found".to_string(),
        })?;
    let db = Database::open(&db_path)?;
    let store = Store::new(db, EnvironmentHandle::new(config.environment));

    let provider = match &config.replay_file {
        Some(path) => {
            let provider = ScriptedProvider::from_json_file(path)?;
            info!(
                path = %path.display(),
                pages = provider.pending(),
                "Loaded discovery replay"
            );
            provider
        }
        None => {
            warn!("No replay_file configured, discovery will return empty pages");
            ScriptedProvider::new()
        }
    };

    let engine = MiningEngine::new(config, store, Arc::new(provider));
    let mut events = engine.subscribe();

    let started = engine.hydrate();
    info!(
        environment = %engine.environment(),
        workers = started.len(),
        "Engine ready"
    );

    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Interrupt received, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(target: "leadminer::events", "{}", json),
                    Err(e) => warn!("Failed to encode event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    engine.shutdown();
    Ok(())
}
