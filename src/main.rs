//! VitalWeather Connector - Main Daemon
//!
//! A server-side daemon that continuously:
//! 1. Lists each integration's VitalWeather stations
//! 2. Pulls latest conditions (or history since the last watermark) per station
//! 3. Forwards daily summaries once a day as events
//! 4. Optionally serves an HTTP endpoint for running actions on demand
//!
//! Usage:
//!   cargo run --release                                   # Start daemon
//!   cargo run --release -- --endpoint 8080                # Daemon + HTTP endpoint on 8080
//!   cargo run --release -- --config other.toml            # Alternate configuration file
//!   cargo run --release -- --action auth --integration ID # Run one action and exit
//!
//! Environment:
//!   RUST_LOG          - log filter (default: info)
//!   INGESTION_API_KEY - ingestion key when not set in the configuration
//!   DATABASE_URL      - PostgreSQL connection string (postgres state backend)

use std::env;
use std::process;
use std::sync::Arc;

use vitalweather_service::actions::handlers::ActionContext;
use vitalweather_service::actions::runner::ActionRunner;
use vitalweather_service::config::{self, ServiceConfig, StateBackend};
use vitalweather_service::daemon::Daemon;
use vitalweather_service::endpoint;
use vitalweather_service::ingest::vitalweather::VitalWeatherClient;
use vitalweather_service::scheduler::{ActionRequest, QueueScheduler};
use vitalweather_service::sender::IngestionClient;
use vitalweather_service::state::{
    FileStateStore, MemoryStateStore, PostgresStateStore, StateStore, WatermarkStore,
};

struct Args {
    config_path: String,
    endpoint_port: Option<u16>,
    action: Option<String>,
    integration: Option<String>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [--config PATH] [--endpoint PORT] [--action NAME --integration ID]",
        program
    )
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let program = args.first().map(String::as_str).unwrap_or("vitalweather_service");
    let mut parsed = Args {
        config_path: config::DEFAULT_CONFIG_PATH.to_string(),
        endpoint_port: None,
        action: None,
        integration: None,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args.get(i + 1).ok_or_else(|| format!("{} requires a value", flag))?;
        match flag {
            "--config" => parsed.config_path = value.clone(),
            "--endpoint" => {
                let port = value
                    .parse()
                    .map_err(|_| format!("--endpoint requires a port number, got '{}'", value))?;
                parsed.endpoint_port = Some(port);
            }
            "--action" => parsed.action = Some(value.clone()),
            "--integration" => parsed.integration = Some(value.clone()),
            _ => return Err(format!("Unknown argument: {}\n{}", flag, usage(program))),
        }
        i += 2;
    }

    if parsed.action.is_some() != parsed.integration.is_some() {
        return Err(format!("--action and --integration go together\n{}", usage(program)));
    }
    Ok(parsed)
}

fn open_state_store(config: &ServiceConfig) -> Result<Arc<dyn StateStore>, String> {
    let service = &config.service;
    match service.state_backend {
        StateBackend::File => {
            let store = FileStateStore::new(&service.state_file);
            log::info!("Watermarks stored in {}", store.path().display());
            Ok(Arc::new(store))
        }
        StateBackend::Postgres => {
            let store = PostgresStateStore::connect().map_err(|e| e.to_string())?;
            log::info!("Watermarks stored in PostgreSQL");
            Ok(Arc::new(store))
        }
        StateBackend::Memory => {
            log::warn!("Watermarks kept in memory; they are lost on restart");
            Ok(Arc::new(MemoryStateStore::new()))
        }
    }
}

fn build_daemon(config: ServiceConfig) -> Result<Daemon, String> {
    let state = open_state_store(&config)?;
    let api = VitalWeatherClient::new().map_err(|e| e.to_string())?;
    let ingestion_key = config.ingestion.resolved_api_key().map_err(|e| e.to_string())?;
    let sink = IngestionClient::new(&config.ingestion.base_url, &ingestion_key).map_err(|e| e.to_string())?;
    let (scheduler, queue) = QueueScheduler::channel();

    let ctx = ActionContext {
        api: Arc::new(api),
        sink: Arc::new(sink),
        scheduler: Arc::new(scheduler),
        watermarks: WatermarkStore::new(state),
    };
    let runner = Arc::new(ActionRunner::new(config.integrations, ctx));
    Ok(Daemon::new(config.service, runner, queue))
}

fn main() {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    println!("🌦  VitalWeather Connector");
    println!("=========================\n");

    let raw_args: Vec<String> = env::args().collect();
    let args = parse_args(&raw_args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    let config = config::load_config(&args.config_path).unwrap_or_else(|e| {
        eprintln!("\n❌ Configuration error: {}\n", e);
        process::exit(1);
    });
    println!(
        "📋 Loaded {} ({} integrations)",
        args.config_path,
        config.integrations.len()
    );

    let daemon = build_daemon(config).unwrap_or_else(|e| {
        eprintln!("\n❌ Initialization failed: {}\n", e);
        process::exit(1);
    });
    println!("✓ Daemon initialized\n");

    // One-shot mode: run a single action, then any work it triggered
    if let (Some(action), Some(integration)) = (&args.action, &args.integration) {
        let request = ActionRequest::new(integration, action, None);
        match daemon.runner().execute(&request) {
            Ok(result) => {
                daemon.run_until_idle();
                println!("{}", serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string()));
                return;
            }
            Err(e) => {
                eprintln!("\n❌ Action '{}' failed: {}\n", action, e);
                process::exit(1);
            }
        }
    }

    if let Some(port) = args.endpoint_port {
        println!("🚀 Starting HTTP endpoint server on port {}...", port);
        let runner = Arc::clone(daemon.runner());
        std::thread::spawn(move || {
            if let Err(e) = endpoint::start_endpoint_server(port, runner) {
                log::error!("HTTP endpoint error: {}", e);
            }
        });
    }

    if let Err(e) = daemon.run() {
        eprintln!("\n❌ Daemon stopped: {}\n", e);
        process::exit(1);
    }
}
