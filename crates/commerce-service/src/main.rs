//! Main entry point for the commerce backend service.
//!
//! This binary wires the configured storage backend to the order service and
//! exposes the order lifecycle over HTTP. Storage backends are pluggable and
//! resolved by name from the configuration.

use clap::Parser;
use commerce_config::Config;
use commerce_core::OrderService;
use commerce_storage::{get_all_implementations, StoreBackend};
use commerce_types::IdGenerator;
use std::path::PathBuf;
use std::sync::Arc;

mod server;

/// Command-line arguments for the commerce service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the commerce service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the order service over the configured storage backend
/// 5. Serves the HTTP API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.init();

	// Load configuration
	let config = Config::from_file_async(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	// Resolve and build the configured storage backend
	let store = build_store(&config)?;
	tracing::info!("Storage backend [{}] ready", config.storage.backend);

	let service = Arc::new(OrderService::new(store, Arc::new(IdGenerator::new())));

	match config.api {
		Some(ref api) if api.enabled => {
			server::start_server(api.clone(), service).await?;
		},
		_ => {
			tracing::warn!("API server disabled, nothing to serve; exiting");
		},
	}

	tracing::info!("Stopped commerce service");
	Ok(())
}

/// Builds the storage backend named in the configuration.
fn build_store(config: &Config) -> Result<Arc<dyn StoreBackend>, Box<dyn std::error::Error>> {
	let implementations = get_all_implementations();
	let factory = implementations
		.iter()
		.find(|(name, _)| *name == config.storage.backend)
		.map(|(_, factory)| factory)
		.ok_or_else(|| {
			let known: Vec<&str> = implementations.iter().map(|(name, _)| *name).collect();
			format!(
				"unknown storage backend '{}', known backends: {}",
				config.storage.backend,
				known.join(", ")
			)
		})?;

	Ok(factory(&config.storage.config)?)
}
