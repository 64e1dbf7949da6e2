use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;
mod service;

use service::ObsidianService;

const DEFAULT_AMOUNT: &str = "100";

#[derive(Parser)]
#[command(name = "obsidian")]
#[command(about = "Obsidian order pipeline", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	/// Takes precedence over `log_level` in the config file.
	#[arg(long, env = "OBSIDIAN_LOG_LEVEL")]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Sign, prove and settle one order
	Trade {
		/// Sell amount in whole tokens, e.g. "10.5"
		#[arg(short, long, default_value = DEFAULT_AMOUNT)]
		amount: String,
	},
	/// Validate the configuration file
	Validate,
	/// Show the relayer account and its nonce
	Relayer,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = service::load_config(&cli.config).await?;

	let log_level = cli
		.log_level
		.clone()
		.or_else(|| config.log_level.clone())
		.unwrap_or_else(|| "info".to_string());
	setup_tracing(&log_level)?;

	match cli.command {
		Some(Commands::Trade { amount }) => trade(config, &amount).await,
		None => trade(config, DEFAULT_AMOUNT).await,
		Some(Commands::Validate) => validate_config(&cli.config, config),
		Some(Commands::Relayer) => relayer_status(config).await,
	}
}

async fn trade(config: obsidian_config::Config, amount: &str) -> Result<()> {
	info!(amount = %amount, "Starting order attempt");

	let service = ObsidianService::new(config)?;
	match service.trade(amount, shutdown_signal()).await? {
		Some(result) => {
			info!(
				attempt = %result.attempt_id,
				tx_hash = %result.solve_transaction.hash,
				"Order settled"
			);
			println!("{}", result.explorer_url);
		}
		None => info!("Order attempt cancelled"),
	}

	Ok(())
}

fn validate_config(path: &std::path::Path, config: obsidian_config::Config) -> Result<()> {
	info!("Configuration file {:?} is valid", path);
	info!(
		"Network: {} (chain {})",
		config.network.name, config.network.chain_id
	);
	info!("Router: {}", config.contracts.router);
	info!("Order server: {}", config.order_server.url);
	info!(
		"Relayer: {}",
		if config.relayer.is_some() {
			"configured"
		} else {
			"missing"
		}
	);
	info!(
		"Wallet: {}",
		if config.wallet.is_some() {
			"configured"
		} else {
			"missing"
		}
	);
	Ok(())
}

async fn relayer_status(config: obsidian_config::Config) -> Result<()> {
	let service = ObsidianService::new(config)?;
	let status = service
		.relayer_status()
		.await
		.context("Failed to query relayer")?;

	println!("address: {}", status.address);
	println!("balance: {} ETH", status.balance);
	println!("nonce:   {}", status.nonce);
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
		.context("Invalid log level")?;

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for Ctrl+C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				tracing::error!(error = %e, "Failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	info!("Shutdown signal received");
}
