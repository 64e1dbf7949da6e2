//! Wires the pipeline components from a loaded [`Config`].

use crate::render;
use alloy::primitives::utils::format_ether;
use alloy::primitives::Address;
use anyhow::{Context, Result};
use obsidian_account::implementations::local::create_account;
use obsidian_account::{AccountInterface, SigningClient, SigningSettings};
use obsidian_config::{Config, ConfigLoader};
use obsidian_core::{BlockTracker, LifecycleSettings, OrderLifecycle, OrderResult};
use obsidian_delivery::implementations::evm::alloy::create_http_delivery;
use obsidian_delivery::{DeliveryInterface, Relayer};
use obsidian_gateway::{GatewaySettings, OrderGateway};
use obsidian_types::{EventBus, LogStream};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

const EVENT_BUS_CAPACITY: usize = 1024;

pub async fn load_config(path: &Path) -> Result<Config> {
	ConfigLoader::new()
		.with_file(path)
		.load()
		.await
		.with_context(|| format!("Failed to load configuration from {:?}", path))
}

pub struct RelayerStatus {
	pub address: Address,
	/// Balance in ether.
	pub balance: String,
	pub nonce: u64,
}

pub struct ObsidianService {
	config: Config,
	delivery: Arc<dyn DeliveryInterface>,
	relayer: Arc<Relayer>,
	logs: LogStream,
}

impl ObsidianService {
	pub fn new(config: Config) -> Result<Self> {
		let table = config
			.relayer_table()
			.context("Configuration has no [relayer] section")?;
		let delivery: Arc<dyn DeliveryInterface> =
			Arc::from(create_http_delivery(&table).context("Failed to create relayer")?);
		let relayer = Arc::new(Relayer::new(delivery.clone()));

		tracing::info!(
			relayer = %relayer.address(),
			chain_id = config.network.chain_id,
			"Relayer ready"
		);

		Ok(Self {
			config,
			delivery,
			relayer,
			logs: LogStream::new(EventBus::new(EVENT_BUS_CAPACITY)),
		})
	}

	pub async fn relayer_status(&self) -> Result<RelayerStatus> {
		let balance = self.relayer.balance().await?;
		let nonce = self.relayer.sync_nonce().await?;
		Ok(RelayerStatus {
			address: self.relayer.address(),
			balance: format_ether(balance),
			nonce,
		})
	}

	/// Runs one order attempt, returning `None` when `shutdown` fires first.
	pub async fn trade(
		&self,
		amount: &str,
		shutdown: impl Future<Output = ()>,
	) -> Result<Option<OrderResult>> {
		let wallet = self
			.config
			.wallet_table()
			.context("Trading needs a [wallet] section")?;
		let account: Arc<dyn AccountInterface> =
			Arc::from(create_account(&wallet).context("Failed to create wallet")?);

		let tracker = BlockTracker::new(
			self.delivery.clone(),
			Duration::from_secs(self.config.network.block_poll_interval_secs),
		);
		let blocks = tracker.subscribe();
		if tracker.poll().await.is_none() {
			tracing::warn!("No block number available yet");
		}
		let (stop_tx, stop_rx) = broadcast::channel(1);
		let tracker_handle = tracker.spawn(stop_rx);

		let lifecycle = self.build_lifecycle(account, blocks);

		let (done_tx, done_rx) = oneshot::channel();
		let renderer = tokio::spawn(render::render_events(self.logs.subscribe(), done_rx));

		let outcome = tokio::select! {
			result = lifecycle.sign_order(amount) => Some(result),
			_ = shutdown => {
				tracing::warn!("Cancelling order attempt");
				None
			}
		};

		let _ = stop_tx.send(());
		let _ = done_tx.send(());
		if let Err(e) = tracker_handle.await {
			tracing::warn!(error = %e, "Block tracker task failed");
		}
		if let Err(e) = renderer.await {
			tracing::warn!(error = %e, "Renderer task failed");
		}

		match outcome {
			Some(result) => Ok(Some(result.context("Order attempt failed")?)),
			None => Ok(None),
		}
	}

	fn build_lifecycle(
		&self,
		account: Arc<dyn AccountInterface>,
		blocks: tokio::sync::watch::Receiver<Option<u64>>,
	) -> OrderLifecycle {
		let config = &self.config;

		let signing = SigningClient::new(
			account,
			SigningSettings {
				chain_id: config.network.chain_id,
				network_name: config.network.name.clone(),
				router: config.contracts.router,
				sell_token: config.contracts.sell_token,
				buy_token: config.contracts.buy_token,
				sell_decimals: config.contracts.sell_token_decimals,
			},
			blocks,
			self.logs.clone(),
		);

		let gateway = OrderGateway::new(
			GatewaySettings {
				url: config.order_server.url.clone(),
				timeout: Duration::from_secs(config.order_server.timeout_secs),
				heartbeat: Duration::from_secs(config.order_server.heartbeat_secs),
			},
			self.logs.clone(),
		);

		OrderLifecycle::new(
			signing,
			gateway,
			self.relayer.clone(),
			LifecycleSettings {
				router: config.contracts.router,
				routing: config.routing(),
				solver: config.solver.address,
				explorer_tx_url: config.explorer.tx_url.clone(),
			},
			self.logs.clone(),
		)
	}
}
