//! Configuration types.
//!
//! Every section except `[relayer]` and `[wallet]` has defaults for the Base
//! mainnet deployment, so a config file only needs the secrets.

use alloy::primitives::{address, Address};
use obsidian_types::OrderRouting;
use serde::{Deserialize, Serialize};

/// Complete configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
	/// Tracing filter used when neither `RUST_LOG` nor `--log-level` is set.
	#[serde(default)]
	pub log_level: Option<String>,
	#[serde(default)]
	pub network: NetworkConfig,
	#[serde(default)]
	pub contracts: ContractsConfig,
	#[serde(default)]
	pub order_server: OrderServerConfig,
	/// Operator account that relays settlement transactions.
	#[serde(default)]
	pub relayer: Option<RelayerConfig>,
	/// Trader key for headless signing.
	#[serde(default)]
	pub wallet: Option<WalletConfig>,
	#[serde(default)]
	pub solver: SolverConfig,
	#[serde(default)]
	pub explorer: ExplorerConfig,
}

impl Config {
	/// Routing constants sent with every order.
	pub fn routing(&self) -> OrderRouting {
		OrderRouting {
			chain_id: self.network.chain_id,
			pool_address: self.contracts.pool,
			sell_token: self.contracts.sell_token,
			buy_token: self.contracts.buy_token,
			swap_venue: self.contracts.swap_venue.clone(),
		}
	}

	/// The `[relayer]` section as the table the delivery factory expects,
	/// with the network RPC URL filled in when the relayer has none.
	pub fn relayer_table(&self) -> Option<toml::Value> {
		let relayer = self.relayer.as_ref()?;
		let mut table = toml::map::Map::new();
		table.insert(
			"rpc_url".to_string(),
			toml::Value::String(
				relayer
					.rpc_url
					.clone()
					.unwrap_or_else(|| self.network.rpc_url.clone()),
			),
		);
		table.insert(
			"private_key".to_string(),
			toml::Value::String(relayer.private_key.clone()),
		);
		table.insert(
			"chain_id".to_string(),
			toml::Value::Integer(self.network.chain_id as i64),
		);
		table.insert(
			"confirmation_timeout_secs".to_string(),
			toml::Value::Integer(relayer.confirmation_timeout_secs as i64),
		);
		table.insert(
			"poll_interval_ms".to_string(),
			toml::Value::Integer(relayer.poll_interval_ms as i64),
		);
		Some(toml::Value::Table(table))
	}

	/// The `[wallet]` section as the table the account factory expects.
	pub fn wallet_table(&self) -> Option<toml::Value> {
		let wallet = self.wallet.as_ref()?;
		let mut table = toml::map::Map::new();
		table.insert(
			"private_key".to_string(),
			toml::Value::String(wallet.private_key.clone()),
		);
		table.insert(
			"chain_id".to_string(),
			toml::Value::Integer(wallet.chain_id.unwrap_or(self.network.chain_id) as i64),
		);
		Some(toml::Value::Table(table))
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	#[serde(default = "default_chain_id")]
	pub chain_id: u64,
	/// Display name used in the network switch notice.
	#[serde(default = "default_network_name")]
	pub name: String,
	#[serde(default = "default_rpc_url")]
	pub rpc_url: String,
	#[serde(default = "default_block_poll_interval_secs")]
	pub block_poll_interval_secs: u64,
}

impl Default for NetworkConfig {
	fn default() -> Self {
		Self {
			chain_id: default_chain_id(),
			name: default_network_name(),
			rpc_url: default_rpc_url(),
			block_poll_interval_secs: default_block_poll_interval_secs(),
		}
	}
}

/// Deployment addresses on the configured chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractsConfig {
	#[serde(default = "default_router")]
	pub router: Address,
	#[serde(default = "default_pool")]
	pub pool: Address,
	/// USDC on Base.
	#[serde(default = "default_sell_token")]
	pub sell_token: Address,
	/// WETH on Base.
	#[serde(default = "default_buy_token")]
	pub buy_token: Address,
	#[serde(default = "default_sell_token_decimals")]
	pub sell_token_decimals: u32,
	#[serde(default = "default_swap_venue")]
	pub swap_venue: String,
}

impl Default for ContractsConfig {
	fn default() -> Self {
		Self {
			router: default_router(),
			pool: default_pool(),
			sell_token: default_sell_token(),
			buy_token: default_buy_token(),
			sell_token_decimals: default_sell_token_decimals(),
			swap_venue: default_swap_venue(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderServerConfig {
	#[serde(default = "default_order_server_url")]
	pub url: String,
	/// Upper bound on the proof wait.
	#[serde(default = "default_order_timeout_secs")]
	pub timeout_secs: u64,
	#[serde(default = "default_heartbeat_secs")]
	pub heartbeat_secs: u64,
}

impl Default for OrderServerConfig {
	fn default() -> Self {
		Self {
			url: default_order_server_url(),
			timeout_secs: default_order_timeout_secs(),
			heartbeat_secs: default_heartbeat_secs(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayerConfig {
	pub private_key: String,
	/// Defaults to `network.rpc_url`.
	#[serde(default)]
	pub rpc_url: Option<String>,
	#[serde(default = "default_confirmation_timeout_secs")]
	pub confirmation_timeout_secs: u64,
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	pub private_key: String,
	/// Chain the wallet reports, defaults to `network.chain_id`.
	#[serde(default)]
	pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
	/// Solver shown in the "order matched" timeline stage.
	#[serde(default = "default_solver_address")]
	pub address: Address,
}

impl Default for SolverConfig {
	fn default() -> Self {
		Self {
			address: default_solver_address(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplorerConfig {
	/// Transaction page prefix; links are `{tx_url}/{hash}`.
	#[serde(default = "default_explorer_tx_url")]
	pub tx_url: String,
}

impl Default for ExplorerConfig {
	fn default() -> Self {
		Self {
			tx_url: default_explorer_tx_url(),
		}
	}
}

fn default_chain_id() -> u64 {
	8453
}

fn default_network_name() -> String {
	"Base".to_string()
}

fn default_rpc_url() -> String {
	"https://mainnet.base.org".to_string()
}

fn default_block_poll_interval_secs() -> u64 {
	5
}

fn default_router() -> Address {
	address!("Ee395f9489bdC1b74A1BFc3B3164a5FEFb7146AE")
}

fn default_pool() -> Address {
	address!("88a43bbdf9d098eec7bceda4e2494615dfd9bb9c")
}

fn default_sell_token() -> Address {
	address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")
}

fn default_buy_token() -> Address {
	address!("4200000000000000000000000000000000000006")
}

fn default_sell_token_decimals() -> u32 {
	6
}

fn default_swap_venue() -> String {
	"uniswap".to_string()
}

fn default_order_server_url() -> String {
	"http://127.0.0.1:8069".to_string()
}

fn default_order_timeout_secs() -> u64 {
	1800
}

fn default_heartbeat_secs() -> u64 {
	30
}

fn default_confirmation_timeout_secs() -> u64 {
	120
}

fn default_poll_interval_ms() -> u64 {
	2000
}

fn default_solver_address() -> Address {
	address!("d4f23AfEAcfc05399E58e122B9a23cD04FA02C3B")
}

fn default_explorer_tx_url() -> String {
	"https://basescan.org/tx".to_string()
}
