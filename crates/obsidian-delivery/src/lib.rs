//! Settlement transaction delivery.
//!
//! [`DeliveryInterface`] is the chain RPC seam: reads, gas pricing, signing
//! and broadcast, and receipt tracking. [`Relayer`] sits on top of it and owns
//! the operator account's nonce, so it is the only component that ever
//! broadcasts settlement transactions.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use obsidian_types::{ConfigSchema, PreparedTransaction, RelayReceipt, RelayTransaction};
use thiserror::Error;

pub mod relayer;
pub mod state;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

pub use relayer::Relayer;
pub use state::{NonceTracker, RelayerState};

/// Errors that can occur during transaction delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// RPC transport or node failure.
	#[error("Network error: {0}")]
	Network(String),
	/// `eth_estimateGas` rejected the call, usually a revert.
	#[error("Gas estimation failed: {0}")]
	GasEstimation(String),
	/// The node refused the signed transaction.
	#[error("Transaction rejected: {0}")]
	Rejected(String),
	#[error("Timed out after {0}s waiting for receipt")]
	Timeout(u64),
	#[error("Invalid relayer state: {0}")]
	InvalidState(String),
	#[error("Invalid configuration: {0}")]
	Config(String),
}

/// Chain access used by the relayer and the block tracker.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Returns the configuration schema for this delivery implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Account that signs submitted transactions.
	fn address(&self) -> Address;

	/// Chain transactions are signed for.
	fn chain_id(&self) -> u64;

	async fn block_number(&self) -> Result<u64, DeliveryError>;

	/// Transaction count of `address` including pending transactions.
	async fn transaction_count(&self, address: Address) -> Result<u64, DeliveryError>;

	async fn gas_price(&self) -> Result<u128, DeliveryError>;

	async fn estimate_gas(&self, tx: &RelayTransaction) -> Result<u64, DeliveryError>;

	/// Signs and broadcasts a fully prepared transaction.
	async fn submit(&self, tx: &PreparedTransaction) -> Result<B256, DeliveryError>;

	/// Waits until the transaction is mined.
	async fn wait_for_receipt(&self, hash: B256) -> Result<RelayReceipt, DeliveryError>;

	async fn balance(&self, address: Address) -> Result<U256, DeliveryError>;
}

/// First eight hex characters of a hash, for log fields.
pub(crate) fn truncate_hash(hash: &B256) -> String {
	let hash_str = hex::encode(hash.as_slice());
	format!("{}..", &hash_str[..8])
}
