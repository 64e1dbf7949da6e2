//! Alloy-based EVM delivery.
//!
//! Talks JSON-RPC over HTTP. The provider is built without the recommended
//! fillers: nonce, gas limit and gas price come from the relayer, and only
//! the wallet filler is kept to sign with the operator key.

use crate::{truncate_hash, DeliveryError, DeliveryInterface};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use obsidian_types::{
	ConfigSchema, Field, FieldType, PreparedTransaction, RelayReceipt, RelayTransaction, Schema,
	ValidationError,
};
use std::time::Duration;

/// Default bound on the receipt wait.
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
/// Default receipt poll interval. Base produces a block every two seconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

pub struct AlloyDelivery {
	provider: DynProvider,
	address: Address,
	chain_id: u64,
	confirmation_timeout: Duration,
	poll_interval: Duration,
}

impl AlloyDelivery {
	/// Creates a delivery for `rpc_url` that signs with `signer`.
	pub fn new(rpc_url: &str, chain_id: u64, signer: PrivateKeySigner) -> Result<Self, DeliveryError> {
		let url = rpc_url
			.parse()
			.map_err(|e| DeliveryError::Config(format!("Invalid RPC URL: {}", e)))?;

		let address = signer.address();
		let wallet = EthereumWallet::from(signer);

		let provider = ProviderBuilder::new()
			.disable_recommended_fillers()
			.wallet(wallet)
			.connect_http(url)
			.erased();

		Ok(Self {
			provider,
			address,
			chain_id,
			confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
			poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
		})
	}

	pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
		self.confirmation_timeout = timeout;
		self
	}

	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	fn request(&self, tx: &RelayTransaction) -> TransactionRequest {
		TransactionRequest::default()
			.with_from(self.address)
			.with_to(tx.to)
			.with_input(tx.data.clone())
			.with_value(tx.value)
	}
}

/// Configuration schema for the `[relayer]` table.
pub struct AlloyDeliverySchema;

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("rpc_url", FieldType::Url),
				Field::new("private_key", FieldType::PrivateKey),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![
				Field::new(
					"confirmation_timeout_secs",
					FieldType::Integer {
						min: Some(1),
						max: Some(3600),
					},
				),
				Field::new(
					"poll_interval_ms",
					FieldType::Integer {
						min: Some(100),
						max: Some(60_000),
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyDeliverySchema)
	}

	fn address(&self) -> Address {
		self.address
	}

	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn block_number(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}

	async fn transaction_count(&self, address: Address) -> Result<u64, DeliveryError> {
		self.provider
			.get_transaction_count(address)
			.pending()
			.await
			.map_err(|e| {
				DeliveryError::Network(format!("Failed to get transaction count: {}", e))
			})
	}

	async fn gas_price(&self) -> Result<u128, DeliveryError> {
		self.provider
			.get_gas_price()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get gas price: {}", e)))
	}

	async fn estimate_gas(&self, tx: &RelayTransaction) -> Result<u64, DeliveryError> {
		self.provider
			.estimate_gas(self.request(tx))
			.await
			.map_err(|e| DeliveryError::GasEstimation(e.to_string()))
	}

	async fn submit(&self, tx: &PreparedTransaction) -> Result<B256, DeliveryError> {
		let request = self
			.request(&tx.transaction)
			.with_nonce(tx.nonce)
			.with_gas_limit(tx.gas_limit)
			.with_gas_price(tx.gas_price)
			.with_chain_id(tx.chain_id);

		// The wallet filler signs before broadcast.
		let pending = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| DeliveryError::Rejected(format!("Failed to send transaction: {}", e)))?;

		let hash = *pending.tx_hash();
		tracing::debug!(tx_hash = %truncate_hash(&hash), "Broadcast transaction");
		Ok(hash)
	}

	async fn wait_for_receipt(&self, hash: B256) -> Result<RelayReceipt, DeliveryError> {
		let start_time = tokio::time::Instant::now();

		tracing::info!(
			tx_hash = %truncate_hash(&hash),
			"Waiting for receipt (timeout: {}s)",
			self.confirmation_timeout.as_secs()
		);

		loop {
			if start_time.elapsed() > self.confirmation_timeout {
				return Err(DeliveryError::Timeout(self.confirmation_timeout.as_secs()));
			}

			match self.provider.get_transaction_receipt(hash).await {
				Ok(Some(receipt)) => {
					return Ok(RelayReceipt {
						hash: receipt.transaction_hash,
						block_number: receipt.block_number.unwrap_or(0),
						gas_used: receipt.gas_used,
						success: receipt.status(),
					});
				}
				Ok(None) => {
					tokio::time::sleep(self.poll_interval).await;
				}
				Err(e) => {
					return Err(DeliveryError::Network(format!(
						"Failed to get receipt: {}",
						e
					)));
				}
			}
		}
	}

	async fn balance(&self, address: Address) -> Result<U256, DeliveryError> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get balance: {}", e)))
	}
}

/// Creates an HTTP delivery from a `[relayer]` config table.
pub fn create_http_delivery(
	config: &toml::Value,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Config(e.to_string()))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DeliveryError::Config("rpc_url is required".to_string()))?;
	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.ok_or_else(|| DeliveryError::Config("chain_id is required".to_string()))? as u64;
	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DeliveryError::Config("private_key is required".to_string()))?;

	let signer: PrivateKeySigner = private_key
		.parse()
		.map_err(|e| DeliveryError::Config(format!("Invalid private key: {}", e)))?;

	let mut delivery = AlloyDelivery::new(rpc_url, chain_id, signer)?;
	if let Some(secs) = config
		.get("confirmation_timeout_secs")
		.and_then(|v| v.as_integer())
	{
		delivery = delivery.with_confirmation_timeout(Duration::from_secs(secs as u64));
	}
	if let Some(ms) = config.get("poll_interval_ms").and_then(|v| v.as_integer()) {
		delivery = delivery.with_poll_interval(Duration::from_millis(ms as u64));
	}

	Ok(Box::new(delivery))
}
