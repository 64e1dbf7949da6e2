//! Local private key account.
//!
//! Signs orders with a key held in process memory. Used for headless trading
//! from the CLI and in tests; a connected browser wallet implements the same
//! trait elsewhere.

use crate::{AccountError, AccountInterface};
use alloy::primitives::{Address, Signature};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use obsidian_order::TypedOrder;
use obsidian_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};

/// Default chain a headless wallet reports when none is configured (Base).
const DEFAULT_CHAIN_ID: u64 = 8453;

/// Local wallet backed by an alloy [`PrivateKeySigner`].
pub struct LocalWallet {
	signer: PrivateKeySigner,
	/// Chain the wallet reports as connected to.
	chain_id: u64,
}

impl LocalWallet {
	/// Creates a wallet from a hex private key, with or without `0x`.
	pub fn new(private_key_hex: &str, chain_id: u64) -> Result<Self, AccountError> {
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

		Ok(Self { signer, chain_id })
	}

	pub fn from_signer(signer: PrivateKeySigner, chain_id: u64) -> Self {
		Self { signer, chain_id }
	}
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("private_key", FieldType::PrivateKey)],
			vec![Field::new(
				"chain_id",
				FieldType::Integer {
					min: Some(1),
					max: None,
				},
			)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn is_connected(&self) -> bool {
		true
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn chain_id(&self) -> Result<u64, AccountError> {
		Ok(self.chain_id)
	}

	async fn sign_typed_order(&self, order: &TypedOrder) -> Result<Signature, AccountError> {
		let hash = order.signing_hash();
		self.signer
			.sign_hash(&hash)
			.await
			.map_err(|e| AccountError::SigningFailed(format!("Failed to sign order: {}", e)))
	}
}

/// Creates a local wallet from a `[wallet]` config table.
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;
	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.map(|id| id as u64)
		.unwrap_or(DEFAULT_CHAIN_ID);

	Ok(Box::new(LocalWallet::new(private_key, chain_id)?))
}
