//! Trader accounts and order signing.
//!
//! The signing capability itself sits behind [`AccountInterface`] so that a
//! browser wallet bridge, a hardware signer or a plain local key can all
//! drive the same [`SigningClient`].

use alloy::primitives::{Address, Signature};
use async_trait::async_trait;
use obsidian_order::TypedOrder;
use obsidian_types::ConfigSchema;
use thiserror::Error;

pub mod client;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

pub use client::{parse_sell_amount, Rejection, SigningClient, SigningError, SigningSettings};

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// A trader's signing capability.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the configuration schema for this account implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Whether the account is authenticated and able to sign.
	async fn is_connected(&self) -> bool;

	async fn address(&self) -> Result<Address, AccountError>;

	/// Chain the account is currently connected to.
	async fn chain_id(&self) -> Result<u64, AccountError>;

	/// Signs the EIP-712 digest of a typed order.
	async fn sign_typed_order(&self, order: &TypedOrder) -> Result<Signature, AccountError>;
}

/// `0x`-prefixed hex of the 65-byte `r || s || v` encoding.
pub fn signature_hex(signature: &Signature) -> String {
	format!("0x{}", hex::encode(signature.as_bytes()))
}
