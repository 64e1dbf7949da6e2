//! Wire types exchanged with the order-matching server.
//!
//! The server accepts a signed sell order on `POST /v1/order` and replies,
//! once a solver has matched the order and produced a proof, with the proof
//! and its public values.

use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::utils::{decode_hex, HexError};

/// Static routing constants that accompany every order.
///
/// These identify where the swap executes and which tokens it trades. They
/// come from configuration and never change between orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRouting {
	/// Chain the order settles on.
	pub chain_id: u64,
	/// Liquidity pool the solver swaps through.
	pub pool_address: Address,
	/// Token the trader sells (USDC).
	pub sell_token: Address,
	/// Token the trader buys (WETH).
	pub buy_token: Address,
	/// Venue tag understood by the solver, e.g. `"uniswap"`.
	pub swap_venue: String,
}

/// JSON body of `POST {order_server}/v1/order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
	pub chain_id: u64,
	pub pool_address: Address,
	pub sell_token: Address,
	pub buy_token: Address,
	/// Trader address that signed the order.
	pub address: Address,
	/// Sell amount in integer base units, as a decimal string.
	pub amount: String,
	pub swap_venue: String,
	/// Reference block the order was signed against.
	pub commit_block: u64,
	/// `0x`-prefixed 65-byte signature.
	pub signature: String,
}

/// Reply from the order server.
///
/// Exactly one is produced per submitted order. When `error` is `None` the
/// proof and public values are present and hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProofResponse {
	#[serde(default)]
	pub block: u64,
	#[serde(default)]
	pub proof: String,
	#[serde(default)]
	pub public_values: String,
	#[serde(default)]
	pub error: Option<String>,
}

impl OrderProofResponse {
	/// Decoded proof bytes.
	pub fn proof_bytes(&self) -> Result<Bytes, HexError> {
		decode_hex(&self.proof)
	}

	/// Decoded public values committed by the proving program.
	pub fn public_values_bytes(&self) -> Result<Bytes, HexError> {
		decode_hex(&self.public_values)
	}
}
