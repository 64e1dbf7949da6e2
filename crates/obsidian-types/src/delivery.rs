//! Relay transaction types.
//!
//! These describe the settlement call handed to the relayer and what comes
//! back once it has been mined.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A call the relayer signs and broadcasts with its own key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTransaction {
	/// Contract being called, the settlement router.
	pub to: Address,
	/// ABI-encoded calldata.
	pub data: Bytes,
	/// Native value attached, zero for `solve`.
	#[serde(default)]
	pub value: U256,
}

/// A relay transaction with every field the relayer fills in before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
	pub transaction: RelayTransaction,
	/// Chain id for replay protection.
	pub chain_id: u64,
	/// Nonce claimed from the relayer's local counter.
	pub nonce: u64,
	/// Gas limit from `eth_estimateGas`.
	pub gas_limit: u64,
	/// Legacy gas price from `eth_gasPrice`.
	pub gas_price: u128,
}

/// Receipt of a mined relay transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReceipt {
	/// Hash of the mined transaction.
	pub hash: B256,
	/// Block the transaction was included in.
	pub block_number: u64,
	/// Gas consumed by execution.
	pub gas_used: u64,
	/// Whether execution succeeded.
	pub success: bool,
}

/// Result of `Relayer::send_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayOutcome {
	pub hash: B256,
	pub receipt: RelayReceipt,
	/// True only if the mined status is success.
	pub success: bool,
}
