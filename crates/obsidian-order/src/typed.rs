//! EIP-712 typed orders.
//!
//! An Obsidian order commits a trader to selling `sellAmount` of the sell
//! token for the buy token, referenced to a recent block. The router verifies
//! the signature against the domain `ObsidianRouter` version `1` on the
//! deployment chain.

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::OrderError;

/// EIP-712 domain name the router verifies against.
pub const DOMAIN_NAME: &str = "ObsidianRouter";
/// EIP-712 domain version the router verifies against.
pub const DOMAIN_VERSION: &str = "1";
/// Primary type of every Obsidian order.
pub const PRIMARY_TYPE: &str = "ObsidianOrder";

sol! {
	/// On-chain layout of a signed order.
	#[derive(Debug, PartialEq, Eq)]
	struct ObsidianOrder {
		uint256 blockNumber;
		uint256 sellAmount;
		address buyToken;
		address sellToken;
	}
}

/// Signing domain of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDomain {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

impl OrderDomain {
	pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
		Self {
			name: DOMAIN_NAME.to_string(),
			version: DOMAIN_VERSION.to_string(),
			chain_id,
			verifying_contract,
		}
	}

	pub fn eip712_domain(&self) -> Eip712Domain {
		Eip712Domain::new(
			Some(Cow::Owned(self.name.clone())),
			Some(Cow::Owned(self.version.clone())),
			Some(U256::from(self.chain_id)),
			Some(self.verifying_contract),
			None,
		)
	}

	/// The domain separator hashed into every signing digest.
	pub fn separator(&self) -> B256 {
		self.eip712_domain().separator()
	}
}

/// One `{name, type}` entry of a typed-data schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
	pub name: String,
	#[serde(rename = "type")]
	pub kind: String,
}

impl TypedField {
	fn new(name: &str, kind: &str) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
		}
	}
}

/// Field schemas of the domain and the order struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTypes {
	#[serde(rename = "EIP712Domain")]
	pub eip712_domain: Vec<TypedField>,
	#[serde(rename = "ObsidianOrder")]
	pub obsidian_order: Vec<TypedField>,
}

impl Default for OrderTypes {
	fn default() -> Self {
		Self {
			eip712_domain: vec![
				TypedField::new("name", "string"),
				TypedField::new("version", "string"),
				TypedField::new("chainId", "uint256"),
				TypedField::new("verifyingContract", "address"),
			],
			obsidian_order: vec![
				TypedField::new("blockNumber", "uint256"),
				TypedField::new("sellAmount", "uint256"),
				TypedField::new("buyToken", "address"),
				TypedField::new("sellToken", "address"),
			],
		}
	}
}

/// The signed message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessage {
	pub block_number: U256,
	pub sell_amount: U256,
	pub buy_token: Address,
	pub sell_token: Address,
}

/// A complete typed-data order, ready to hand to a signer.
///
/// Serializes to the standard `{domain, primaryType, types, message}` shape
/// that wallet `eth_signTypedData_v4` implementations accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedOrder {
	pub domain: OrderDomain,
	pub primary_type: String,
	pub types: OrderTypes,
	pub message: OrderMessage,
}

/// Builds a typed order.
///
/// Total and deterministic: the same arguments always yield an identical
/// value, and therefore the same JSON and the same signing hash. Invariants
/// on the amounts are checked separately by [`TypedOrder::validate`].
pub fn build_order(
	chain_id: u64,
	verifying_contract: Address,
	block_number: u64,
	sell_amount: U256,
	buy_token: Address,
	sell_token: Address,
) -> TypedOrder {
	TypedOrder {
		domain: OrderDomain::new(chain_id, verifying_contract),
		primary_type: PRIMARY_TYPE.to_string(),
		types: OrderTypes::default(),
		message: OrderMessage {
			block_number: U256::from(block_number),
			sell_amount,
			buy_token,
			sell_token,
		},
	}
}

impl TypedOrder {
	/// Checks that the order could be accepted by the router.
	pub fn validate(&self) -> Result<(), OrderError> {
		if self.message.sell_amount.is_zero() {
			return Err(OrderError::ValidationFailed(
				"sell amount must be greater than zero".to_string(),
			));
		}
		if self.message.block_number.is_zero() {
			return Err(OrderError::ValidationFailed(
				"block number must be greater than zero".to_string(),
			));
		}
		Ok(())
	}

	pub fn as_sol(&self) -> ObsidianOrder {
		ObsidianOrder {
			blockNumber: self.message.block_number,
			sellAmount: self.message.sell_amount,
			buyToken: self.message.buy_token,
			sellToken: self.message.sell_token,
		}
	}

	/// EIP-712 digest: `keccak256(0x1901 || domainSeparator || hashStruct(order))`.
	pub fn signing_hash(&self) -> B256 {
		self.as_sol()
			.eip712_signing_hash(&self.domain.eip712_domain())
	}
}

/// A typed order together with the trader's signature over its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
	pub typed_data: TypedOrder,
	/// Address of the signing trader.
	pub signer: Address,
	/// `0x`-prefixed 65-byte `r || s || v` signature.
	pub signature: String,
}
