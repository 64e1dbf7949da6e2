//! Order signing client.
//!
//! Turns a user-entered amount into a signed order. Four preconditions are
//! checked in a fixed order before anything is signed or sent, and the first
//! failing one is surfaced to the user as a notice.

use crate::{signature_hex, AccountError, AccountInterface};
use alloy::primitives::{Address, U256};
use obsidian_order::{build_order, OrderError, SignedOrder};
use obsidian_types::{truncate_hex, LogStream, Notice};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// A precondition that stopped an order before signing.
///
/// Rejections are expected outcomes of user input, not faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
	WalletNotConnected,
	WrongNetwork {
		expected: u64,
		actual: u64,
		network: String,
	},
	InvalidAmount,
	MissingBlock,
}

impl Rejection {
	pub fn title(&self) -> &'static str {
		match self {
			Self::WalletNotConnected => "Connect wallet",
			Self::WrongNetwork { .. } => "Network Switch Required",
			Self::InvalidAmount => "Enter amount",
			Self::MissingBlock => "Error",
		}
	}

	pub fn description(&self) -> String {
		match self {
			Self::WalletNotConnected => "Please connect your wallet to trade.".to_string(),
			Self::WrongNetwork { network, .. } => {
				format!("Please switch to {} network to continue", network)
			}
			Self::InvalidAmount => "Please enter a valid amount to trade.".to_string(),
			Self::MissingBlock => "Waiting for block number...".to_string(),
		}
	}

	pub fn notice(&self) -> Notice {
		Notice {
			title: self.title().to_string(),
			description: self.description(),
		}
	}
}

impl fmt::Display for Rejection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.title(), self.description())
	}
}

#[derive(Debug, Error)]
pub enum SigningError {
	#[error("{0}")]
	Rejected(Rejection),
	#[error(transparent)]
	Account(#[from] AccountError),
	#[error(transparent)]
	Order(#[from] OrderError),
}

/// Deployment constants the client signs against.
#[derive(Debug, Clone)]
pub struct SigningSettings {
	/// Chain the wallet must be connected to.
	pub chain_id: u64,
	/// Display name of that chain, used in the network switch notice.
	pub network_name: String,
	/// Router that verifies order signatures.
	pub router: Address,
	pub sell_token: Address,
	pub buy_token: Address,
	/// Decimals of the sell token (6 for USDC).
	pub sell_decimals: u32,
}

/// Converts a decimal amount string into sell token base units.
///
/// Returns `None` unless the amount parses and floors to a positive number
/// of base units. `"10.5"` with 6 decimals gives `10500000`.
pub fn parse_sell_amount(amount: &str, decimals: u32) -> Option<U256> {
	let value = Decimal::from_str(amount.trim()).ok()?;
	if value <= Decimal::ZERO {
		return None;
	}

	let scale = Decimal::from(10u64.checked_pow(decimals)?);
	let units = value.checked_mul(scale)?.floor().to_u128()?;
	if units == 0 {
		return None;
	}
	Some(U256::from(units))
}

/// Signs orders on behalf of the connected trader.
pub struct SigningClient {
	account: Arc<dyn AccountInterface>,
	settings: SigningSettings,
	/// Latest chain height from the block tracker.
	block: watch::Receiver<Option<u64>>,
	logs: LogStream,
}

impl SigningClient {
	pub fn new(
		account: Arc<dyn AccountInterface>,
		settings: SigningSettings,
		block: watch::Receiver<Option<u64>>,
		logs: LogStream,
	) -> Self {
		Self {
			account,
			settings,
			block,
			logs,
		}
	}

	pub fn settings(&self) -> &SigningSettings {
		&self.settings
	}

	/// Checks the preconditions and returns the signer, sell amount and
	/// reference block on success.
	async fn check_preconditions(&self, amount: &str) -> Result<(Address, U256, u64), Rejection> {
		if !self.account.is_connected().await {
			return Err(Rejection::WalletNotConnected);
		}
		let signer = self
			.account
			.address()
			.await
			.map_err(|_| Rejection::WalletNotConnected)?;

		let actual = self
			.account
			.chain_id()
			.await
			.map_err(|_| Rejection::WalletNotConnected)?;
		if actual != self.settings.chain_id {
			return Err(Rejection::WrongNetwork {
				expected: self.settings.chain_id,
				actual,
				network: self.settings.network_name.clone(),
			});
		}

		let sell_amount = parse_sell_amount(amount, self.settings.sell_decimals)
			.ok_or(Rejection::InvalidAmount)?;

		let block = (*self.block.borrow())
			.filter(|b| *b > 0)
			.ok_or(Rejection::MissingBlock)?;

		Ok((signer, sell_amount, block))
	}

	/// Validates `amount`, builds the typed order and has the account sign it.
	///
	/// A failed precondition publishes a notice and returns
	/// [`SigningError::Rejected`] without touching the network.
	pub async fn sign_order(&self, amount: &str) -> Result<SignedOrder, SigningError> {
		let (signer, sell_amount, block) = match self.check_preconditions(amount).await {
			Ok(checked) => checked,
			Err(rejection) => {
				tracing::warn!(reason = %rejection, "Order rejected before signing");
				self.logs.notice(rejection.notice());
				return Err(SigningError::Rejected(rejection));
			}
		};

		self.logs.info("waiting for order signature");

		let typed_data = build_order(
			self.settings.chain_id,
			self.settings.router,
			block,
			sell_amount,
			self.settings.buy_token,
			self.settings.sell_token,
		);
		typed_data.validate()?;

		let signature = self.account.sign_typed_order(&typed_data).await?;
		let signature = signature_hex(&signature);

		self.logs.success("signature found");
		self.logs
			.info(format!("signature: {}", truncate_hex(&signature, 10, 8)));
		tracing::info!(
			signer = %signer,
			block = block,
			sell_amount = %sell_amount,
			"Order signed"
		);

		Ok(SignedOrder {
			typed_data,
			signer,
			signature,
		})
	}
}
