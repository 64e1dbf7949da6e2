//! Nonce-managed relayer.
//!
//! The relayer signs settlement transactions with an operator key so traders
//! never pay gas. Its nonce is read from the chain on first use and advanced
//! locally after each broadcast. Any failure re-reads it from the chain.
//!
//! The nonce lock is held for the whole send, confirmation included, so
//! concurrent sends are serialised and can never share a nonce.

use crate::state::{NonceTracker, RelayerState};
use crate::{truncate_hash, DeliveryError, DeliveryInterface};
use alloy::primitives::{Address, U256};
use obsidian_types::{PreparedTransaction, RelayOutcome, RelayTransaction};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Relayer {
	delivery: Arc<dyn DeliveryInterface>,
	tracker: Mutex<NonceTracker>,
}

impl Relayer {
	/// Creates a relayer. Nothing is read from the chain until the first send.
	pub fn new(delivery: Arc<dyn DeliveryInterface>) -> Self {
		Self {
			delivery,
			tracker: Mutex::new(NonceTracker::new()),
		}
	}

	pub fn address(&self) -> Address {
		self.delivery.address()
	}

	pub async fn balance(&self) -> Result<U256, DeliveryError> {
		self.delivery.balance(self.address()).await
	}

	/// Next nonce to be used, `None` before the first sync.
	pub async fn current_nonce(&self) -> Option<u64> {
		self.tracker.lock().await.nonce()
	}

	pub async fn state(&self) -> RelayerState {
		self.tracker.lock().await.state()
	}

	/// Reads the chain transaction count into the local nonce if it has not
	/// been read yet, or if the last send was failed or abandoned.
	pub async fn sync_nonce(&self) -> Result<u64, DeliveryError> {
		let mut tracker = self.tracker.lock().await;
		self.ensure_synced(&mut tracker).await
	}

	async fn ensure_synced(&self, tracker: &mut NonceTracker) -> Result<u64, DeliveryError> {
		if let (RelayerState::NonceSynced, Some(nonce)) = (tracker.state(), tracker.nonce()) {
			return Ok(nonce);
		}

		// The lock is only ever free in `Sending` when a send future was
		// dropped mid-flight. Whether its broadcast landed is unknown.
		if tracker.state() == RelayerState::Sending {
			tracing::warn!(nonce = ?tracker.nonce(), "Previous send was abandoned, resyncing nonce");
			tracker.fail()?;
		}

		let count = self.delivery.transaction_count(self.address()).await?;
		tracker.sync(count)?;
		tracing::info!(relayer = %self.address(), nonce = count, "Relayer nonce synced");
		Ok(count)
	}

	/// Estimates, signs, broadcasts and confirms `tx`.
	///
	/// `success` in the outcome is true only when the receipt status is
	/// success; a mined revert still consumes the nonce.
	pub async fn send_transaction(
		&self,
		tx: RelayTransaction,
	) -> Result<RelayOutcome, DeliveryError> {
		let mut tracker = self.tracker.lock().await;
		self.ensure_synced(&mut tracker).await?;

		let nonce = tracker.begin_send()?;
		match self.broadcast(&mut tracker, tx, nonce).await {
			Ok(outcome) => {
				tracker.confirm()?;
				Ok(outcome)
			}
			Err(e) => {
				tracing::error!(nonce = nonce, error = %e, "Relay transaction failed");
				tracker.fail()?;
				self.resync(&mut tracker).await?;
				Err(e)
			}
		}
	}

	async fn broadcast(
		&self,
		tracker: &mut NonceTracker,
		tx: RelayTransaction,
		nonce: u64,
	) -> Result<RelayOutcome, DeliveryError> {
		let gas_price = self.delivery.gas_price().await?;
		let gas_limit = self.delivery.estimate_gas(&tx).await?;

		let prepared = PreparedTransaction {
			transaction: tx,
			chain_id: self.delivery.chain_id(),
			nonce,
			gas_limit,
			gas_price,
		};

		let hash = self.delivery.submit(&prepared).await?;
		tracker.advance()?;
		tracing::info!(
			tx_hash = %truncate_hash(&hash),
			nonce = nonce,
			gas_limit = gas_limit,
			"Submitted relay transaction"
		);

		let receipt = self.delivery.wait_for_receipt(hash).await?;
		if !receipt.success {
			tracing::warn!(tx_hash = %truncate_hash(&hash), "Relay transaction reverted");
		}

		Ok(RelayOutcome {
			hash,
			success: receipt.success,
			receipt,
		})
	}

	async fn resync(&self, tracker: &mut NonceTracker) -> Result<(), DeliveryError> {
		match self.delivery.transaction_count(self.address()).await {
			Ok(count) => {
				tracker.sync(count)?;
				tracing::info!(nonce = count, "Relayer nonce resynced after failure");
			}
			Err(e) => {
				tracing::warn!(error = %e, "Nonce resync failed, will retry on next send");
				tracker.invalidate()?;
			}
		}
		Ok(())
	}
}
