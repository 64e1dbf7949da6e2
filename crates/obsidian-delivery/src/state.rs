//! Relayer nonce state machine.
//!
//! ```text
//! Uninitialized -> NonceSynced -> Sending -> Confirmed -> NonceSynced
//!                                        \-> Failed -> NonceSynced (resync)
//!                                                   \-> Uninitialized (resync failed)
//! ```

use crate::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayerState {
	/// No nonce read from the chain yet.
	Uninitialized,
	/// Local nonce agrees with what the relayer has broadcast.
	NonceSynced,
	/// A transaction is being estimated, broadcast or confirmed.
	Sending,
	Confirmed,
	/// The last send failed and the nonce must be re-read.
	Failed,
}

impl std::fmt::Display for RelayerState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Uninitialized => write!(f, "Uninitialized"),
			Self::NonceSynced => write!(f, "NonceSynced"),
			Self::Sending => write!(f, "Sending"),
			Self::Confirmed => write!(f, "Confirmed"),
			Self::Failed => write!(f, "Failed"),
		}
	}
}

impl RelayerState {
	fn is_valid_transition(self, to: RelayerState) -> bool {
		use RelayerState::*;

		matches!(
			(self, to),
			(Uninitialized, NonceSynced)
				| (NonceSynced, Sending)
				| (Sending, Confirmed)
				| (Sending, Failed)
				| (Confirmed, NonceSynced)
				| (Failed, NonceSynced)
				| (Failed, Uninitialized)
		)
	}
}

/// The relayer's local nonce together with its lifecycle state.
#[derive(Debug)]
pub struct NonceTracker {
	state: RelayerState,
	nonce: Option<u64>,
}

impl Default for NonceTracker {
	fn default() -> Self {
		Self::new()
	}
}

impl NonceTracker {
	pub fn new() -> Self {
		Self {
			state: RelayerState::Uninitialized,
			nonce: None,
		}
	}

	pub fn state(&self) -> RelayerState {
		self.state
	}

	/// Next nonce the relayer will broadcast with, once synced.
	pub fn nonce(&self) -> Option<u64> {
		self.nonce
	}

	fn set_state(&mut self, new_state: RelayerState) -> Result<(), DeliveryError> {
		let old_state = self.state;
		if !old_state.is_valid_transition(new_state) {
			return Err(DeliveryError::InvalidState(format!(
				"Invalid state transition from {} to {}",
				old_state, new_state
			)));
		}

		self.state = new_state;
		tracing::debug!("Relayer state changed: {} -> {}", old_state, new_state);
		Ok(())
	}

	/// Adopts the chain's transaction count as the local nonce.
	pub fn sync(&mut self, chain_count: u64) -> Result<(), DeliveryError> {
		self.set_state(RelayerState::NonceSynced)?;
		self.nonce = Some(chain_count);
		Ok(())
	}

	/// Starts a send and returns the nonce it must use.
	pub fn begin_send(&mut self) -> Result<u64, DeliveryError> {
		let nonce = self
			.nonce
			.ok_or_else(|| DeliveryError::InvalidState("nonce not synced".to_string()))?;
		self.set_state(RelayerState::Sending)?;
		Ok(nonce)
	}

	/// Records that a transaction with the current nonce was broadcast.
	pub fn advance(&mut self) -> Result<(), DeliveryError> {
		if self.state != RelayerState::Sending {
			return Err(DeliveryError::InvalidState(format!(
				"cannot advance nonce while {}",
				self.state
			)));
		}
		self.nonce = self.nonce.map(|n| n + 1);
		Ok(())
	}

	pub fn confirm(&mut self) -> Result<(), DeliveryError> {
		self.set_state(RelayerState::Confirmed)?;
		self.set_state(RelayerState::NonceSynced)
	}

	/// Marks the send as failed. A resync must follow.
	pub fn fail(&mut self) -> Result<(), DeliveryError> {
		self.set_state(RelayerState::Failed)
	}

	/// Forgets the nonce after a resync could not reach the chain, so the
	/// next send re-reads it.
	pub fn invalidate(&mut self) -> Result<(), DeliveryError> {
		self.set_state(RelayerState::Uninitialized)?;
		self.nonce = None;
		Ok(())
	}
}
