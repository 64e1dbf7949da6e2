use alloy::primitives::B256;
use obsidian_account::{Rejection, SigningError};
use obsidian_delivery::DeliveryError;
use obsidian_gateway::GatewayError;
use obsidian_order::OrderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
	#[error("An order is already in progress")]
	Busy,

	#[error("{0}")]
	Rejected(Rejection),

	#[error("Signing error: {0}")]
	Signing(String),

	#[error(transparent)]
	Gateway(#[from] GatewayError),

	#[error("Encoding error: {0}")]
	Encoding(#[from] OrderError),

	#[error("Relay error: {0}")]
	Delivery(#[from] DeliveryError),

	#[error("Transaction {0} reverted")]
	Reverted(B256),

	#[error("Invalid timeline stage: {0}")]
	InvalidStage(String),
}

impl From<SigningError> for LifecycleError {
	fn from(err: SigningError) -> Self {
		match err {
			SigningError::Rejected(rejection) => LifecycleError::Rejected(rejection),
			other => LifecycleError::Signing(other.to_string()),
		}
	}
}
