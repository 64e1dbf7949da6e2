//! Order submission gateway.
//!
//! Submits a signed order to the order-matching server and waits for the
//! solver's proof. The server holds the request open until a proof exists,
//! which can take many minutes, so the wait emits periodic heartbeat log
//! entries and is bounded by a configurable timeout. Dropping the future
//! returned by [`OrderGateway::submit`] abandons the request and stops the
//! heartbeat.

use alloy::primitives::U256;
use obsidian_order::SignedOrder;
use obsidian_types::{
	format_elapsed, truncate_hex, LogStream, OrderProofResponse, OrderRequest, OrderRouting,
};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval_at, sleep, Instant};

/// Default order server, a locally running matcher.
pub const DEFAULT_ORDER_SERVER_URL: &str = "http://127.0.0.1:8069";

/// Errors that can occur while submitting an order.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// The server answered with a non-success status.
	#[error("Failed to submit order (HTTP {0})")]
	SubmissionFailed(u16),
	/// The request could not be sent or the connection dropped.
	#[error("Failed to submit order: {0}")]
	Http(String),
	/// The body was not a valid proof response.
	#[error("Invalid order server response: {0}")]
	InvalidResponse(String),
	/// The server reported an error instead of a proof.
	#[error("{0}")]
	Server(String),
	#[error("Timed out after {0}s waiting for proof")]
	Timeout(u64),
	#[error("Invalid order: {0}")]
	InvalidOrder(String),
}

/// Connection settings for the order server.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
	/// Base URL; requests go to `{url}/v1/order`.
	pub url: String,
	/// Upper bound on the wait for a proof.
	pub timeout: Duration,
	/// Interval between "generating proof" log entries.
	pub heartbeat: Duration,
}

impl Default for GatewaySettings {
	fn default() -> Self {
		Self {
			url: DEFAULT_ORDER_SERVER_URL.to_string(),
			timeout: Duration::from_secs(1800),
			heartbeat: Duration::from_secs(30),
		}
	}
}

/// Builds the wire payload for a signed order.
pub fn build_request(
	signed: &SignedOrder,
	routing: &OrderRouting,
) -> Result<OrderRequest, GatewayError> {
	let message = &signed.typed_data.message;
	let commit_block = u64::try_from(message.block_number).map_err(|_| {
		GatewayError::InvalidOrder(format!(
			"block number {} does not fit in 64 bits",
			message.block_number
		))
	})?;
	if message.sell_amount == U256::ZERO {
		return Err(GatewayError::InvalidOrder(
			"sell amount must be greater than zero".to_string(),
		));
	}

	Ok(OrderRequest {
		chain_id: routing.chain_id,
		pool_address: routing.pool_address,
		sell_token: routing.sell_token,
		buy_token: routing.buy_token,
		address: signed.signer,
		amount: message.sell_amount.to_string(),
		swap_venue: routing.swap_venue.clone(),
		commit_block,
		signature: signed.signature.clone(),
	})
}

/// HTTP client for the order server.
pub struct OrderGateway {
	client: reqwest::Client,
	settings: GatewaySettings,
	logs: LogStream,
}

impl OrderGateway {
	pub fn new(settings: GatewaySettings, logs: LogStream) -> Self {
		Self {
			client: reqwest::Client::new(),
			settings,
			logs,
		}
	}

	fn endpoint(&self) -> String {
		format!("{}/v1/order", self.settings.url.trim_end_matches('/'))
	}

	/// Submits a signed order and waits for its proof.
	///
	/// Exactly one POST is made; there are no retries.
	pub async fn submit(
		&self,
		signed: &SignedOrder,
		routing: &OrderRouting,
	) -> Result<OrderProofResponse, GatewayError> {
		let body = build_request(signed, routing)?;

		self.logs.info("order submitted");
		self.logs.info("waiting for solver to accept order");
		self.logs.success("solver accepted order");
		self.logs.info("waiting to generate trade proof");

		let endpoint = self.endpoint();
		tracing::info!(
			endpoint = %endpoint,
			commit_block = body.commit_block,
			amount = %body.amount,
			"Submitting order"
		);

		let request = async {
			let response = self
				.client
				.post(&endpoint)
				.json(&body)
				.send()
				.await
				.map_err(|e| GatewayError::Http(e.to_string()))?;

			let status = response.status();
			if !status.is_success() {
				return Err(GatewayError::SubmissionFailed(status.as_u16()));
			}

			response
				.json::<OrderProofResponse>()
				.await
				.map_err(|e| GatewayError::InvalidResponse(e.to_string()))
		};
		tokio::pin!(request);

		let deadline = sleep(self.settings.timeout);
		tokio::pin!(deadline);

		let period = self.settings.heartbeat;
		let mut heartbeat = interval_at(Instant::now() + period, period);
		let mut beats: u32 = 0;

		let response = loop {
			tokio::select! {
				result = &mut request => break result?,
				_ = heartbeat.tick() => {
					beats += 1;
					self.logs.info(format!(
						"generating proof... ({})",
						format_elapsed(period * beats)
					));
				}
				_ = &mut deadline => {
					tracing::warn!(timeout_secs = self.settings.timeout.as_secs(), "Proof wait timed out");
					return Err(GatewayError::Timeout(self.settings.timeout.as_secs()));
				}
			}
		};

		if let Some(error) = response.error.clone() {
			tracing::warn!(error = %error, "Order server returned an error");
			return Err(GatewayError::Server(error));
		}
		check_proof(&response)?;

		self.logs.success("proof received");
		self.logs.info(format!("block: {}", response.block));
		self.logs
			.info(format!("proof: {}", truncate_hex(&response.proof, 10, 8)));
		self.logs.info(format!(
			"public values: {}",
			truncate_hex(&response.public_values, 10, 8)
		));
		tracing::info!(block = response.block, "Proof received");

		Ok(response)
	}
}

/// A reply without an error must carry a decodable, non-empty proof and
/// public values.
fn check_proof(response: &OrderProofResponse) -> Result<(), GatewayError> {
	let proof = response
		.proof_bytes()
		.map_err(|e| GatewayError::InvalidResponse(format!("malformed proof: {}", e)))?;
	let public_values = response
		.public_values_bytes()
		.map_err(|e| GatewayError::InvalidResponse(format!("malformed public values: {}", e)))?;

	if proof.is_empty() {
		return Err(GatewayError::InvalidResponse("missing proof".to_string()));
	}
	if public_values.is_empty() {
		return Err(GatewayError::InvalidResponse(
			"missing public values".to_string(),
		));
	}
	Ok(())
}
