//! Order lifecycle orchestrator.
//!
//! Runs one order attempt end to end: sign, submit and wait for the proof,
//! encode the settlement call, relay it. Phases run strictly in sequence and
//! the first failure aborts the attempt. Nothing already done is rolled back.

use crate::error::LifecycleError;
use crate::timeline::Timeline;
use alloy::primitives::{Address, Bytes, U256};
use obsidian_account::SigningClient;
use obsidian_delivery::Relayer;
use obsidian_gateway::OrderGateway;
use obsidian_order::{encode_solve_call_hex, solve_transaction, TypedOrder};
use obsidian_types::{LogStream, OrderProofResponse, OrderRouting, Progress, RelayOutcome};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

/// Everything produced by a successful attempt.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
	pub attempt_id: Uuid,
	pub signature: String,
	pub typed_data: TypedOrder,
	/// Sell amount in base units.
	pub sell_amount: U256,
	pub order_response: OrderProofResponse,
	pub solve_transaction: RelayOutcome,
	pub calldata: Bytes,
	/// Block explorer page of the settlement transaction.
	pub explorer_url: String,
}

/// Deployment settings the orchestrator needs beyond its components.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
	pub router: Address,
	pub routing: OrderRouting,
	/// Solver named in the "order matched" stage.
	pub solver: Address,
	/// Explorer transaction page prefix.
	pub explorer_tx_url: String,
}

pub struct OrderLifecycle {
	signing: SigningClient,
	gateway: OrderGateway,
	relayer: Arc<Relayer>,
	settings: LifecycleSettings,
	logs: LogStream,
	timeline: Timeline,
	in_flight: Mutex<()>,
}

impl OrderLifecycle {
	pub fn new(
		signing: SigningClient,
		gateway: OrderGateway,
		relayer: Arc<Relayer>,
		settings: LifecycleSettings,
		logs: LogStream,
	) -> Self {
		let timeline = Timeline::new(logs.clone(), settings.solver);
		Self {
			signing,
			gateway,
			relayer,
			settings,
			logs,
			timeline,
			in_flight: Mutex::new(()),
		}
	}

	pub fn logs(&self) -> &LogStream {
		&self.logs
	}

	pub fn relayer(&self) -> &Arc<Relayer> {
		&self.relayer
	}

	/// Moves the timeline to `stage` (0 to 6).
	pub fn advance_timeline(&self, stage: u8) -> Result<Progress, LifecycleError> {
		self.timeline.advance(stage)
	}

	/// Runs one order attempt for `amount` of the sell token.
	///
	/// Rejects immediately with [`LifecycleError::Busy`] while another attempt
	/// is running. Otherwise the log stream is reset, and on failure an error
	/// entry naming the cause is appended before the error is returned.
	/// Dropping the future cancels the attempt.
	pub async fn sign_order(&self, amount: &str) -> Result<OrderResult, LifecycleError> {
		let _guard = self.in_flight.try_lock().map_err(|_| LifecycleError::Busy)?;

		let attempt_id = Uuid::new_v4();
		self.logs.reset(attempt_id);
		self.timeline.reset();

		let span = tracing::info_span!("order", attempt = %attempt_id);
		match self.run(attempt_id, amount).instrument(span).await {
			Ok(result) => Ok(result),
			Err(LifecycleError::Rejected(rejection)) => {
				// Already surfaced as a notice.
				Err(LifecycleError::Rejected(rejection))
			}
			Err(e) => {
				tracing::error!(attempt = %attempt_id, error = %e, "Order attempt failed");
				self.logs.error(format!("solve transaction failed: {}", e));
				Err(e)
			}
		}
	}

	async fn run(&self, attempt_id: Uuid, amount: &str) -> Result<OrderResult, LifecycleError> {
		let signed = self.signing.sign_order(amount).await?;
		self.timeline.advance(0)?;

		self.timeline.advance(1)?;
		self.timeline.advance(2)?;
		self.timeline.advance(3)?;
		let response = self.gateway.submit(&signed, &self.settings.routing).await?;
		self.timeline.advance(4)?;

		let calldata =
			encode_solve_call_hex(&response.public_values, &response.proof, &signed.signature)?;
		self.logs.info("preparing solve transaction");
		self.logs
			.info(format!("public values: {}", response.public_values));
		self.logs.info(format!("proof: {}", response.proof));
		self.logs.info(format!("signature: {}", signed.signature));
		self.logs.info(format!("encoded calldata: {}", calldata));

		self.logs.info("submitting solve transaction through relayer");
		self.logs
			.info(format!("relayer address: {}", self.relayer.address()));
		self.timeline.advance(5)?;

		let tx = solve_transaction(self.settings.router, calldata.clone());
		let outcome = self.relayer.send_transaction(tx).await?;
		self.logs
			.success(format!("solve transaction submitted: {}", outcome.hash));

		if !outcome.success {
			return Err(LifecycleError::Reverted(outcome.hash));
		}

		let explorer_url = format!(
			"{}/{}",
			self.settings.explorer_tx_url.trim_end_matches('/'),
			outcome.hash
		);
		self.logs.info(format!("view on explorer: {}", explorer_url));
		self.timeline.advance(6)?;

		tracing::info!(tx_hash = %outcome.hash, "Order settled");

		Ok(OrderResult {
			attempt_id,
			signature: signed.signature,
			sell_amount: signed.typed_data.message.sell_amount,
			typed_data: signed.typed_data,
			order_response: response,
			solve_transaction: outcome,
			calldata,
			explorer_url,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{address, keccak256, Signature, B256};
	use alloy::signers::local::PrivateKeySigner;
	use alloy::signers::SignerSync;
	use async_trait::async_trait;
	use obsidian_account::{AccountError, AccountInterface, Rejection, SigningSettings};
	use obsidian_delivery::{DeliveryError, DeliveryInterface};
	use obsidian_gateway::{GatewayError, GatewaySettings};
	use obsidian_types::{
		ConfigSchema, EventBus, LifecycleEvent, LogLevel, PreparedTransaction, RelayReceipt,
		RelayTransaction, Schema, ValidationError,
	};
	use serde_json::json;
	use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
	use std::time::Duration;
	use tokio::sync::watch;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const ROUTER: Address = address!("Ee395f9489bdC1b74A1BFc3B3164a5FEFb7146AE");
	const USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
	const WETH: Address = address!("4200000000000000000000000000000000000006");

	struct EmptySchema;

	impl ConfigSchema for EmptySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	struct MockAccount {
		chain_id: u64,
		signer: PrivateKeySigner,
	}

	#[async_trait]
	impl AccountInterface for MockAccount {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
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
			self.signer
				.sign_hash_sync(&order.signing_hash())
				.map_err(|e| AccountError::SigningFailed(e.to_string()))
		}
	}

	#[derive(Default)]
	struct MockChain {
		count: AtomicU64,
		calls: AtomicUsize,
		revert: AtomicBool,
		fail_estimate: AtomicBool,
		submitted: std::sync::Mutex<Vec<PreparedTransaction>>,
	}

	impl MockChain {
		fn touch(&self) {
			self.calls.fetch_add(1, Ordering::SeqCst);
		}

		fn submitted(&self) -> Vec<PreparedTransaction> {
			self.submitted.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl DeliveryInterface for MockChain {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		fn address(&self) -> Address {
			address!("2222222222222222222222222222222222222222")
		}

		fn chain_id(&self) -> u64 {
			8453
		}

		async fn block_number(&self) -> Result<u64, DeliveryError> {
			self.touch();
			Ok(1000)
		}

		async fn transaction_count(&self, _address: Address) -> Result<u64, DeliveryError> {
			self.touch();
			Ok(self.count.load(Ordering::SeqCst))
		}

		async fn gas_price(&self) -> Result<u128, DeliveryError> {
			self.touch();
			Ok(1_000_000)
		}

		async fn estimate_gas(&self, _tx: &RelayTransaction) -> Result<u64, DeliveryError> {
			self.touch();
			if self.fail_estimate.load(Ordering::SeqCst) {
				return Err(DeliveryError::GasEstimation("execution reverted".to_string()));
			}
			Ok(300_000)
		}

		async fn submit(&self, tx: &PreparedTransaction) -> Result<B256, DeliveryError> {
			self.touch();
			self.submitted.lock().unwrap().push(tx.clone());
			self.count.fetch_max(tx.nonce + 1, Ordering::SeqCst);
			Ok(B256::repeat_byte(0x42))
		}

		async fn wait_for_receipt(&self, hash: B256) -> Result<RelayReceipt, DeliveryError> {
			self.touch();
			Ok(RelayReceipt {
				hash,
				block_number: 1001,
				gas_used: 210_000,
				success: !self.revert.load(Ordering::SeqCst),
			})
		}

		async fn balance(&self, _address: Address) -> Result<U256, DeliveryError> {
			self.touch();
			Ok(U256::ZERO)
		}
	}

	struct Harness {
		lifecycle: Arc<OrderLifecycle>,
		chain: Arc<MockChain>,
		logs: LogStream,
		_block: watch::Sender<Option<u64>>,
	}

	fn harness(server_url: String, wallet_chain: u64) -> Harness {
		let logs = LogStream::new(EventBus::new(256));
		let (block_tx, block_rx) = watch::channel(Some(1000));

		let account = Arc::new(MockAccount {
			chain_id: wallet_chain,
			signer: PrivateKeySigner::random(),
		});
		let signing = SigningClient::new(
			account,
			SigningSettings {
				chain_id: 8453,
				network_name: "Base".to_string(),
				router: ROUTER,
				sell_token: USDC,
				buy_token: WETH,
				sell_decimals: 6,
			},
			block_rx,
			logs.clone(),
		);

		let gateway = OrderGateway::new(
			GatewaySettings {
				url: server_url,
				timeout: Duration::from_secs(5),
				heartbeat: Duration::from_secs(30),
			},
			logs.clone(),
		);

		let chain = Arc::new(MockChain::default());
		let relayer = Arc::new(Relayer::new(chain.clone()));

		let settings = LifecycleSettings {
			router: ROUTER,
			routing: OrderRouting {
				chain_id: 8453,
				pool_address: address!("88a43bbdf9d098eec7bceda4e2494615dfd9bb9c"),
				sell_token: USDC,
				buy_token: WETH,
				swap_venue: "uniswap".to_string(),
			},
			solver: address!("d4f23AfEAcfc05399E58e122B9a23cD04FA02C3B"),
			explorer_tx_url: "https://basescan.org/tx".to_string(),
		};

		Harness {
			lifecycle: Arc::new(OrderLifecycle::new(
				signing,
				gateway,
				relayer,
				settings,
				logs.clone(),
			)),
			chain,
			logs,
			_block: block_tx,
		}
	}

	fn proof_body() -> serde_json::Value {
		json!({
			"block": 1000,
			"proof": format!("0x{}", "11".repeat(64)),
			"public_values": format!("0x{}", "22".repeat(32)),
			"error": null
		})
	}

	fn drain(receiver: &mut tokio::sync::broadcast::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
		let mut events = Vec::new();
		while let Ok(event) = receiver.try_recv() {
			events.push(event);
		}
		events
	}

	#[tokio::test]
	async fn test_end_to_end_order() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/order"))
			.and(body_partial_json(json!({
				"chain_id": 8453,
				"amount": "100000000",
				"commit_block": 1000,
				"swap_venue": "uniswap",
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(proof_body()))
			.expect(1)
			.mount(&server)
			.await;

		let h = harness(server.uri(), 8453);
		let mut events = h.logs.subscribe();

		let result = h.lifecycle.sign_order("100").await.unwrap();
		assert_eq!(result.sell_amount, U256::from(100_000_000u64));
		assert_eq!(result.order_response.block, 1000);
		assert!(result.solve_transaction.success);

		let selector = keccak256("solve(bytes,bytes,bytes)");
		assert_eq!(&result.calldata[..4], &selector[..4]);

		let submitted = h.chain.submitted();
		assert_eq!(submitted.len(), 1);
		assert_eq!(submitted[0].transaction.to, ROUTER);
		assert_eq!(submitted[0].transaction.data, result.calldata);
		assert_eq!(submitted[0].transaction.value, U256::ZERO);
		assert_eq!(submitted[0].nonce, 0);

		assert_eq!(
			result.explorer_url,
			format!("https://basescan.org/tx/{}", B256::repeat_byte(0x42))
		);

		let entries = h.logs.entries();
		assert_eq!(entries[0].message, "waiting for order signature");
		let last = entries.last().unwrap();
		assert_eq!(last.level, LogLevel::Success);
		assert_eq!(last.message, "Transaction successfully executed on-chain");
		assert!(entries
			.iter()
			.any(|e| e.message == "Order matched with solver 0xd4f2...2C3B"));

		let stages: Vec<u8> = drain(&mut events)
			.into_iter()
			.filter_map(|event| match event {
				LifecycleEvent::Progress(p) => Some(p.stage),
				_ => None,
			})
			.collect();
		assert_eq!(stages, vec![0, 1, 2, 3, 4, 5, 6]);
	}

	#[tokio::test]
	async fn test_server_error_aborts_with_error_entry() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/order"))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(json!({"error": "no solver available"})),
			)
			.mount(&server)
			.await;

		let h = harness(server.uri(), 8453);

		let err = h.lifecycle.sign_order("100").await.unwrap_err();
		assert!(matches!(
			err,
			LifecycleError::Gateway(GatewayError::Server(ref message)) if message == "no solver available"
		));

		let last = h.logs.last().unwrap();
		assert_eq!(last.level, LogLevel::Error);
		assert!(last.message.contains("no solver available"));
		assert!(h.chain.submitted().is_empty());

		// A second attempt starts from a clean log.
		h.lifecycle.sign_order("100").await.unwrap_err();
		assert_eq!(h.logs.entries()[0].message, "waiting for order signature");
		assert_eq!(
			h.logs
				.entries()
				.iter()
				.filter(|e| e.level == LogLevel::Error)
				.count(),
			1
		);
	}

	#[tokio::test]
	async fn test_wrong_chain_makes_no_requests() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(proof_body()))
			.expect(0)
			.mount(&server)
			.await;

		let h = harness(server.uri(), 1);
		let mut events = h.logs.subscribe();

		let err = h.lifecycle.sign_order("100").await.unwrap_err();
		assert!(matches!(
			err,
			LifecycleError::Rejected(Rejection::WrongNetwork { actual: 1, .. })
		));

		let notices: Vec<_> = drain(&mut events)
			.into_iter()
			.filter(|event| matches!(event, LifecycleEvent::Notice(_)))
			.collect();
		assert_eq!(notices.len(), 1);

		assert!(server.received_requests().await.unwrap().is_empty());
		assert_eq!(h.chain.calls.load(Ordering::SeqCst), 0);
		assert!(h.logs.entries().is_empty());
	}

	#[tokio::test]
	async fn test_relay_failure_is_logged_and_nonce_resynced() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/order"))
			.respond_with(ResponseTemplate::new(200).set_body_json(proof_body()))
			.mount(&server)
			.await;

		let h = harness(server.uri(), 8453);
		h.chain.count.store(3, Ordering::SeqCst);
		h.chain.fail_estimate.store(true, Ordering::SeqCst);

		let err = h.lifecycle.sign_order("1.5").await.unwrap_err();
		assert!(matches!(
			err,
			LifecycleError::Delivery(DeliveryError::GasEstimation(_))
		));
		assert_eq!(h.lifecycle.relayer().current_nonce().await, Some(3));

		let last = h.logs.last().unwrap();
		assert_eq!(last.level, LogLevel::Error);
		assert!(last.message.starts_with("solve transaction failed: "));
	}

	#[tokio::test]
	async fn test_reverted_settlement_is_a_failure() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/order"))
			.respond_with(ResponseTemplate::new(200).set_body_json(proof_body()))
			.mount(&server)
			.await;

		let h = harness(server.uri(), 8453);
		h.chain.revert.store(true, Ordering::SeqCst);

		let err = h.lifecycle.sign_order("100").await.unwrap_err();
		assert!(matches!(err, LifecycleError::Reverted(_)));
		assert!(h
			.logs
			.entries()
			.iter()
			.all(|e| e.message != "Transaction successfully executed on-chain"));
	}

	#[tokio::test]
	async fn test_concurrent_attempt_is_busy() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/order"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(proof_body())
					.set_delay(Duration::from_millis(300)),
			)
			.expect(1)
			.mount(&server)
			.await;

		let h = harness(server.uri(), 8453);
		let first = {
			let lifecycle = h.lifecycle.clone();
			tokio::spawn(async move { lifecycle.sign_order("100").await })
		};
		tokio::time::sleep(Duration::from_millis(50)).await;

		let err = h.lifecycle.sign_order("100").await.unwrap_err();
		assert!(matches!(err, LifecycleError::Busy));

		assert!(first.await.unwrap().is_ok());
	}

	#[tokio::test]
	async fn test_advance_timeline_percent() {
		let h = harness("http://127.0.0.1:1".to_string(), 8453);
		assert_eq!(h.lifecycle.advance_timeline(0).unwrap().percent, 14);
		assert_eq!(h.lifecycle.advance_timeline(6).unwrap().percent, 100);
		assert!(h.lifecycle.advance_timeline(7).is_err());
	}
}
