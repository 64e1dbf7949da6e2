//! Background chain height poller.
//!
//! Orders are signed against the latest block seen here. Poll failures keep
//! the last known height rather than clearing it.

use obsidian_delivery::DeliveryInterface;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

pub struct BlockTracker {
	delivery: Arc<dyn DeliveryInterface>,
	interval: Duration,
	sender: watch::Sender<Option<u64>>,
}

impl BlockTracker {
	pub fn new(delivery: Arc<dyn DeliveryInterface>, interval: Duration) -> Self {
		let (sender, _) = watch::channel(None);
		Self {
			delivery,
			interval,
			sender,
		}
	}

	/// Receiver of the latest height, `None` until the first successful poll.
	pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
		self.sender.subscribe()
	}

	/// Polls once and publishes the result.
	pub async fn poll(&self) -> Option<u64> {
		match self.delivery.block_number().await {
			Ok(block) => {
				self.sender.send_if_modified(|current| {
					if *current == Some(block) {
						false
					} else {
						*current = Some(block);
						true
					}
				});
				Some(block)
			}
			Err(e) => {
				tracing::warn!(error = %e, "Failed to poll block number");
				None
			}
		}
	}

	/// Runs the poll loop until a shutdown signal arrives.
	pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(self.interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						self.poll().await;
					}
					_ = shutdown.recv() => {
						tracing::debug!("Block tracker stopped");
						break;
					}
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{Address, B256, U256};
	use async_trait::async_trait;
	use obsidian_delivery::DeliveryError;
	use obsidian_types::{
		ConfigSchema, PreparedTransaction, RelayReceipt, RelayTransaction, Schema, ValidationError,
	};
	use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

	struct EmptySchema;

	impl ConfigSchema for EmptySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	#[derive(Default)]
	struct Heights {
		next: AtomicU64,
		failing: AtomicBool,
	}

	#[async_trait]
	impl DeliveryInterface for Heights {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		fn address(&self) -> Address {
			Address::ZERO
		}

		fn chain_id(&self) -> u64 {
			8453
		}

		async fn block_number(&self) -> Result<u64, DeliveryError> {
			if self.failing.load(Ordering::SeqCst) {
				return Err(DeliveryError::Network("down".to_string()));
			}
			Ok(self.next.fetch_add(1, Ordering::SeqCst) + 1000)
		}

		async fn transaction_count(&self, _address: Address) -> Result<u64, DeliveryError> {
			unreachable!()
		}

		async fn gas_price(&self) -> Result<u128, DeliveryError> {
			unreachable!()
		}

		async fn estimate_gas(&self, _tx: &RelayTransaction) -> Result<u64, DeliveryError> {
			unreachable!()
		}

		async fn submit(&self, _tx: &PreparedTransaction) -> Result<B256, DeliveryError> {
			unreachable!()
		}

		async fn wait_for_receipt(&self, _hash: B256) -> Result<RelayReceipt, DeliveryError> {
			unreachable!()
		}

		async fn balance(&self, _address: Address) -> Result<U256, DeliveryError> {
			unreachable!()
		}
	}

	#[tokio::test]
	async fn test_poll_keeps_last_height_on_error() {
		let heights = Arc::new(Heights::default());
		let tracker = BlockTracker::new(heights.clone(), Duration::from_secs(5));
		let receiver = tracker.subscribe();
		assert_eq!(*receiver.borrow(), None);

		assert_eq!(tracker.poll().await, Some(1000));
		assert_eq!(*receiver.borrow(), Some(1000));

		heights.failing.store(true, Ordering::SeqCst);
		assert_eq!(tracker.poll().await, None);
		assert_eq!(*receiver.borrow(), Some(1000));
	}

	#[tokio::test]
	async fn test_spawned_tracker_updates_and_stops() {
		let heights = Arc::new(Heights::default());
		let tracker = BlockTracker::new(heights, Duration::from_millis(10));
		let mut receiver = tracker.subscribe();
		let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

		let handle = tracker.spawn(shutdown_rx);

		receiver.changed().await.unwrap();
		receiver.changed().await.unwrap();
		assert!(receiver.borrow().unwrap() >= 1001);

		shutdown_tx.send(()).unwrap();
		tokio::time::timeout(Duration::from_secs(1), handle)
			.await
			.unwrap()
			.unwrap();
	}
}
