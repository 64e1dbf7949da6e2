//! User-facing lifecycle events.
//!
//! The pipeline never renders anything itself. It appends log entries to a
//! per-attempt journal and publishes them, together with timeline progress
//! and precondition notices, on a broadcast bus that presentation layers
//! subscribe to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

/// Severity of a log entry as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Info,
	Success,
	Error,
	Warning,
}

impl fmt::Display for LogLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Info => write!(f, "info"),
			Self::Success => write!(f, "success"),
			Self::Error => write!(f, "error"),
			Self::Warning => write!(f, "warning"),
		}
	}
}

/// A single line of the order attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
	/// When the entry was appended.
	pub timestamp: DateTime<Utc>,
	/// Human-readable message.
	pub message: String,
	/// Severity, serialized as `type` to match the UI contract.
	#[serde(rename = "type")]
	pub level: LogLevel,
}

impl LogEntry {
	pub fn new(message: impl Into<String>, level: LogLevel) -> Self {
		Self {
			timestamp: Utc::now(),
			message: message.into(),
			level,
		}
	}
}

/// Position on the seven-stage order timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
	/// Stage index in `0..=6`.
	pub stage: u8,
	/// Completion percentage, `round((stage + 1) / 7 * 100)`.
	pub percent: u8,
}

/// A precondition rejection surfaced to the user before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
	pub title: String,
	pub description: String,
}

/// Events published on the lifecycle bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
	/// A new order attempt started and the journal was cleared.
	AttemptStarted { attempt_id: Uuid },
	/// A log entry was appended to the current attempt.
	Log(LogEntry),
	/// The timeline advanced.
	Progress(Progress),
	/// An order attempt was rejected by a precondition check.
	Notice(Notice),
}

/// Broadcast bus for lifecycle events.
///
/// Cloning the bus yields another handle on the same channel.
pub struct EventBus {
	sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is listening, which callers ignore.
	pub fn publish(
		&self,
		event: LifecycleEvent,
	) -> Result<(), broadcast::error::SendError<LifecycleEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}

/// Append-only journal of the current order attempt, mirrored onto the bus.
///
/// All pipeline components share one `LogStream`. The orchestrator resets it
/// at the start of every attempt; everything else only appends.
#[derive(Clone, Default)]
pub struct LogStream {
	bus: EventBus,
	entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogStream {
	pub fn new(bus: EventBus) -> Self {
		Self {
			bus,
			entries: Arc::new(Mutex::new(Vec::new())),
		}
	}

	fn journal(&self) -> MutexGuard<'_, Vec<LogEntry>> {
		// A panic while holding the lock cannot leave a Vec half-written.
		self.entries
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Clears the journal and announces a new attempt.
	pub fn reset(&self, attempt_id: Uuid) {
		self.journal().clear();
		self.bus
			.publish(LifecycleEvent::AttemptStarted { attempt_id })
			.ok();
	}

	/// Appends an entry and publishes it.
	pub fn log(&self, message: impl Into<String>, level: LogLevel) -> LogEntry {
		let entry = LogEntry::new(message, level);
		tracing::debug!(level = %entry.level, "{}", entry.message);
		self.journal().push(entry.clone());
		self.bus.publish(LifecycleEvent::Log(entry.clone())).ok();
		entry
	}

	pub fn info(&self, message: impl Into<String>) -> LogEntry {
		self.log(message, LogLevel::Info)
	}

	pub fn success(&self, message: impl Into<String>) -> LogEntry {
		self.log(message, LogLevel::Success)
	}

	pub fn warning(&self, message: impl Into<String>) -> LogEntry {
		self.log(message, LogLevel::Warning)
	}

	pub fn error(&self, message: impl Into<String>) -> LogEntry {
		self.log(message, LogLevel::Error)
	}

	pub fn progress(&self, progress: Progress) {
		self.bus.publish(LifecycleEvent::Progress(progress)).ok();
	}

	pub fn notice(&self, notice: Notice) {
		self.bus.publish(LifecycleEvent::Notice(notice)).ok();
	}

	/// Snapshot of the current attempt's entries.
	pub fn entries(&self) -> Vec<LogEntry> {
		self.journal().clone()
	}

	pub fn last(&self) -> Option<LogEntry> {
		self.journal().last().cloned()
	}

	pub fn bus(&self) -> &EventBus {
		&self.bus
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.bus.subscribe()
	}

	/// Lazy stream of every event published after this call.
	///
	/// Lagging consumers see a `BroadcastStreamRecvError` item instead of
	/// blocking the pipeline.
	pub fn stream(&self) -> BroadcastStream<LifecycleEvent> {
		BroadcastStream::new(self.bus.subscribe())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::StreamExt;

	#[test]
	fn test_log_entry_serializes_level_as_type() {
		let entry = LogEntry::new("signature found", LogLevel::Success);
		let json = serde_json::to_value(&entry).unwrap();
		assert_eq!(json["type"], "success");
		assert_eq!(json["message"], "signature found");
	}

	#[test]
	fn test_reset_clears_journal() {
		let logs = LogStream::new(EventBus::new(16));
		logs.info("first");
		logs.error("second");
		assert_eq!(logs.entries().len(), 2);
		assert_eq!(logs.last().unwrap().level, LogLevel::Error);

		logs.reset(Uuid::new_v4());
		assert!(logs.entries().is_empty());
		assert!(logs.last().is_none());
	}

	#[test]
	fn test_clones_share_journal() {
		let logs = LogStream::new(EventBus::new(16));
		let other = logs.clone();
		other.warning("from a clone");
		assert_eq!(logs.entries()[0].message, "from a clone");
	}

	#[tokio::test]
	async fn test_stream_receives_events_in_order() {
		let logs = LogStream::new(EventBus::new(16));
		let mut stream = logs.stream();

		logs.info("one");
		logs.progress(Progress {
			stage: 0,
			percent: 14,
		});
		logs.success("two");

		match stream.next().await {
			Some(Ok(LifecycleEvent::Log(entry))) => assert_eq!(entry.message, "one"),
			other => panic!("unexpected event: {:?}", other),
		}
		match stream.next().await {
			Some(Ok(LifecycleEvent::Progress(p))) => assert_eq!(p.stage, 0),
			other => panic!("unexpected event: {:?}", other),
		}
		match stream.next().await {
			Some(Ok(LifecycleEvent::Log(entry))) => {
				assert_eq!(entry.level, LogLevel::Success)
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn test_publish_without_subscribers_is_not_fatal() {
		let logs = LogStream::new(EventBus::new(4));
		for i in 0..10 {
			logs.info(format!("entry {}", i));
		}
		assert_eq!(logs.entries().len(), 10);
	}
}
