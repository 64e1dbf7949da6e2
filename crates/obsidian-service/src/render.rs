//! Terminal rendering of lifecycle events.

use obsidian_types::{LifecycleEvent, LogLevel};
use tokio::sync::{broadcast, oneshot};

/// One printable line per event.
pub fn format_event(event: &LifecycleEvent) -> String {
	match event {
		LifecycleEvent::AttemptStarted { attempt_id } => {
			format!("--- order attempt {}", attempt_id)
		}
		LifecycleEvent::Log(entry) => {
			let marker = match entry.level {
				LogLevel::Info => " ",
				LogLevel::Success => "+",
				LogLevel::Warning => "!",
				LogLevel::Error => "x",
			};
			format!(
				"[{}] {} {}",
				entry.timestamp.format("%H:%M:%S"),
				marker,
				entry.message
			)
		}
		LifecycleEvent::Progress(progress) => {
			format!("    progress {:>3}% (stage {})", progress.percent, progress.stage)
		}
		LifecycleEvent::Notice(notice) => {
			format!("*** {}: {}", notice.title, notice.description)
		}
	}
}

/// Prints events until `done` fires, then flushes whatever is still queued.
pub async fn render_events(
	mut events: broadcast::Receiver<LifecycleEvent>,
	mut done: oneshot::Receiver<()>,
) {
	loop {
		tokio::select! {
			biased;
			event = events.recv() => match event {
				Ok(event) => println!("{}", format_event(&event)),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					tracing::warn!(skipped = skipped, "Renderer fell behind");
				}
				Err(broadcast::error::RecvError::Closed) => break,
			},
			_ = &mut done => {
				while let Ok(event) = events.try_recv() {
					println!("{}", format_event(&event));
				}
				break;
			}
		}
	}
}
