//! Seven-stage order timeline.

use crate::error::LifecycleError;
use alloy::primitives::Address;
use obsidian_types::{truncate_hex, LogLevel, LogStream, Progress};
use std::sync::Mutex;

/// Index of the last stage.
pub const FINAL_STAGE: u8 = 6;

/// `round((stage + 1) / 7 * 100)` in integer arithmetic.
pub fn progress_percent(stage: u8) -> u8 {
	let numerator = (stage as u32 + 1) * 100;
	((2 * numerator + 7) / 14) as u8
}

/// Canonical message for a stage.
pub fn stage_message(stage: u8, solver: &Address) -> Option<String> {
	let message = match stage {
		0 => "Placing order on the Obsidian network".to_string(),
		1 => "Matching with available solvers in the network".to_string(),
		2 => format!(
			"Order matched with solver {}",
			truncate_hex(&solver.to_checksum(None), 6, 4)
		),
		3 => "Generating zero-knowledge proof for the transaction".to_string(),
		4 => "Proof successfully generated and verified".to_string(),
		5 => "Relaying transaction to the blockchain".to_string(),
		6 => "Transaction successfully executed on-chain".to_string(),
		_ => return None,
	};
	Some(message)
}

/// Tracks the current stage of one attempt and publishes progress.
pub struct Timeline {
	logs: LogStream,
	solver: Address,
	current: Mutex<Option<u8>>,
}

impl Timeline {
	pub fn new(logs: LogStream, solver: Address) -> Self {
		Self {
			logs,
			solver,
			current: Mutex::new(None),
		}
	}

	pub fn reset(&self) {
		*self.current.lock().unwrap_or_else(|p| p.into_inner()) = None;
	}

	pub fn current(&self) -> Option<u8> {
		*self.current.lock().unwrap_or_else(|p| p.into_inner())
	}

	/// Moves to `stage`, logging its message and publishing the new percent.
	///
	/// Stages never move backwards within an attempt.
	pub fn advance(&self, stage: u8) -> Result<Progress, LifecycleError> {
		let message = stage_message(stage, &self.solver).ok_or_else(|| {
			LifecycleError::InvalidStage(format!("{} is past the final stage", stage))
		})?;

		{
			let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
			if let Some(previous) = *current {
				if stage < previous {
					return Err(LifecycleError::InvalidStage(format!(
						"cannot move back from {} to {}",
						previous, stage
					)));
				}
			}
			*current = Some(stage);
		}

		let level = if stage == FINAL_STAGE {
			LogLevel::Success
		} else {
			LogLevel::Info
		};
		self.logs.log(message, level);

		let progress = Progress {
			stage,
			percent: progress_percent(stage),
		};
		self.logs.progress(progress);
		tracing::debug!(stage = stage, percent = progress.percent, "Timeline advanced");
		Ok(progress)
	}
}
