//! Formatting and hex helpers shared across the pipeline.

use alloy::primitives::Bytes;
use std::time::Duration;

pub type HexError = hex::FromHexError;

/// Shortens a long hex string to `head` leading and `tail` trailing
/// characters joined by an ellipsis, the way signatures and proofs are shown
/// in the order log.
///
/// Strings too short to benefit are returned unchanged.
///
/// # Examples
/// - `truncate_hex("0x1234567890abcdef1234567890", 10, 8)` gives `"0x12345678...34567890"`
/// - `truncate_hex("0xd4f23AfEAcfc05399E58e122B9a23cD04FA02C3B", 6, 4)` gives `"0xd4f2...2C3B"`
pub fn truncate_hex(value: &str, head: usize, tail: usize) -> String {
	if value.len() <= head + tail || !value.is_ascii() {
		value.to_string()
	} else {
		format!("{}...{}", &value[..head], &value[value.len() - tail..])
	}
}

/// Decodes hex with or without a `0x` prefix.
pub fn decode_hex(value: &str) -> Result<Bytes, HexError> {
	let stripped = value.strip_prefix("0x").unwrap_or(value);
	hex::decode(stripped).map(Bytes::from)
}

/// Formats an elapsed wait as `"Xm Ys"`.
pub fn format_elapsed(elapsed: Duration) -> String {
	let secs = elapsed.as_secs();
	format!("{}m {}s", secs / 60, secs % 60)
}
