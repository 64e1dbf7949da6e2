//! Order construction for the Obsidian router.
//!
//! This crate holds the two pure stages of the order pipeline: building the
//! EIP-712 typed order a trader signs, and ABI-encoding the router `solve`
//! call that settles it once a proof is available. Neither stage performs
//! I/O, so both can be exercised without a chain or an order server.

use thiserror::Error;

pub mod calldata;
pub mod typed;

pub use calldata::{encode_solve_call, encode_solve_call_hex, solve_transaction};
pub use typed::{build_order, OrderDomain, OrderMessage, SignedOrder, TypedField, TypedOrder};

/// Errors that can occur while building or encoding an order.
#[derive(Debug, Error)]
pub enum OrderError {
	/// A hex input could not be decoded.
	#[error("Invalid hex in {field}: {message}")]
	InvalidHex { field: &'static str, message: String },
	/// The order violates a field invariant.
	#[error("Validation failed: {0}")]
	ValidationFailed(String),
}
