//! Router settlement calldata.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use obsidian_types::{decode_hex, RelayTransaction};

use crate::OrderError;

sol! {
	/// Settlement entry point of the Obsidian router.
	interface IObsidianRouter {
		function solve(bytes _publicValues, bytes _proofBytes, bytes _orderSignature) external;
	}
}

/// ABI-encodes `solve(publicValues, proofBytes, orderSignature)`.
pub fn encode_solve_call(public_values: Bytes, proof_bytes: Bytes, order_signature: Bytes) -> Bytes {
	let call = IObsidianRouter::solveCall {
		_publicValues: public_values,
		_proofBytes: proof_bytes,
		_orderSignature: order_signature,
	};
	call.abi_encode().into()
}

/// Same as [`encode_solve_call`] but takes the hex strings returned by the
/// order server and produced by wallets.
pub fn encode_solve_call_hex(
	public_values: &str,
	proof_bytes: &str,
	order_signature: &str,
) -> Result<Bytes, OrderError> {
	let decode = |field: &'static str, value: &str| {
		decode_hex(value).map_err(|e| OrderError::InvalidHex {
			field,
			message: e.to_string(),
		})
	};

	Ok(encode_solve_call(
		decode("public_values", public_values)?,
		decode("proof", proof_bytes)?,
		decode("signature", order_signature)?,
	))
}

/// Wraps encoded calldata into the transaction the relayer broadcasts.
pub fn solve_transaction(router: Address, calldata: Bytes) -> RelayTransaction {
	RelayTransaction {
		to: router,
		data: calldata,
		value: U256::ZERO,
	}
}
