//! Shared types for the Obsidian order pipeline.
//!
//! Every crate in the workspace speaks in terms of the types defined here:
//! the wire payloads exchanged with the order server, the relay transaction
//! handed to the relayer, the user-facing log and progress events, and the
//! schema used to validate implementation config tables.

pub mod delivery;
pub mod events;
pub mod order;
pub mod utils;
pub mod validation;

pub use delivery::*;
pub use events::*;
pub use order::*;
pub use utils::*;
pub use validation::*;
