//! Order lifecycle pipeline.
//!
//! [`OrderLifecycle`] drives one order from a user-entered amount to a mined
//! settlement transaction, reporting every step on the shared
//! [`obsidian_types::LogStream`]. [`BlockTracker`] keeps the reference block
//! the orders are signed against up to date.

pub mod block_tracker;
pub mod error;
pub mod lifecycle;
pub mod timeline;

pub use block_tracker::BlockTracker;
pub use error::LifecycleError;
pub use lifecycle::{LifecycleSettings, OrderLifecycle, OrderResult};
pub use timeline::{progress_percent, stage_message, Timeline, FINAL_STAGE};
