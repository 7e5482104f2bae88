//! Exclusive tree ownership and queued writes.
//!
//! An operator claims a registry tree; everyone else's writes to that tree
//! travel through the operator's command queue and are applied on its
//! worker thread, keeping mutation single-threaded per tree.

pub mod command;
pub mod runtime;

pub use command::SetCommand;
pub use runtime::{
    Operator, OperatorHandle, OperatorHub, OperatorOptions, OperatorRuntime,
    DEFAULT_POLL_INTERVAL_MS, POLL_ENV_VAR,
};
