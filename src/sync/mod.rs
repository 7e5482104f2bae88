//! Cross-thread access to shared state.
//!
//! [`handler`] is the façade training threads and UI bindings talk to;
//! [`source`] supplies fallback values for keys no registry holds yet.

pub mod handler;
pub mod source;

pub use handler::{Result, SetCallback, SyncError, SyncHandler};
pub use source::{StaticSource, SyncSource};
