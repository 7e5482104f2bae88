//! Trellis - shared state registry and cross-thread synchronization for ML
//! training pipelines.

pub mod error;

pub mod operator;
pub mod query;
pub mod registry;
pub mod sync;

pub use error::{Error, Result};

pub use registry::{FromValue, Registry, RegistryError, RegistryId, Value, ValueKind};

pub use query::{
    PathError, PathExpr, ResolvedEntry, Resolver, ResolverCache, Segment, SetOptions,
};

pub use sync::{SetCallback, StaticSource, SyncError, SyncHandler, SyncSource};

pub use operator::{
    Operator, OperatorHandle, OperatorHub, OperatorOptions, OperatorRuntime, SetCommand,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
