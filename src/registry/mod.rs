//! Hierarchical state registry for training pipelines.
//!
//! This module provides:
//! - Tagged tree nodes with runtime-typed entries (`node`)
//! - The value union, type descriptors, and typed extraction (`value`)

pub mod node;
pub mod value;

pub use node::{Registry, RegistryError, RegistryId};
pub use value::{FromValue, Value, ValueKind};
