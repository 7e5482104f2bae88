//! Path expressions and their evaluation.
//!
//! [`path`] compiles dotted expressions such as `*<trainer>.accuracy` into
//! segment lists; [`resolver`] evaluates them against a registry tree for
//! exhaustive reads and conditional writes.

pub mod path;
pub mod resolver;

pub use path::{PathError, PathExpr, Segment};
pub use resolver::{ResolvedEntry, Resolver, ResolverCache, SetOptions};
