//! Write commands queued onto an operator's worker thread.

use std::fmt;

use crate::error::Error;
use crate::query::{Resolver, SetOptions};
use crate::registry::{Value, ValueKind};
use crate::sync::{SetCallback, SyncError};

/// A deferred write against an operator-owned registry tree.
///
/// Commands carry the raw path expression rather than a compiled one so
/// the owning worker resolves them against its own cache. The optional
/// callback fires exactly once, from whichever thread settles the command.
pub struct SetCommand {
    /// Path expression selecting the write targets
    pub key: String,
    /// The value to assign
    pub value: Value,
    /// Create a missing literal terminal instead of skipping it
    pub add_missing: bool,
    /// Kind declared for entries created through `add_missing`
    pub declared: Option<ValueKind>,
    on_done: Option<SetCallback>,
}

impl SetCommand {
    /// Create a command writing `value` at `key`, with no callback.
    pub fn new(key: &str, value: impl Into<Value>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            add_missing: false,
            declared: None,
            on_done: None,
        }
    }

    /// Whether a missing literal terminal should be created.
    pub fn with_add_missing(mut self, add_missing: bool) -> Self {
        self.add_missing = add_missing;
        self
    }

    /// Kind to declare when `add_missing` creates the entry.
    pub fn with_declared(mut self, declared: ValueKind) -> Self {
        self.declared = Some(declared);
        self
    }

    /// Attach a completion callback.
    pub fn with_callback<F>(mut self, on_done: F) -> Self
    where
        F: FnOnce(Result<Vec<String>, SyncError>) + Send + 'static,
    {
        self.on_done = Some(Box::new(on_done));
        self
    }

    /// Resolve and apply the write, then settle the command.
    ///
    /// Zero matched targets settles as [`SyncError::KeyNotFound`]; a
    /// malformed expression surfaces its parse error.
    pub fn execute(self, resolver: &Resolver) {
        let Self {
            key,
            value,
            add_missing,
            declared,
            on_done,
        } = self;
        let options = SetOptions {
            add_missing,
            declared,
        };
        let result = match resolver.set(&key, value, options) {
            Ok(written) if written.is_empty() => Err(SyncError::KeyNotFound { key: key.clone() }),
            Ok(written) => Ok(written),
            Err(Error::Path(err)) => Err(SyncError::Path(err)),
            Err(err) => Err(SyncError::Resolve(err.to_string())),
        };
        finish(key, on_done, result);
    }

    /// Settle the command with an externally produced outcome, without
    /// touching any registry. Used when the write can no longer run.
    pub fn complete(self, result: Result<Vec<String>, SyncError>) {
        finish(self.key, self.on_done, result);
    }
}

fn finish(key: String, on_done: Option<SetCallback>, result: Result<Vec<String>, SyncError>) {
    match on_done {
        Some(callback) => callback(result),
        None => {
            if let Err(err) = result {
                log::debug!("write to '{}' failed with no callback attached: {}", key, err);
            }
        }
    }
}

impl fmt::Debug for SetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetCommand")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("add_missing", &self.add_missing)
            .field("declared", &self.declared)
            .field("has_callback", &self.on_done.is_some())
            .finish()
    }
}
