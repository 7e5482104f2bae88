//! Cross-thread reads and writes against shared registry trees.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::operator::{OperatorHub, SetCommand};
use crate::query::{PathError, PathExpr, ResolverCache, SetOptions};
use crate::registry::{FromValue, Registry, Value};
use crate::sync::source::SyncSource;

/// Failures surfaced through write callbacks.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The expression parsed but matched nothing to write
    #[error("key '{key}' matched no entry")]
    KeyNotFound {
        /// The expression that matched nothing
        key: String,
    },
    /// The owning operator stopped before the write could run
    #[error("operator '{id}' has stopped")]
    OperatorStopped {
        /// Id of the stopped operator
        id: String,
    },
    /// The expression failed to parse
    #[error(transparent)]
    Path(#[from] PathError),
    /// The write failed while resolving against the tree
    #[error("resolution failed: {0}")]
    Resolve(String),
}

/// Convenience alias for sync outcomes.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Completion callback for a write: receives the paths written or the error.
pub type SetCallback = Box<dyn FnOnce(Result<Vec<String>>) + Send + 'static>;

/// Thread-safe façade over registry trees, fallback sources, and the
/// operator hub.
///
/// Reads serve from the given tree first and fall back to registered
/// [`SyncSource`]s in registration order. Writes route through the owning
/// operator's queue when the tree is claimed, and apply directly on the
/// calling thread otherwise; either way the outcome arrives through the
/// callback, exactly once.
pub struct SyncHandler {
    hub: Arc<OperatorHub>,
    resolvers: Mutex<ResolverCache>,
    sources: Mutex<Vec<Box<dyn SyncSource>>>,
}

impl SyncHandler {
    /// Create a handler dispatching through `hub`.
    pub fn new(hub: Arc<OperatorHub>) -> Self {
        Self {
            hub,
            resolvers: Mutex::new(ResolverCache::new()),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// The hub this handler dispatches through.
    pub fn hub(&self) -> &OperatorHub {
        &self.hub
    }

    /// Append a fallback source, consulted after all earlier ones.
    ///
    /// Keys already claimed by an earlier source are shadowed for reads;
    /// each shadowed key is reported once at registration.
    pub fn register_source(&self, source: Box<dyn SyncSource>) {
        let mut sources = self.sources.lock().unwrap();
        for key in source.keys() {
            if let Some(earlier) = sources.iter().find(|existing| existing.contains(&key)) {
                log::warn!(
                    "key '{}' from source '{}' is shadowed by earlier source '{}'",
                    key,
                    source.name(),
                    earlier.name()
                );
            }
        }
        sources.push(source);
    }

    /// Remove the source named `name`. Removing an unknown name is a no-op.
    pub fn remove_source(&self, name: &str) -> bool {
        let mut sources = self.sources.lock().unwrap();
        let before = sources.len();
        sources.retain(|source| source.name() != name);
        sources.len() < before
    }

    /// Write `value` at `key` in `registry`, reporting through `on_done`.
    ///
    /// A malformed `key` is rejected synchronously before anything is
    /// queued, and `on_done` never fires. Otherwise: if an operator owns
    /// this tree the write is queued for it, and `on_done` fires from the
    /// worker (or immediately with [`SyncError::OperatorStopped`] when the
    /// queue is closed); on an unclaimed tree the write applies here and
    /// now. Only existing entries are written.
    pub fn set<F>(
        &self,
        registry: &Registry,
        key: &str,
        value: impl Into<Value>,
        on_done: F,
    ) -> std::result::Result<(), PathError>
    where
        F: FnOnce(Result<Vec<String>>) + Send + 'static,
    {
        PathExpr::parse(key)?;
        let value = value.into();

        if let Some(operator) = self.hub.operator_owning(registry) {
            let command = SetCommand::new(key, value).with_callback(on_done);
            if let Err(command) = operator.enqueue(command) {
                let id = operator.id().to_string();
                log::warn!("operator '{}' rejected a write to '{}'", id, key);
                command.complete(Err(SyncError::OperatorStopped { id }));
            }
            return Ok(());
        }

        let resolver = self.resolvers.lock().unwrap().resolver_for(registry);
        match resolver.set(key, value, SetOptions::default()) {
            Ok(written) if written.is_empty() => on_done(Err(SyncError::KeyNotFound {
                key: key.to_string(),
            })),
            Ok(written) => on_done(Ok(written)),
            Err(err) => {
                let mapped = match err {
                    crate::error::Error::Path(parse) => SyncError::Path(parse),
                    other => SyncError::Resolve(other.to_string()),
                };
                on_done(Err(mapped));
            }
        }
        Ok(())
    }

    /// The first match of `key` assignable to `T`, or `T::default()`.
    ///
    /// Serves from `registry` when given, then from fallback sources.
    /// Never fails: a malformed key is logged and treated as a registry
    /// miss, since callers here are typically UI bindings with no error
    /// channel of their own.
    pub fn get<T: FromValue + Default>(&self, registry: Option<&Registry>, key: &str) -> T {
        self.fetch(registry, key).unwrap_or_default()
    }

    /// Like [`SyncHandler::get`], but a total miss is `None` instead of a
    /// default.
    pub fn lookup(&self, registry: Option<&Registry>, key: &str) -> Option<Value> {
        self.fetch(registry, key)
    }

    /// Re-read `key` and hand the fresh value to `apply` when it differs
    /// from `current` (or when no previous value is known). Misses leave
    /// `apply` uncalled.
    pub fn update<T, F>(&self, registry: Option<&Registry>, key: &str, current: Option<&T>, apply: F)
    where
        T: FromValue + PartialEq,
        F: FnOnce(T),
    {
        let Some(latest) = self.fetch::<T>(registry, key) else {
            return;
        };
        if current.map_or(true, |seen| *seen != latest) {
            apply(latest);
        }
    }

    /// Registry first, then sources in registration order. A source that
    /// claims the key ends the scan even when its value fails to convert.
    fn fetch<T: FromValue>(&self, registry: Option<&Registry>, key: &str) -> Option<T> {
        if let Some(registry) = registry {
            let resolver = self.resolvers.lock().unwrap().resolver_for(registry);
            match resolver.get_as::<T>(key) {
                Ok(mut matches) if !matches.is_empty() => return Some(matches.remove(0)),
                Ok(_) => {}
                Err(err) => log::warn!("lookup of '{}' fell back to sources: {}", key, err),
            }
        }

        let sources = self.sources.lock().unwrap();
        for source in sources.iter() {
            if source.contains(key) {
                return source.value(key).and_then(|value| T::from_value(&value));
            }
        }
        None
    }
}
