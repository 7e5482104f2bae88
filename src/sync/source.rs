//! Fallback key/value providers consulted when a registry read misses.

use indexmap::IndexMap;

use crate::registry::Value;

/// A named provider of fallback values, consulted in registration order.
///
/// Possession and value are separate questions on purpose: a source that
/// [`contains`](SyncSource::contains) a key ends the scan even when
/// [`value`](SyncSource::value) then turns up empty, so an earlier source
/// can mask a key outright.
pub trait SyncSource: Send {
    /// Identifier used for registration diagnostics and removal.
    fn name(&self) -> &str;

    /// Every key this source can answer for, in its own order.
    fn keys(&self) -> Vec<String>;

    /// Whether this source claims `key`.
    fn contains(&self, key: &str) -> bool;

    /// The current value for `key`, if any.
    fn value(&self, key: &str) -> Option<Value>;
}

/// A fixed in-memory source, typically holding launch-time defaults.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    name: String,
    values: IndexMap<String, Value>,
}

impl StaticSource {
    /// Create an empty source named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: IndexMap::new(),
        }
    }

    /// Add or overwrite an entry, returning `self` for chaining.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or overwrite an entry.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Remove an entry, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the source holds no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SyncSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}
