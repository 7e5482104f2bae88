//! Hierarchical registry nodes.
//!
//! A `Registry` is one node of the state tree a training pipeline exposes:
//! a mapping from string identifiers to runtime-typed values, where a value
//! may itself be another registry. Nodes carry role tags ("trainer",
//! "architecture") that the tagged wildcards of path expressions filter on.
//!
//! Handles are cheap clones sharing the node behind a per-node `RwLock`:
//! any thread may read, and concurrent `set`/`get` calls on one node are
//! race-free. Traversal beyond one level is the resolver's job, never the
//! node's.

use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;
use thiserror::Error;

use crate::registry::value::{Value, ValueKind};

/// Errors raised by direct registry mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Identifier was empty
    #[error("registry identifiers must be non-empty")]
    EmptyIdentifier,

    /// Value is not assignable to the kind declared for the key
    #[error("value of kind {got} is not assignable to '{id}' (declared {declared})")]
    TypeMismatch {
        /// Offending identifier
        id: String,
        /// Kind declared for the identifier
        declared: ValueKind,
        /// Kind of the rejected value
        got: ValueKind,
    },
}

/// Node identity, used to key resolver caches and operator ownership checks.
///
/// Identity is pointer-based: two handles to the same node share an id, and
/// structurally equal but distinct nodes do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(usize);

struct EntrySlot {
    value: Value,
    declared: Option<ValueKind>,
}

struct RegistryInner {
    name: String,
    tags: Vec<String>,
    // Non-owning back-reference, kept for debug_path() only. Resolution
    // always walks downward from a supplied root.
    parent: Weak<RwLock<RegistryInner>>,
    entries: IndexMap<String, EntrySlot>,
}

/// A mutable, hierarchical mapping from identifiers to runtime-typed values.
///
/// Entries preserve registration order; wildcard resolution visits children
/// in the order they were stored. Cloning a `Registry` clones the handle,
/// not the node.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Registry {
    /// Create a detached node with no tags.
    pub fn new(name: &str) -> Self {
        Self::build(name, &[], Weak::new())
    }

    /// Create a detached node carrying role tags.
    pub fn with_tags(name: &str, tags: &[&str]) -> Self {
        Self::build(name, tags, Weak::new())
    }

    /// Create a node whose parent back-reference points at `parent`.
    ///
    /// Construction does not touch the parent: the child only becomes
    /// reachable by resolution once the parent explicitly stores it, e.g.
    /// via [`Registry::attach`].
    pub fn child_of(parent: &Registry, name: &str, tags: &[&str]) -> Self {
        Self::build(name, tags, Arc::downgrade(&parent.inner))
    }

    fn build(name: &str, tags: &[&str], parent: Weak<RwLock<RegistryInner>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                name: name.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                parent,
                entries: IndexMap::new(),
            })),
        }
    }

    /// Store `value` under `id`.
    ///
    /// Fails with [`RegistryError::TypeMismatch`] when a previously declared
    /// kind does not accept the value. First writes under an undeclared key
    /// always succeed and declare nothing.
    pub fn set(&self, id: &str, value: Value) -> Result<(), RegistryError> {
        self.store(id, value, None)
    }

    /// Store `value` under `id` and declare `kind` for future writes.
    ///
    /// The value itself must be assignable to `kind`; a later `set_typed`
    /// redeclares the kind.
    pub fn set_typed(&self, id: &str, value: Value, kind: ValueKind) -> Result<(), RegistryError> {
        self.store(id, value, Some(kind))
    }

    fn store(&self, id: &str, value: Value, kind: Option<ValueKind>) -> Result<(), RegistryError> {
        if id.is_empty() {
            return Err(RegistryError::EmptyIdentifier);
        }

        let mut inner = self.inner.write().unwrap();

        // The gate is the explicit declaration supplied with this write, or
        // failing that, whatever the key declared earlier.
        let declared = kind.or_else(|| {
            inner
                .entries
                .get(id)
                .and_then(|slot| slot.declared)
        });

        if let Some(gate) = declared {
            if !gate.accepts(&value) {
                return Err(RegistryError::TypeMismatch {
                    id: id.to_string(),
                    declared: gate,
                    got: value.kind(),
                });
            }
        }

        match inner.entries.get_mut(id) {
            Some(slot) => {
                slot.value = value;
                if kind.is_some() {
                    slot.declared = kind;
                }
            }
            None => {
                inner.entries.insert(
                    id.to_string(),
                    EntrySlot {
                        value,
                        declared: kind,
                    },
                );
            }
        }
        Ok(())
    }

    /// Store a child registry under `key`.
    pub fn attach(&self, key: &str, child: &Registry) -> Result<(), RegistryError> {
        self.set(key, Value::Registry(child.clone()))
    }

    /// The value stored under `id`, if any.
    pub fn get(&self, id: &str) -> Option<Value> {
        let inner = self.inner.read().unwrap();
        inner.entries.get(id).map(|slot| slot.value.clone())
    }

    /// Remove `id`, returning the previous value. Clears the declared kind.
    pub fn remove(&self, id: &str) -> Option<Value> {
        let mut inner = self.inner.write().unwrap();
        inner.entries.shift_remove(id).map(|slot| slot.value)
    }

    /// The kind declared for `id`, if one was ever supplied.
    pub fn declared_kind(&self, id: &str) -> Option<ValueKind> {
        let inner = self.inner.read().unwrap();
        inner.entries.get(id).and_then(|slot| slot.declared)
    }

    /// Whether `id` currently holds a value.
    pub fn contains_key(&self, id: &str) -> bool {
        let inner = self.inner.read().unwrap();
        inner.entries.contains_key(id)
    }

    /// Identifiers stored in this node, in registration order.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.entries.keys().cloned().collect()
    }

    /// One level of `(identifier, value)` pairs in registration order.
    ///
    /// No implicit recursion: child registries appear as `Value::Registry`
    /// entries and are not expanded.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let inner = self.inner.read().unwrap();
        inner
            .entries
            .iter()
            .map(|(id, slot)| (id.clone(), slot.value.clone()))
            .collect()
    }

    /// Number of entries in this node.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner.entries.len()
    }

    /// Whether this node holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Diagnostic name fixed at construction.
    pub fn name(&self) -> String {
        let inner = self.inner.read().unwrap();
        inner.name.clone()
    }

    /// Role tags carried by this node.
    pub fn tags(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.tags.clone()
    }

    /// Whether this node carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        let inner = self.inner.read().unwrap();
        inner.tags.iter().any(|t| t == tag)
    }

    /// The parent node, when it still exists.
    ///
    /// Diagnostics only; resolution never walks upward.
    pub fn parent(&self) -> Option<Registry> {
        let inner = self.inner.read().unwrap();
        inner.parent.upgrade().map(|arc| Registry { inner: arc })
    }

    /// Dotted chain of node names from the root down to this node.
    ///
    /// Built from the non-owning parent back-references, so it reflects the
    /// construction hierarchy rather than where a subtree happens to be
    /// attached. Intended for log lines and debugging.
    pub fn debug_path(&self) -> String {
        let mut names = vec![self.name()];
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            names.push(node.name());
            cursor = node.parent();
        }
        names.reverse();
        names.join(".")
    }

    /// Pointer-based identity for this node.
    pub fn id(&self) -> RegistryId {
        RegistryId(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Whether two handles refer to the same node.
    pub fn same_node(&self, other: &Registry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Recursive JSON dump of this subtree for the status monitor boundary.
    ///
    /// Entries render in registration order; the tree must be acyclic.
    pub fn snapshot(&self) -> serde_json::Value {
        // Clone one level under the lock, then recurse lock-free.
        let entries = self.entries();
        let mut object = serde_json::Map::with_capacity(entries.len());
        for (id, value) in entries {
            object.insert(id, value.to_json());
        }
        serde_json::Value::Object(object)
    }

    /// [`Registry::snapshot`] serialized as a JSON string.
    pub fn snapshot_string(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }
}

impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool {
        self.same_node(other)
    }
}

impl Eq for Registry {}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("Registry")
            .field("name", &inner.name)
            .field("tags", &inner.tags)
            .field("entries", &inner.entries.len())
            .finish()
    }
}
