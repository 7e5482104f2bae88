//! Path-expression evaluation against a registry tree.
//!
//! The resolver walks a tree rooted at one [`Registry`] node, matching a
//! compiled [`PathExpr`] segment by segment. Matching is exhaustive: every
//! branch satisfying a wildcard is explored and results accumulate in
//! depth-first, registration order. Reads collect `(path, value)` pairs;
//! writes assign the terminal segment in every matched container.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::query::path::{PathExpr, Segment};
use crate::registry::{FromValue, Registry, RegistryId, Value, ValueKind};

/// One read match: the resolved dotted path of actual keys and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    /// Dotted path of the keys that matched, e.g. `trainer1.accuracy`
    pub path: String,
    /// The matched value
    pub value: Value,
}

/// Options controlling [`Resolver::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Create a missing literal terminal instead of skipping it
    pub add_missing: bool,
    /// Kind declared for entries created through `add_missing`
    pub declared: Option<ValueKind>,
}

/// Evaluates path expressions against the tree rooted at one registry node.
///
/// Each resolver keeps an instance-scoped cache of compiled expressions
/// keyed by the raw string, so repeated queries skip recompilation.
pub struct Resolver {
    root: Registry,
    compiled_cache: Mutex<HashMap<String, PathExpr>>,
}

impl Resolver {
    /// Create a resolver over the tree rooted at `root`.
    pub fn new(root: &Registry) -> Self {
        Self {
            root: root.clone(),
            compiled_cache: Mutex::new(HashMap::new()),
        }
    }

    /// The root this resolver evaluates against.
    pub fn root(&self) -> &Registry {
        &self.root
    }

    /// Drop all cached expressions.
    pub fn clear_cache(&self) {
        self.compiled_cache.lock().unwrap().clear();
    }

    /// All `(path, value)` pairs matching `expr`, in traversal order.
    ///
    /// Zero matches is an ordinary outcome and returns an empty vector;
    /// only a malformed expression fails.
    pub fn get(&self, expr: &str) -> Result<Vec<ResolvedEntry>> {
        let compiled = self.compiled(expr)?;
        let mut matches = Vec::new();
        walk_matches(&self.root, compiled.segments(), "", &mut matches);
        Ok(matches)
    }

    /// Matches of `expr` filtered to values assignable to `T`.
    ///
    /// Values of other kinds are silently dropped; zero matches (or zero
    /// assignable matches) yields an empty vector, never an error.
    pub fn get_as<T: FromValue>(&self, expr: &str) -> Result<Vec<T>> {
        let matches = self.get(expr)?;
        Ok(matches
            .iter()
            .filter_map(|entry| T::from_value(&entry.value))
            .collect())
    }

    /// The unique match of `expr` assignable to `T`.
    ///
    /// Fails with [`Error::NoMatch`] on zero matches and
    /// [`Error::AmbiguousPath`] on more than one; wildcard expressions that
    /// fan out must not be passed here.
    pub fn get_single<T: FromValue>(&self, expr: &str) -> Result<T> {
        let mut matches = self.get_as::<T>(expr)?;
        match matches.len() {
            0 => Err(Error::NoMatch {
                expr: expr.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            count => Err(Error::AmbiguousPath {
                expr: expr.to_string(),
                count,
            }),
        }
    }

    /// Like [`Resolver::get_single`], but zero matches yields `default`.
    pub fn get_single_or<T: FromValue>(&self, expr: &str, default: T) -> Result<T> {
        let mut matches = self.get_as::<T>(expr)?;
        match matches.len() {
            0 => Ok(default),
            1 => Ok(matches.remove(0)),
            count => Err(Error::AmbiguousPath {
                expr: expr.to_string(),
                count,
            }),
        }
    }

    /// Write `value` at every position matching `expr`.
    ///
    /// All but the last segment select container registries; the terminal
    /// segment is then assigned per container:
    ///
    /// - a literal terminal overwrites an existing entry, or creates it
    ///   when `options.add_missing` is set (declaring `options.declared`);
    /// - a `*` terminal overwrites every existing entry and never creates;
    /// - a tagged terminal overwrites matching child-registry entries.
    ///
    /// A write rejected by a declared kind skips that one match with a
    /// warning; the returned list holds the paths actually written, and an
    /// empty list is an ordinary, distinguishable outcome.
    pub fn set(&self, expr: &str, value: Value, options: SetOptions) -> Result<Vec<String>> {
        let compiled = self.compiled(expr)?;
        let Some((terminal, route)) = compiled.segments().split_last() else {
            return Ok(Vec::new());
        };

        let mut containers = Vec::new();
        walk_containers(&self.root, route, "", &mut containers);

        let mut written = Vec::new();
        for (path, container) in containers {
            match terminal {
                Segment::Literal(name) => {
                    if container.contains_key(name) {
                        apply_write(&container, &path, name, value.clone(), None, &mut written);
                    } else if options.add_missing {
                        apply_write(
                            &container,
                            &path,
                            name,
                            value.clone(),
                            options.declared,
                            &mut written,
                        );
                    }
                }
                Segment::Wildcard => {
                    for key in container.keys() {
                        apply_write(&container, &path, &key, value.clone(), None, &mut written);
                    }
                }
                Segment::TaggedWildcard { prefix, tag } => {
                    for (key, existing) in container.entries() {
                        if !key.starts_with(prefix.as_str()) {
                            continue;
                        }
                        let tagged = existing
                            .as_registry()
                            .map_or(false, |child| child.has_tag(tag));
                        if tagged {
                            apply_write(&container, &path, &key, value.clone(), None, &mut written);
                        }
                    }
                }
            }
        }
        Ok(written)
    }

    fn compiled(&self, raw: &str) -> Result<PathExpr> {
        let mut cache = self.compiled_cache.lock().unwrap();
        if let Some(expr) = cache.get(raw) {
            return Ok(expr.clone());
        }
        let expr = PathExpr::parse(raw)?;
        cache.insert(raw.to_string(), expr.clone());
        Ok(expr)
    }
}

/// Depth-first read walk. Non-terminal segments descend only into child
/// registries; terminal literal/`*` segments match any entry, while a
/// terminal tagged segment still requires a tagged child registry.
fn walk_matches(node: &Registry, segments: &[Segment], prefix: &str, out: &mut Vec<ResolvedEntry>) {
    let Some((segment, rest)) = segments.split_first() else {
        return;
    };
    match segment {
        Segment::Literal(name) => {
            if let Some(value) = node.get(name) {
                let path = join_path(prefix, name);
                if rest.is_empty() {
                    out.push(ResolvedEntry { path, value });
                } else if let Value::Registry(child) = value {
                    walk_matches(&child, rest, &path, out);
                }
            }
        }
        Segment::Wildcard => {
            for (key, value) in node.entries() {
                let path = join_path(prefix, &key);
                if rest.is_empty() {
                    out.push(ResolvedEntry { path, value });
                } else if let Value::Registry(child) = value {
                    walk_matches(&child, rest, &path, out);
                }
            }
        }
        Segment::TaggedWildcard { prefix: lit, tag } => {
            for (key, value) in node.entries() {
                if !key.starts_with(lit.as_str()) {
                    continue;
                }
                let Some(child) = value.as_registry().cloned() else {
                    continue;
                };
                if !child.has_tag(tag) {
                    continue;
                }
                let path = join_path(prefix, &key);
                if rest.is_empty() {
                    out.push(ResolvedEntry { path, value });
                } else {
                    walk_matches(&child, rest, &path, out);
                }
            }
        }
    }
}

/// Walk selecting the container registries matching a full segment route.
/// Every step requires a child registry; leaves cannot contain keys.
fn walk_containers(
    node: &Registry,
    segments: &[Segment],
    prefix: &str,
    out: &mut Vec<(String, Registry)>,
) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push((prefix.to_string(), node.clone()));
        return;
    };
    match segment {
        Segment::Literal(name) => {
            if let Some(Value::Registry(child)) = node.get(name) {
                walk_containers(&child, rest, &join_path(prefix, name), out);
            }
        }
        Segment::Wildcard => {
            for (key, value) in node.entries() {
                if let Value::Registry(child) = value {
                    walk_containers(&child, rest, &join_path(prefix, &key), out);
                }
            }
        }
        Segment::TaggedWildcard { prefix: lit, tag } => {
            for (key, value) in node.entries() {
                if !key.starts_with(lit.as_str()) {
                    continue;
                }
                if let Value::Registry(child) = value {
                    if child.has_tag(tag) {
                        walk_containers(&child, rest, &join_path(prefix, &key), out);
                    }
                }
            }
        }
    }
}

fn apply_write(
    container: &Registry,
    path: &str,
    key: &str,
    value: Value,
    declared: Option<ValueKind>,
    written: &mut Vec<String>,
) {
    let target = join_path(path, key);
    log::trace!("writing {} at '{}'", value, target);
    let result = match declared {
        Some(kind) => container.set_typed(key, value, kind),
        None => container.set(key, value),
    };
    match result {
        Ok(()) => written.push(target),
        Err(err) => log::warn!("skipping write to '{}': {}", target, err),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Caches one resolver per distinct root node.
///
/// Keyed by node identity, not value: two structurally equal trees get two
/// resolvers, and every root amortizes its own expression cache. Cached
/// resolvers keep their root registry alive for the cache's lifetime.
#[derive(Default)]
pub struct ResolverCache {
    resolvers: HashMap<RegistryId, Arc<Resolver>>,
}

impl ResolverCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolver for `root`, created on first sight.
    pub fn resolver_for(&mut self, root: &Registry) -> Arc<Resolver> {
        self.resolvers
            .entry(root.id())
            .or_insert_with(|| Arc::new(Resolver::new(root)))
            .clone()
    }

    /// Number of distinct roots seen.
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Whether no root has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Drop every cached resolver.
    pub fn clear(&mut self) {
        self.resolvers.clear();
    }
}
