use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::{FunctionEntry, Node, TypeEntry};

/// What a dotted path resolved to (§4.2). Cheaply `Clone`, so the worker's
/// executable cache can store one per path without re-resolving.
#[derive(Clone)]
pub enum Resolved {
    Function(Arc<FunctionEntry>),
    Method {
        type_path: String,
        type_entry: Arc<TypeEntry>,
        method: String,
    },
}

/// A dotted path didn't match any registered function or type method.
#[derive(Debug, Clone)]
pub struct ResolveError(pub String);

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no such method: {}", self.0)
    }
}

impl std::error::Error for ResolveError {}

/// The process-local resolution table built once at worker startup from a
/// [`crate::builder::RegistryBuilder`]. Paths are shallow in practice
/// (`type.method` or a bare function name) so a flat map keyed by the full
/// dotted path realizes the lookup without a literal nested trie.
pub struct Registry {
    entries: HashMap<String, Node>,
}

impl Registry {
    pub(crate) fn new(entries: HashMap<String, Node>) -> Self {
        Self { entries }
    }

    /// Resolve `path` per §4.2's order: exact function match first, then
    /// parent-is-a-type-with-this-method, else not found.
    pub fn resolve(&self, path: &str) -> Result<Resolved, ResolveError> {
        if let Some(Node::Function(f)) = self.entries.get(path) {
            return Ok(Resolved::Function(f.clone()));
        }
        if let Some((parent, method)) = path.rsplit_once('.') {
            if let Some(Node::Type(type_entry)) = self.entries.get(parent) {
                if type_entry.has_method(method) {
                    return Ok(Resolved::Method {
                        type_path: parent.to_string(),
                        type_entry: type_entry.clone(),
                        method: method.to_string(),
                    });
                }
            }
        }
        Err(ResolveError(path.to_string()))
    }
}
