//! Variable store.
//!
//! The evaluator talks to its variables through the [`Store`] trait so a host
//! can supply its own backing map.  [`MemoryStore`] is the default.

use std::collections::HashMap;
use std::rc::Rc;

use crate::variable::Variable;

/// Name → value map consumed by the evaluator.
///
/// Values handed to [`Store::set`] belong to the store afterwards; readers get
/// a shared handle.
pub trait Store {
    fn get(&self, name: &str) -> Option<Rc<Variable>>;

    /// Set (or overwrite) a variable.  Returns `true` on success.
    fn set(&mut self, name: &str, value: Variable) -> bool;

    fn has(&self, name: &str) -> bool;

    /// Remove a variable.  Returns `true` if it existed.
    fn remove(&mut self, name: &str) -> bool;

    fn clear(&mut self);

    /// All variable names, sorted.
    fn keys(&self) -> Vec<String>;
}

/// In-memory store backed by a `HashMap`.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    vars: HashMap<String, Rc<Variable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, name: &str) -> Option<Rc<Variable>> {
        self.vars.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: Variable) -> bool {
        if name.is_empty() {
            return false;
        }
        self.vars.insert(name.to_owned(), Rc::new(value));
        true
    }

    fn has(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    fn remove(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    fn clear(&mut self) {
        self.vars.clear();
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.vars.keys().cloned().collect();
        keys.sort();
        keys
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
