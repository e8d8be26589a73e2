//! String pool owned by the graph builder.
//!
//! Drawings repeat the same handful of strings thousands of times (layer
//! names, entity types, block names, group-code keys). The pool hands out
//! shared `Arc<str>` handles so every repeat points at one allocation.
//! Interning never changes what a query sees.

use ahash::AHashSet;
use std::sync::Arc;

/// Cheap, clonable handle to an interned string.
pub type SharedStr = Arc<str>;

#[derive(Debug, Default)]
pub struct StringPool {
    strings: AHashSet<SharedStr>,
    requests: u64,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the shared handle.
    pub fn intern(&mut self, s: &str) -> SharedStr {
        self.requests += 1;
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let shared: SharedStr = Arc::from(s);
        self.strings.insert(Arc::clone(&shared));
        shared
    }

    /// Number of distinct strings stored.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn contains(&self, s: &str) -> bool {
        self.strings.contains(s)
    }

    /// How many `intern` calls were served by an existing entry.
    pub fn hits(&self) -> u64 {
        self.requests.saturating_sub(self.strings.len() as u64)
    }
}
