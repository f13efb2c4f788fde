//! Executable resolution (PATH lookup + memoization).
//!
//! Resolver::resolve -> Option<PathBuf>
//! The installed toolset is assumed static for the life of the process, so
//! a result (hit or miss) is never re-probed once cached.

use dashmap::DashMap;
use std::path::PathBuf;

/// Memoizing front for the host's executable search.
///
/// Lookups are keyed by the exact input string. Two tasks racing on the same
/// uncached name may both probe the filesystem; whichever inserts first wins
/// and both callers observe that entry.
#[derive(Debug, Default)]
pub struct Resolver {
    cache: DashMap<String, Option<PathBuf>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name` to an executable path, or `None` when nothing runnable
    /// by that name exists. Absence is cached like any other result.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if let Some(hit) = self.cache.get(name) {
            return hit.clone();
        }

        // Probe without holding a shard lock; the insert below settles races.
        let probed = probe(name);
        self.cache
            .entry(name.to_string())
            .or_insert(probed)
            .value()
            .clone()
    }

    /// Cached entry for `name`, if one exists (outer None = never looked up).
    pub fn cached(&self, name: &str) -> Option<Option<PathBuf>> {
        self.cache.get(name).map(|e| e.value().clone())
    }

    /// Number of distinct names looked up so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Uncached lookup. `which` requires the candidate to exist and carry execute
/// permission; names with a path separator are checked as given.
fn probe(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    match which::which(name) {
        Ok(path) => {
            tracing::trace!(name, path = %path.display(), "executable resolved");
            Some(path)
        }
        Err(err) => {
            tracing::trace!(name, %err, "executable not found");
            None
        }
    }
}
