//! Operator-name interner built on DashMap for concurrent access.
//!
//! The table is process-wide and append-only: names are interned once,
//! leaked to obtain `'static` lifetime, and live for the program duration.
//! Lookups in both directions are O(1).

use ahash::RandomState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::LazyLock;

use super::{OpName, OpNameStats, KNOWN_NAMES, RESERVED_NAMES_END};

/// Global operator-name table.
///
/// Initialized on first use via `LazyLock`; all known names are pre-interned
/// during initialization so they have stable, predictable indices.
pub static OP_TABLE: LazyLock<OpTable> = LazyLock::new(|| {
    let table = OpTable::new();
    table.initialize_known_names();
    table
});

/// Thread-safe operator-name table.
///
/// Two maps are kept in step: `indices` resolves a string to its index and
/// `names` resolves an index back to its string. Both use DashMap so
/// concurrent interning never blocks on a global lock.
pub struct OpTable {
    /// Name → index.
    indices: DashMap<&'static str, u32, RandomState>,

    /// Index → name.
    names: DashMap<u32, &'static str, RandomState>,

    /// Next index to hand out; starts past the reserved range.
    next_index: AtomicU32,

    /// Number of lookups that found an existing entry.
    hits: AtomicUsize,

    /// Number of lookups that allocated a new entry.
    misses: AtomicUsize,
}

impl OpTable {
    fn new() -> Self {
        Self {
            indices: DashMap::with_capacity_and_hasher(64, RandomState::new()),
            names: DashMap::with_capacity_and_hasher(64, RandomState::new()),
            next_index: AtomicU32::new(RESERVED_NAMES_END),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Pre-intern every known name at its fixed index.
    fn initialize_known_names(&self) {
        for (idx, name) in KNOWN_NAMES.iter().enumerate() {
            let idx = idx as u32;
            debug_assert!(idx < RESERVED_NAMES_END);
            self.indices.insert(name, idx);
            self.names.insert(idx, name);
        }
    }

    /// Intern a name, returning its handle.
    ///
    /// Repeated calls with the same string return the same handle. Racing
    /// calls for a new string both observe the winner's entry; the loser's
    /// allocation is discarded.
    pub fn intern(&self, string: &str) -> OpName {
        if let Some(entry) = self.indices.get(string) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return OpName { index: *entry };
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let leaked: &'static str = Box::leak(string.to_string().into_boxed_str());

        match self.indices.entry(leaked) {
            dashmap::mapref::entry::Entry::Occupied(entry) => OpName { index: *entry.get() },
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let index = self.next_index.fetch_add(1, Ordering::Relaxed);
                entry.insert(index);
                self.names.insert(index, leaked);
                OpName { index }
            }
        }
    }

    /// Get the string of a handle.
    pub fn get(&self, name: OpName) -> Option<&'static str> {
        self.names.get(&name.index).map(|entry| *entry.value())
    }

    /// Snapshot of the table's counters.
    pub fn stats(&self) -> OpNameStats {
        OpNameStats {
            count: self.names.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
