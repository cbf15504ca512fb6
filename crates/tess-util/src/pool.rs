//! The hash-consing pool for blueprint terms.
//!
//! A [`UTerm`] is an immutable pair `(head, tail)` where the head is an
//! [`Atom`] and the tail is another interned term or nothing. The pool
//! guarantees that any `(head, tail)` pair is interned exactly once, so a
//! handle comparison *is* a structural comparison: blueprints can be used
//! directly as cache keys with identity hashing.
//!
//! # Layout
//!
//! Terms live in an arena owned by the pool; a handle is `(epoch, index)`.
//! A *leaf table* resolves heads of terms with no tail. Every term carries a
//! *child table* resolving the heads of terms whose tail it is; the child
//! table starts as an inline association list and upgrades to a hash map
//! once it outgrows [`PoolConfig::child_table_upgrade_threshold`]. Both
//! forms give amortized O(1) interning, and the list form keeps the common
//! case — a handful of distinct children per term — compact.
//!
//! # Atom restrictions
//!
//! Only identity-comparable values can be atoms: small integers, interned
//! operator names, characters, and already-interned terms. Floats and byte
//! strings have no [`Atom`] variant, which is what lets child tables hash
//! keys in O(1) regardless of term size.
//!
//! # Lifecycle and concurrency
//!
//! The process-wide pool ([`TERM_POOL`]) is initialized lazily on first use
//! and grows monotonically. [`TermPool::clear`] empties it and bumps the
//! pool epoch, so every previously issued handle is detectably stale:
//! interning with a stale or foreign tail panics. Interning is serialized by
//! a single mutex; after a racing pair of identical `intern` calls, both
//! callers hold the same handle and at most one node was added.
//!
//! # Examples
//!
//! ```
//! use tess_util::pool::{Atom, TermPool};
//!
//! let pool = TermPool::new();
//! let t1 = pool.intern(Atom::Int(1), None);
//! let t2 = pool.intern(Atom::Int(2), Some(t1));
//!
//! // Interning is idempotent: equal arguments, identical handle.
//! assert_eq!(pool.intern(Atom::Int(2), Some(t1)), t2);
//! assert_eq!(pool.head(t2), Atom::Int(2));
//! assert_eq!(pool.tail(t2), Some(t1));
//! ```

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::LazyLock;

use crate::opname::OpName;

/// The process-wide term pool.
pub static TERM_POOL: LazyLock<TermPool> = LazyLock::new(TermPool::new);

/// Epochs are allocated globally so handles from distinct pools (or from a
/// cleared pool) never compare equal by accident.
static NEXT_EPOCH: AtomicU32 = AtomicU32::new(1);

fn fresh_epoch() -> u32 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// An atom: an identity-comparable term element.
///
/// Equality and hashing are O(1) for every variant; interned sub-terms
/// compare by handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Atom {
    /// A small integer.
    Int(i64),
    /// An interned operator name or function identifier.
    Op(OpName),
    /// A character.
    Char(char),
    /// An already-interned term.
    Term(UTerm),
}

/// A handle to an interned term.
///
/// Identity implies structural equality and vice versa; two handles are
/// equal exactly when they denote the same `(head, tail)` pair in the same
/// pool epoch. `Hash` hashes the handle, not the structure.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UTerm {
    epoch: u32,
    index: u32,
}

impl std::fmt::Debug for UTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UTerm({}.{})", self.epoch, self.index)
    }
}

impl UTerm {
    /// Intern `(head, tail)` in the process-wide pool.
    #[inline]
    pub fn intern(head: Atom, tail: UList) -> UTerm {
        TERM_POOL.intern(head, tail)
    }
}

/// A possibly-empty interned list: `None` terminates every term chain.
pub type UList = Option<UTerm>;

/// Pool tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    /// Initial capacity hint for the leaf table.
    pub initial_leaf_capacity: usize,
    /// Child-table size beyond which the inline list upgrades to a map.
    pub child_table_upgrade_threshold: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { initial_leaf_capacity: 256, child_table_upgrade_threshold: 8 }
    }
}

/// Counters describing a pool, for tests and profiling.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolStats {
    /// Total interned terms.
    pub nodes: usize,
    /// Terms with no tail.
    pub leaves: usize,
    /// Intern calls that found an existing term.
    pub hits: usize,
    /// Intern calls that created a term.
    pub misses: usize,
}

/// Per-term child table: `head → child` for every interned `(head, self)`.
enum ChildTable {
    List(Vec<(Atom, u32)>),
    Map(FxHashMap<Atom, u32>),
}

impl ChildTable {
    fn get(&self, head: Atom) -> Option<u32> {
        match self {
            ChildTable::List(entries) => {
                entries.iter().find(|(h, _)| *h == head).map(|(_, i)| *i)
            }
            ChildTable::Map(map) => map.get(&head).copied(),
        }
    }

    fn insert(&mut self, head: Atom, index: u32, upgrade_threshold: usize) {
        match self {
            ChildTable::List(entries) => {
                entries.push((head, index));
                if entries.len() > upgrade_threshold {
                    let map = entries.drain(..).collect();
                    *self = ChildTable::Map(map);
                }
            }
            ChildTable::Map(map) => {
                map.insert(head, index);
            }
        }
    }
}

struct TermNode {
    head: Atom,
    tail: UList,
    children: ChildTable,
}

struct PoolInner {
    epoch: u32,
    nodes: Vec<TermNode>,
    leaves: FxHashMap<Atom, u32>,
}

/// An interning pool for immutable cons-like terms.
///
/// Usually accessed through [`TERM_POOL`]; standalone pools are handy in
/// tests, where node counts must be deterministic.
pub struct TermPool {
    config: PoolConfig,
    inner: Mutex<PoolInner>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TermPool {
    /// Create a pool with default configuration.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with the given configuration.
    pub fn with_config(config: PoolConfig) -> Self {
        let leaves = FxHashMap::with_capacity_and_hasher(
            config.initial_leaf_capacity,
            Default::default(),
        );
        Self {
            config,
            inner: Mutex::new(PoolInner { epoch: fresh_epoch(), nodes: Vec::new(), leaves }),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Intern `(head, tail)`, returning the unique handle for the pair.
    ///
    /// Never fails for well-typed atoms. Panics if `tail` (or a `Term` atom
    /// in `head`) was issued by another pool or by this pool before a
    /// [`clear`](TermPool::clear).
    pub fn intern(&self, head: Atom, tail: UList) -> UTerm {
        let mut inner = self.inner.lock();
        let epoch = inner.epoch;

        if let Atom::Term(t) = head {
            assert_eq!(t.epoch, epoch, "head term is foreign or stale");
        }

        let index = match tail {
            None => {
                if let Some(&index) = inner.leaves.get(&head) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return UTerm { epoch, index };
                }
                let index = Self::push_node(&mut inner, head, None);
                inner.leaves.insert(head, index);
                index
            }
            Some(t) => {
                assert_eq!(t.epoch, epoch, "tail term is foreign or stale");
                let parent = t.index as usize;
                if let Some(index) = inner.nodes[parent].children.get(head) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return UTerm { epoch, index };
                }
                let index = Self::push_node(&mut inner, head, tail);
                let threshold = self.config.child_table_upgrade_threshold;
                inner.nodes[parent].children.insert(head, index, threshold);
                index
            }
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        UTerm { epoch, index }
    }

    fn push_node(inner: &mut PoolInner, head: Atom, tail: UList) -> u32 {
        let index = inner.nodes.len();
        assert!(index <= u32::MAX as usize, "term pool exhausted");
        inner.nodes.push(TermNode { head, tail, children: ChildTable::List(Vec::new()) });
        index as u32
    }

    /// Intern a whole list of atoms, right to left.
    ///
    /// `list(&[a, b, c])` is `intern(a, intern(b, intern(c, None)))`; an
    /// empty slice yields `None`.
    pub fn list(&self, atoms: &[Atom]) -> UList {
        let mut tail = None;
        for &atom in atoms.iter().rev() {
            tail = Some(self.intern(atom, tail));
        }
        tail
    }

    /// The head atom of a term.
    pub fn head(&self, term: UTerm) -> Atom {
        let inner = self.inner.lock();
        assert_eq!(term.epoch, inner.epoch, "term is foreign or stale");
        inner.nodes[term.index as usize].head
    }

    /// The tail of a term.
    pub fn tail(&self, term: UTerm) -> UList {
        let inner = self.inner.lock();
        assert_eq!(term.epoch, inner.epoch, "term is foreign or stale");
        inner.nodes[term.index as usize].tail
    }

    /// Iterate over the atoms of a list.
    pub fn iter(&self, list: UList) -> TermIter<'_> {
        TermIter { pool: self, cursor: list }
    }

    /// Collect the atoms of a list into a vector.
    pub fn atoms(&self, list: UList) -> Vec<Atom> {
        self.iter(list).collect()
    }

    /// Number of interned terms.
    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    /// Snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        PoolStats {
            nodes: inner.nodes.len(),
            leaves: inner.leaves.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every interned term and start a fresh epoch.
    ///
    /// All outstanding handles become stale; using one afterwards panics.
    /// Intended for long-running processes that lower unrelated programs in
    /// sequence.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.nodes.clear();
        inner.leaves.clear();
        inner.epoch = fresh_epoch();
    }

    /// Render a list as an s-expression, for diagnostics and tests.
    pub fn render(&self, list: UList) -> String {
        let mut out = String::new();
        self.render_list(list, &mut out);
        out
    }

    fn render_list(&self, list: UList, out: &mut String) {
        out.push('(');
        let mut first = true;
        for atom in self.iter(list) {
            if !first {
                out.push(' ');
            }
            first = false;
            match atom {
                Atom::Int(i) => out.push_str(&i.to_string()),
                Atom::Op(name) => out.push_str(name.as_str()),
                Atom::Char(c) => {
                    out.push('\'');
                    out.push(c);
                    out.push('\'');
                }
                Atom::Term(t) => self.render_list(Some(t), out),
            }
        }
        out.push(')');
    }
}

impl Default for TermPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the atoms of an interned list.
pub struct TermIter<'a> {
    pool: &'a TermPool,
    cursor: UList,
}

impl Iterator for TermIter<'_> {
    type Item = Atom;

    fn next(&mut self) -> Option<Atom> {
        let term = self.cursor?;
        let head = self.pool.head(term);
        self.cursor = self.pool.tail(term);
        Some(head)
    }
}

static_assertions::assert_impl_all!(UTerm: Send, Sync, Copy);
static_assertions::assert_impl_all!(Atom: Send, Sync, Copy);
static_assertions::assert_impl_all!(TermPool: Send, Sync);
