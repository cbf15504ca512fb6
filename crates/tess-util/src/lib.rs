//! tess-util - Core Utilities and Foundation Types
//!
//! Foundation crate for the tess array middle-end. It provides the
//! process-wide interners every other crate builds on:
//!
//! - [`opname`]: interned operator names ([`OpName`]), a compact 4-byte
//!   handle with O(1) comparison and hashing.
//! - [`pool`]: the hash-consing pool for blueprint terms ([`UTerm`]),
//!   where identity equality coincides with structural equality.
//! - [`index`]: typed indices ([`Idx`], [`IndexVec`]) that keep the many
//!   id spaces of the middle-end from being mixed up.

pub mod index;
pub mod opname;
pub mod pool;

pub use index::{Idx, IndexVec};
pub use opname::OpName;
pub use pool::{Atom, PoolConfig, PoolStats, TermPool, UList, UTerm, TERM_POOL};

// Re-export commonly used hash containers
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
