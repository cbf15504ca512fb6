//! Interned operator names.
//!
//! An [`OpName`] is a compact (4-byte) handle to an interned string. The
//! middle-end uses operator names in two roles: as the operators of map and
//! reduction nodes, and as the head symbols that tag blueprint terms. In
//! both roles the only operations that matter are equality and hashing, so
//! names are interned once and compared by index.
//!
//! Names that the lowering pass itself emits are pre-interned at fixed
//! indices (see the `HEAD_*`, `OP_*`, and `TY_*` constants), which keeps
//! blueprints built by different invocations structurally identical.
//!
//! # Examples
//!
//! ```
//! use tess_util::OpName;
//!
//! let a = OpName::intern("add");
//! let b = OpName::intern("add");
//! assert_eq!(a, b);
//! assert_eq!(a.as_str(), "add");
//! ```

mod interner;

pub use interner::OP_TABLE;

/// Number of indices reserved for known names.
pub(crate) const RESERVED_NAMES_END: u32 = 64;

/// Every known name, in index order. Must match the constants below.
pub(crate) const KNOWN_NAMES: &[&str] = &[
    // Blueprint head symbols
    "blueprint", "for", "store", "ref", "call", "reduce", "accumulate", "nil",
    // Operators
    "add", "sub", "mul", "div", "rem", "neg", "abs", "max", "min",
    "eq", "ne", "lt", "le", "gt", "ge",
    // Numeric type names
    "u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64",
    "generic",
];

// Blueprint head symbols

/// Head symbol of a top-level blueprint term.
pub const HEAD_BLUEPRINT: OpName = OpName { index: 0 };
/// Head symbol of a loop term.
pub const HEAD_FOR: OpName = OpName { index: 1 };
/// Head symbol of a store term.
pub const HEAD_STORE: OpName = OpName { index: 2 };
/// Head symbol of a storage reference term.
pub const HEAD_REF: OpName = OpName { index: 3 };
/// Head symbol of an operator application term.
pub const HEAD_CALL: OpName = OpName { index: 4 };
/// Head symbol of a reduction term.
pub const HEAD_REDUCE: OpName = OpName { index: 5 };
/// Head symbol of a fold-with-identity term.
pub const HEAD_ACCUMULATE: OpName = OpName { index: 6 };
/// Marker for an empty sub-list inside a term.
pub const SYM_NIL: OpName = OpName { index: 7 };

// Operators

/// The `add` operator.
pub const OP_ADD: OpName = OpName { index: 8 };
/// The `sub` operator.
pub const OP_SUB: OpName = OpName { index: 9 };
/// The `mul` operator.
pub const OP_MUL: OpName = OpName { index: 10 };
/// The `div` operator.
pub const OP_DIV: OpName = OpName { index: 11 };
/// The `rem` operator.
pub const OP_REM: OpName = OpName { index: 12 };
/// The `neg` operator.
pub const OP_NEG: OpName = OpName { index: 13 };
/// The `abs` operator.
pub const OP_ABS: OpName = OpName { index: 14 };
/// The `max` operator.
pub const OP_MAX: OpName = OpName { index: 15 };
/// The `min` operator.
pub const OP_MIN: OpName = OpName { index: 16 };
/// The `eq` comparison.
pub const OP_EQ: OpName = OpName { index: 17 };
/// The `ne` comparison.
pub const OP_NE: OpName = OpName { index: 18 };
/// The `lt` comparison.
pub const OP_LT: OpName = OpName { index: 19 };
/// The `le` comparison.
pub const OP_LE: OpName = OpName { index: 20 };
/// The `gt` comparison.
pub const OP_GT: OpName = OpName { index: 21 };
/// The `ge` comparison.
pub const OP_GE: OpName = OpName { index: 22 };

// Numeric type names

/// Name of the `u8` element type.
pub const TY_U8: OpName = OpName { index: 23 };
/// Name of the `u16` element type.
pub const TY_U16: OpName = OpName { index: 24 };
/// Name of the `u32` element type.
pub const TY_U32: OpName = OpName { index: 25 };
/// Name of the `u64` element type.
pub const TY_U64: OpName = OpName { index: 26 };
/// Name of the `i8` element type.
pub const TY_I8: OpName = OpName { index: 27 };
/// Name of the `i16` element type.
pub const TY_I16: OpName = OpName { index: 28 };
/// Name of the `i32` element type.
pub const TY_I32: OpName = OpName { index: 29 };
/// Name of the `i64` element type.
pub const TY_I64: OpName = OpName { index: 30 };
/// Name of the `f32` element type.
pub const TY_F32: OpName = OpName { index: 31 };
/// Name of the `f64` element type.
pub const TY_F64: OpName = OpName { index: 32 };
/// Name of the generic (unspecialized) element type.
pub const TY_GENERIC: OpName = OpName { index: 33 };

/// An interned operator name.
///
/// Exactly 4 bytes; comparison and hashing are index operations. Interned
/// strings live for the program duration, so `as_str` returns `&'static str`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpName {
    /// Index into the global name table.
    pub(crate) index: u32,
}

impl OpName {
    /// Intern a name, returning its handle.
    ///
    /// Thread-safe; racing calls for the same string observe the same
    /// handle.
    #[inline]
    pub fn intern(string: &str) -> Self {
        OP_TABLE.intern(string)
    }

    /// The string this handle was interned from.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        OP_TABLE.get(*self).unwrap_or("")
    }

    /// Derive the name of the `n`-th value of a multi-valued operator.
    ///
    /// `OpName::intern("divmod").indexed(1)` is the interned name
    /// `divmod#1`. Derived names are ordinary interned names: deriving the
    /// same pair twice yields the same handle.
    pub fn indexed(&self, n: u32) -> Self {
        Self::intern(&format!("{}#{}", self.as_str(), n))
    }

    /// True for names pre-interned at startup.
    #[inline]
    pub fn is_known(&self) -> bool {
        self.index < RESERVED_NAMES_END
    }

    /// The raw index, for debugging.
    #[inline]
    pub fn as_u32(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Debug for OpName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpName({})", self.as_str())
    }
}

impl std::fmt::Display for OpName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counters of the operator-name table, for profiling.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpNameStats {
    /// Number of interned names.
    pub count: usize,
    /// Lookups that found an existing entry.
    pub hits: usize,
    /// Lookups that allocated a new entry.
    pub misses: usize,
}

static_assertions::assert_impl_all!(OpName: Send, Sync, Copy);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_resolve() {
        assert_eq!(HEAD_BLUEPRINT.as_str(), "blueprint");
        assert_eq!(HEAD_FOR.as_str(), "for");
        assert_eq!(HEAD_STORE.as_str(), "store");
        assert_eq!(HEAD_REF.as_str(), "ref");
        assert_eq!(HEAD_CALL.as_str(), "call");
        assert_eq!(HEAD_REDUCE.as_str(), "reduce");
        assert_eq!(HEAD_ACCUMULATE.as_str(), "accumulate");
        assert_eq!(OP_ADD.as_str(), "add");
        assert_eq!(OP_MAX.as_str(), "max");
        assert_eq!(TY_F64.as_str(), "f64");
        assert_eq!(TY_GENERIC.as_str(), "generic");
    }

    #[test]
    fn test_interning_known_name_returns_constant() {
        assert_eq!(OpName::intern("add"), OP_ADD);
        assert_eq!(OpName::intern("blueprint"), HEAD_BLUEPRINT);
        assert_eq!(OpName::intern("f32"), TY_F32);
    }

    #[test]
    fn test_is_known() {
        assert!(OP_ADD.is_known());
        assert!(HEAD_REDUCE.is_known());
        assert!(!OpName::intern("bespoke_operator").is_known());
    }

    #[test]
    fn test_indexed_names() {
        let divmod = OpName::intern("divmod");
        let q = divmod.indexed(0);
        let r = divmod.indexed(1);

        assert_eq!(q.as_str(), "divmod#0");
        assert_eq!(r.as_str(), "divmod#1");
        assert_ne!(q, r);
        assert_eq!(q, divmod.indexed(0));
    }

    #[test]
    fn test_display_and_debug() {
        let name = OpName::intern("add");
        assert_eq!(format!("{}", name), "add");
        assert_eq!(format!("{:?}", name), "OpName(add)");
    }

    #[test]
    fn test_known_list_matches_constants() {
        for (idx, s) in KNOWN_NAMES.iter().enumerate() {
            let name = OpName::intern(s);
            assert_eq!(name.as_u32(), idx as u32, "known name {} drifted", s);
        }
    }
}
