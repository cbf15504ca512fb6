//! Numeric type descriptors.
//!
//! An [`NType`] names the element type of an array. The lowering pass only
//! needs them for two things: labeling the storage of kernels (blueprints
//! embed the element types of target and sources) and inferring the result
//! type of operator applications. Inference is best-effort: when no
//! specialized path exists the computation falls back to [`NType::Generic`]
//! and the backend dispatches at run time.

use tess_util::{opname, OpName};
use thiserror::Error;

/// Raised when no specialized result type exists for an operator
/// application. Callers recover by falling back to [`NType::Generic`]; the
/// abort never escapes the type-inference layer.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no specialized path for operator application")]
pub struct SpecializationAbort;

/// A numeric type descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum NType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    /// 64-bit float, the default for numeric work.
    #[default]
    F64,
    /// The union of all element types; operations dispatch at run time.
    Generic,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Class {
    Unsigned,
    Signed,
    Float,
    Generic,
}

impl NType {
    fn class(self) -> (Class, u32) {
        match self {
            NType::U8 => (Class::Unsigned, 8),
            NType::U16 => (Class::Unsigned, 16),
            NType::U32 => (Class::Unsigned, 32),
            NType::U64 => (Class::Unsigned, 64),
            NType::I8 => (Class::Signed, 8),
            NType::I16 => (Class::Signed, 16),
            NType::I32 => (Class::Signed, 32),
            NType::I64 => (Class::Signed, 64),
            NType::F32 => (Class::Float, 32),
            NType::F64 => (Class::Float, 64),
            NType::Generic => (Class::Generic, 0),
        }
    }

    fn unsigned(bits: u32) -> NType {
        match bits {
            8 => NType::U8,
            16 => NType::U16,
            32 => NType::U32,
            _ => NType::U64,
        }
    }

    fn signed(bits: u32) -> NType {
        match bits {
            8 => NType::I8,
            16 => NType::I16,
            32 => NType::I32,
            _ => NType::I64,
        }
    }

    /// True for the floating-point descriptors.
    pub fn is_float(self) -> bool {
        self.class().0 == Class::Float
    }

    /// True for the integer descriptors, signed or not.
    pub fn is_integer(self) -> bool {
        matches!(self.class().0, Class::Signed | Class::Unsigned)
    }

    /// Element size in bytes; `None` for [`NType::Generic`].
    pub fn bytes(self) -> Option<usize> {
        match self.class() {
            (Class::Generic, _) => None,
            (_, bits) => Some(bits as usize / 8),
        }
    }

    /// Least upper bound of two descriptors in the promotion lattice.
    ///
    /// Widths widen, integers joined with floats promote to a float wide
    /// enough, and joins with no exact home (such as `u64 ⊔ i64`) land on
    /// [`NType::Generic`].
    pub fn union(self, other: NType) -> NType {
        if self == other {
            return self;
        }
        let (ca, ba) = self.class();
        let (cb, bb) = other.class();
        match (ca, cb) {
            (Class::Generic, _) | (_, Class::Generic) => NType::Generic,
            (Class::Float, Class::Float) => NType::float_of(ba.max(bb)),
            (Class::Float, _) => NType::float_holding(ba, bb),
            (_, Class::Float) => NType::float_holding(bb, ba),
            (Class::Unsigned, Class::Unsigned) => NType::unsigned(ba.max(bb)),
            (Class::Signed, Class::Signed) => NType::signed(ba.max(bb)),
            (Class::Signed, Class::Unsigned) => NType::mixed_int(ba, bb),
            (Class::Unsigned, Class::Signed) => NType::mixed_int(bb, ba),
        }
    }

    fn float_of(bits: u32) -> NType {
        if bits <= 32 {
            NType::F32
        } else {
            NType::F64
        }
    }

    /// A float wide enough to hold both a `float_bits` float and an
    /// `int_bits` integer.
    fn float_holding(float_bits: u32, int_bits: u32) -> NType {
        if float_bits <= 32 && int_bits <= 16 {
            NType::F32
        } else {
            NType::F64
        }
    }

    /// Join of a signed type of `signed_bits` with an unsigned type of
    /// `unsigned_bits`.
    fn mixed_int(signed_bits: u32, unsigned_bits: u32) -> NType {
        if signed_bits > unsigned_bits {
            NType::signed(signed_bits)
        } else if unsigned_bits < 64 {
            NType::signed(unsigned_bits * 2)
        } else {
            NType::Generic
        }
    }

    /// The interned name used when the descriptor appears in a blueprint.
    pub fn opname(self) -> OpName {
        match self {
            NType::U8 => opname::TY_U8,
            NType::U16 => opname::TY_U16,
            NType::U32 => opname::TY_U32,
            NType::U64 => opname::TY_U64,
            NType::I8 => opname::TY_I8,
            NType::I16 => opname::TY_I16,
            NType::I32 => opname::TY_I32,
            NType::I64 => opname::TY_I64,
            NType::F32 => opname::TY_F32,
            NType::F64 => opname::TY_F64,
            NType::Generic => opname::TY_GENERIC,
        }
    }
}

impl std::fmt::Display for NType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.opname())
    }
}

/// Select the specialized result type of applying `op` to `inputs`.
///
/// Comparisons produce `u8` masks; arithmetic joins its inputs; `neg`
/// promotes unsigned inputs into a signed home. An operator outside the
/// known set, or a join with no specialized home, aborts — callers catch
/// the abort and recover with [`NType::Generic`].
pub fn specialize(op: OpName, inputs: &[NType]) -> Result<NType, SpecializationAbort> {
    if inputs.is_empty() {
        return Err(SpecializationAbort);
    }
    let join = inputs.iter().copied().reduce(NType::union).unwrap();

    if op == opname::OP_EQ
        || op == opname::OP_NE
        || op == opname::OP_LT
        || op == opname::OP_LE
        || op == opname::OP_GT
        || op == opname::OP_GE
    {
        return Ok(NType::U8);
    }

    if op == opname::OP_NEG {
        let (class, bits) = join.class();
        return match class {
            Class::Unsigned if bits < 64 => Ok(NType::signed(bits * 2)),
            Class::Unsigned => Err(SpecializationAbort),
            Class::Generic => Err(SpecializationAbort),
            _ => Ok(join),
        };
    }

    if op == opname::OP_ADD
        || op == opname::OP_SUB
        || op == opname::OP_MUL
        || op == opname::OP_DIV
        || op == opname::OP_REM
        || op == opname::OP_ABS
        || op == opname::OP_MAX
        || op == opname::OP_MIN
    {
        return if join == NType::Generic { Err(SpecializationAbort) } else { Ok(join) };
    }

    Err(SpecializationAbort)
}
