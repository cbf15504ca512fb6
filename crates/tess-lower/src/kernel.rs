//! Kernels: the output of the lowering pass.
//!
//! A kernel sweeps a rectangular iteration space of one target immediate
//! and is described by a hash-consed blueprint. The blueprint is written in
//! *kernel-relative storage coordinates*: a loop variable for axis `k`
//! counts `0..ranges[k].size()`, the target reference maps that counter to
//! the swept position directly, and source references map counters to
//! absolute storage positions of the sources. Absolute target positions
//! come from `ranges` at execution time, which is what makes blueprints of
//! translated kernels identical — the cache key never sees absolute
//! offsets.

use tess_ir::{ImmId, Immediate, NodeId, Range};
use tess_util::{IndexVec, UTerm};

/// One executable unit of work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    /// The immediate this kernel fills.
    pub target: ImmId,
    /// Per-axis storage ranges swept by the kernel: the target's axes
    /// first, then one range per reduction in encounter order.
    pub ranges: Vec<Range>,
    /// Referenced immediates, ordered by first reference, without
    /// duplicates. Blueprint storage ids are positions here, offset by one
    /// (id 0 is the target).
    pub sources: Vec<ImmId>,
    /// The interned blueprint; equal computations share the handle.
    pub blueprint: UTerm,
}

/// A materialized intermediate and the kernels that fill it.
#[derive(Clone, Debug)]
pub struct Target {
    /// The immediate to allocate and fill.
    pub imm: ImmId,
    /// The DAG node this target materializes.
    pub node: NodeId,
    /// Kernels in partition order; their iteration spaces partition the
    /// target's shape exactly.
    pub kernels: Vec<Kernel>,
}

/// The result of one lowering invocation.
#[derive(Clone, Debug, Default)]
pub struct Lowering {
    /// Every immediate the kernels mention: the input graph's immediates
    /// followed by the fresh targets, in creation order.
    pub immediates: IndexVec<ImmId, Immediate>,
    /// One immediate per root, in root order.
    pub roots: Vec<ImmId>,
    /// Non-immediate critical nodes with their kernels, in selection
    /// order.
    pub targets: Vec<Target>,
}

impl Lowering {
    /// The target entry for a node, if that node was materialized.
    pub fn target_for(&self, node: NodeId) -> Option<&Target> {
        self.targets.iter().find(|t| t.node == node)
    }
}
