//! tess-lower - Lowering Lazy Array DAGs to Kernels
//!
//! The middle-end pass: given a DAG of lazy array nodes and the roots a
//! caller wants materialized, decide which nodes become intermediates,
//! partition each intermediate's index space into fusion-free pieces, and
//! emit one hash-consed blueprint per piece. The output tells a backend
//! exactly what to allocate and run; no numeric work happens here.
//!
//! ```
//! use tess_ir::{Graph, NType, Range, Shape};
//! use tess_lower::lower;
//! use tess_util::opname::OP_ADD;
//!
//! let mut graph = Graph::new();
//! let shape = Shape::new(vec![Range::till(0, 3)]);
//! let a = graph.immediate(shape.clone(), NType::F64);
//! let b = graph.immediate(shape, NType::F64);
//! let sum = graph.map(OP_ADD, &[a, b]).unwrap();
//!
//! let lowering = lower(&graph, &[sum]);
//! assert_eq!(lowering.targets.len(), 1);
//! assert_eq!(lowering.targets[0].kernels.len(), 1);
//! ```

pub mod blueprint;
pub mod collect;
pub mod kernel;
pub mod select;
pub mod spaces;

mod edge_cases;

pub use kernel::{Kernel, Lowering, Target};
pub use select::Selection;

use tess_ir::{Graph, NodeId};
use tess_util::pool::TERM_POOL;
use tess_util::TermPool;
use tracing::{debug, trace};

/// Lower `roots` using the process-wide term pool.
pub fn lower(graph: &Graph, roots: &[NodeId]) -> Lowering {
    lower_with(graph, roots, &TERM_POOL)
}

/// Lower `roots`, interning blueprints in the given pool.
///
/// The pass is synchronous and deterministic: kernel order per target
/// follows the partition order, and equal computations produce identical
/// blueprint handles. An empty `roots` slice yields an empty lowering and
/// leaves the pool untouched.
pub fn lower_with(graph: &Graph, roots: &[NodeId], pool: &TermPool) -> Lowering {
    if roots.is_empty() {
        return Lowering::default();
    }

    let mut immediates = graph.immediates().clone();
    let selection = select::critical_nodes(graph, roots, &mut immediates);
    debug!(targets = selection.order.len(), "selected critical nodes");

    let mut targets = Vec::with_capacity(selection.order.len());
    for &node in &selection.order {
        let imm = selection.imm_of(node).expect("selected nodes are registered");
        let subspaces = spaces::iteration_spaces(graph, &selection, node);

        let mut kernels = Vec::with_capacity(subspaces.len());
        for space in &subspaces {
            let collected = collect::sources_and_ranges(graph, &selection, node, space);
            let bp = blueprint::build(pool, graph, &selection, node, space, &collected);
            trace!(space = %space, sources = collected.sources.len(), "emitted kernel");
            kernels.push(Kernel {
                target: imm,
                ranges: collected.ranges,
                sources: collected.sources,
                blueprint: bp,
            });
        }
        targets.push(Target { imm, node, kernels });
    }

    let root_imms = roots
        .iter()
        .map(|&root| selection.imm_of(root).expect("roots are registered"))
        .collect();

    debug!(kernels = targets.iter().map(|t| t.kernels.len()).sum::<usize>(), "lowering complete");
    Lowering { immediates, roots: root_imms, targets }
}
