//! Per-kernel source and range collection.
//!
//! For one `(root, iteration space)` pair, walk the subtree down to its
//! materialization boundaries, recording every referenced immediate (in
//! first-reference order, deduplicated by identity) and the storage ranges
//! the kernel sweeps: the target's axes first, then one range per
//! reduction in the order the walk encounters them.

use crate::select::Selection;
use indexmap::IndexSet;
use tess_ir::{Graph, ImmId, NodeId, NodeKind, Range, Shape};

/// What one kernel reads and sweeps.
pub struct Collected {
    /// Storage ranges: target axes, then reduction axes.
    pub ranges: Vec<Range>,
    /// Referenced immediates, ordered, duplicate-free.
    pub sources: Vec<ImmId>,
}

/// Collect ranges and sources for the kernel of `root` over `space`.
pub fn sources_and_ranges(
    graph: &Graph,
    selection: &Selection,
    root: NodeId,
    space: &Shape,
) -> Collected {
    // The target's storage ranges for this iteration space: index
    // coordinates collapsed against the target's shape.
    let target_shape = &graph.node(root).shape;
    let mut ranges: Vec<Range> = target_shape
        .ranges()
        .iter()
        .zip(space.ranges())
        .map(|(axis, swept)| collapse(axis, swept))
        .collect();

    let mut sources: IndexSet<ImmId> = IndexSet::new();
    walk(graph, selection, root, root, space.clone(), &mut ranges, &mut sources);

    Collected { ranges, sources: sources.into_iter().collect() }
}

/// The storage-coordinate range of `swept` within `axis`.
fn collapse(axis: &Range, swept: &Range) -> Range {
    debug_assert!(axis.contains_range(swept), "swept range escapes the target axis");
    let base = (swept.start() - axis.start()) / axis.step();
    let step = if swept.size() == 1 { 1 } else { swept.step() / axis.step() };
    Range::with_size(base, step, swept.size())
}

fn walk(
    graph: &Graph,
    selection: &Selection,
    root: NodeId,
    node: NodeId,
    relevant: Shape,
    ranges: &mut Vec<Range>,
    sources: &mut IndexSet<ImmId>,
) {
    if node != root {
        if let Some(imm) = selection.imm_of(node) {
            sources.insert(imm);
            return;
        }
    }

    match &graph.node(node).kind {
        NodeKind::Immediate(imm) => {
            sources.insert(*imm);
        }

        NodeKind::Map { inputs, .. } | NodeKind::MultiValueMap { inputs, .. } => {
            for &input in inputs {
                walk(graph, selection, root, input, relevant.clone(), ranges, sources);
            }
        }

        NodeKind::MultiValueRef { input, .. } => {
            walk(graph, selection, root, *input, relevant, ranges, sources);
        }

        NodeKind::Reshape { map, input } => {
            walk(graph, selection, root, *input, map.apply(&relevant), ranges, sources);
        }

        NodeKind::Fuse { inputs } => {
            let picked = *inputs
                .iter()
                .find(|&&input| graph.node(input).shape.contains_shape(&relevant))
                .expect("iteration space crosses a fuse boundary");
            walk(graph, selection, root, picked, relevant, ranges, sources);
        }

        NodeKind::Reduction { input, .. } => {
            let reduced = graph.node(*input).shape.axis(0);
            ranges.push(reduced);

            let mut extended = vec![reduced];
            extended.extend(relevant.ranges().iter().copied());
            walk(graph, selection, root, *input, Shape::new(extended), ranges, sources);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::critical_nodes;
    use crate::spaces::iteration_spaces;
    use tess_ir::{NType, Shape};
    use tess_util::opname::{OP_ADD, OP_NEG};

    fn lower_one(
        graph: &Graph,
        root: NodeId,
    ) -> (Selection, Vec<Shape>) {
        let mut imms = graph.immediates().clone();
        let selection = critical_nodes(graph, &[root], &mut imms);
        let spaces = iteration_spaces(graph, &selection, root);
        (selection, spaces)
    }

    fn imm_of(graph: &Graph, node: NodeId) -> ImmId {
        match &graph.node(node).kind {
            NodeKind::Immediate(imm) => *imm,
            _ => panic!("not an immediate"),
        }
    }

    #[test]
    fn test_sources_in_reference_order() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 3)]), NType::F64);
        let b = g.immediate(Shape::new(vec![Range::till(0, 3)]), NType::F64);
        let m = g.map(OP_ADD, &[b, a]).unwrap();

        let (sel, spaces) = lower_one(&g, m);
        let collected = sources_and_ranges(&g, &sel, m, &spaces[0]);

        assert_eq!(collected.sources, vec![imm_of(&g, b), imm_of(&g, a)]);
        assert_eq!(collected.ranges, vec![Range::till(0, 3)]);
    }

    #[test]
    fn test_duplicate_sources_collapse() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 3)]), NType::F64);
        let m = g.map(OP_ADD, &[a, a]).unwrap();

        let (sel, spaces) = lower_one(&g, m);
        let collected = sources_and_ranges(&g, &sel, m, &spaces[0]);
        assert_eq!(collected.sources, vec![imm_of(&g, a)]);
    }

    #[test]
    fn test_reduction_extends_ranges() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4), Range::till(0, 3)]), NType::F64);
        let r = g.reduction(OP_ADD, a).unwrap();

        let (sel, spaces) = lower_one(&g, r);
        let collected = sources_and_ranges(&g, &sel, r, &spaces[0]);

        assert_eq!(collected.ranges, vec![Range::till(0, 3), Range::till(0, 4)]);
        assert_eq!(collected.sources, vec![imm_of(&g, a)]);
    }

    #[test]
    fn test_fuse_kernel_reads_one_side() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::F64);
        let b = g.immediate(Shape::new(vec![Range::till(4, 8)]), NType::F64);
        let f = g.fuse(&[a, b]).unwrap();
        let m = g.map(OP_NEG, &[f]).unwrap();

        let (sel, spaces) = lower_one(&g, m);
        assert_eq!(spaces.len(), 2);

        let first = sources_and_ranges(&g, &sel, m, &spaces[0]);
        let second = sources_and_ranges(&g, &sel, m, &spaces[1]);

        assert_eq!(first.sources, vec![imm_of(&g, a)]);
        assert_eq!(second.sources, vec![imm_of(&g, b)]);
        // Storage coordinates of the target: 0..4 and 4..8.
        assert_eq!(first.ranges, vec![Range::till(0, 4)]);
        assert_eq!(second.ranges, vec![Range::till(4, 8)]);
    }

    #[test]
    fn test_critical_interior_node_becomes_source() {
        let mut g = Graph::new();
        let y = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::F64);
        let x = g.map(OP_NEG, &[y]).unwrap();
        let m = g.map(OP_ADD, &[x, x]).unwrap();

        let (sel, spaces) = lower_one(&g, m);
        let collected = sources_and_ranges(&g, &sel, m, &spaces[0]);

        // The outer kernel reads x's fresh immediate, not y.
        assert_eq!(collected.sources, vec![sel.imm_of(x).unwrap()]);
        assert_ne!(collected.sources[0], imm_of(&g, y));
    }
}
