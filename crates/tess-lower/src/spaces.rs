//! Iteration-space partitioning.
//!
//! For each critical subtree, produce disjoint, fusion-free subspaces of
//! the root's index space: within one subspace, every fusion encountered on
//! the way down selects exactly one input, so a kernel never branches on
//! its position. Walking down, `xform` accumulates the affine path from the
//! root's index space into the current node's, and `relevant` tracks the
//! portion of the current node's space the subtree contributes to.
//!
//! Fusions below reductions never show up here — the selector materializes
//! them, because a split along a reduced axis cannot be a partition of the
//! root's space.

use crate::select::Selection;
use tess_ir::{subdivide, AffineMap, Graph, NodeId, NodeKind, Shape};

/// The disjoint subspaces covering `root`'s shape, in partition order.
pub fn iteration_spaces(graph: &Graph, selection: &Selection, root: NodeId) -> Vec<Shape> {
    let shape = graph.node(root).shape.clone();
    let identity = AffineMap::identity(shape.rank());
    match subtree_spaces(graph, selection, root, root, &shape, &identity) {
        // No fusion anywhere below: the whole space is one kernel.
        None => vec![shape],
        Some(spaces) => spaces,
    }
}

/// `None` means "no fusion below this node — the caller decides".
fn subtree_spaces(
    graph: &Graph,
    selection: &Selection,
    root: NodeId,
    node: NodeId,
    relevant: &Shape,
    xform: &AffineMap,
) -> Option<Vec<Shape>> {
    if node != root && selection.is_critical(node) {
        return None;
    }

    match &graph.node(node).kind {
        NodeKind::Immediate(_) => None,

        NodeKind::Fuse { inputs } => {
            let mut spaces = Vec::new();
            for &input in inputs {
                let Some(intersection) = graph.node(input).shape.intersect(relevant) else {
                    continue;
                };
                match subtree_spaces(graph, selection, root, input, &intersection, xform) {
                    // Fusion boundary with nothing fusing below it: this
                    // input contributes one subspace.
                    None => spaces.push(xform.inverse_image(&intersection)),
                    Some(sub) => spaces.extend(sub),
                }
            }
            Some(spaces)
        }

        NodeKind::Reshape { map, input } => {
            let image = map.apply(relevant);
            let narrowed = image
                .intersect(&graph.node(*input).shape)
                .expect("reshape image escapes its input");
            subtree_spaces(graph, selection, root, *input, &narrowed, &map.compose(xform))
        }

        NodeKind::Reduction { input, .. } => {
            // The selector materialized every fusion under this node, so
            // nothing below can partition the root's space.
            debug_assert!(
                !has_unmaterialized_fuse(graph, selection, *input),
                "fuse under a reduction escaped materialization"
            );
            None
        }

        NodeKind::Map { inputs, .. } | NodeKind::MultiValueMap { inputs, .. } => {
            partition_inputs(graph, selection, root, inputs, relevant, xform)
        }

        NodeKind::MultiValueRef { input, .. } => {
            subtree_spaces(graph, selection, root, *input, relevant, xform)
        }
    }
}

/// The map case: concatenate the fusing inputs' subspaces, subdividing
/// when several inputs fuse so every boundary of every input is respected.
fn partition_inputs(
    graph: &Graph,
    selection: &Selection,
    root: NodeId,
    inputs: &[NodeId],
    relevant: &Shape,
    xform: &AffineMap,
) -> Option<Vec<Shape>> {
    let mut fusing: Vec<Vec<Shape>> = Vec::new();
    for &input in inputs {
        if let Some(spaces) = subtree_spaces(graph, selection, root, input, relevant, xform) {
            fusing.push(spaces);
        }
    }
    match fusing.len() {
        0 => None,
        1 => fusing.pop(),
        _ => {
            let all: Vec<Shape> = fusing.into_iter().flatten().collect();
            Some(subdivide(&all))
        }
    }
}

fn has_unmaterialized_fuse(graph: &Graph, selection: &Selection, node: NodeId) -> bool {
    if selection.is_critical(node) {
        return false;
    }
    if matches!(graph.node(node).kind, NodeKind::Fuse { .. }) {
        return true;
    }
    graph
        .node(node)
        .inputs()
        .iter()
        .any(|&input| has_unmaterialized_fuse(graph, selection, input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::critical_nodes;
    use tess_ir::{NType, Range};
    use tess_util::opname::{OP_ADD, OP_NEG};

    fn spaces_of(graph: &Graph, roots: &[NodeId], target: NodeId) -> Vec<Shape> {
        let mut imms = graph.immediates().clone();
        let selection = critical_nodes(graph, roots, &mut imms);
        iteration_spaces(graph, &selection, target)
    }

    #[test]
    fn test_no_fusion_single_space() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 3)]), NType::F64);
        let b = g.immediate(Shape::new(vec![Range::till(0, 3)]), NType::F64);
        let m = g.map(OP_ADD, &[a, b]).unwrap();

        assert_eq!(spaces_of(&g, &[m], m), vec![Shape::new(vec![Range::till(0, 3)])]);
    }

    #[test]
    fn test_fuse_splits_space() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::F64);
        let b = g.immediate(Shape::new(vec![Range::till(4, 8)]), NType::F64);
        let f = g.fuse(&[a, b]).unwrap();
        let m = g.map(OP_NEG, &[f]).unwrap();

        assert_eq!(
            spaces_of(&g, &[m], m),
            vec![
                Shape::new(vec![Range::till(0, 4)]),
                Shape::new(vec![Range::till(4, 8)]),
            ]
        );
    }

    #[test]
    fn test_partition_covers_and_is_disjoint() {
        let mut g = Graph::new();
        // Two fusions with different break points feed one map.
        let a1 = g.immediate(Shape::new(vec![Range::till(0, 3)]), NType::F64);
        let a2 = g.immediate(Shape::new(vec![Range::till(3, 8)]), NType::F64);
        let b1 = g.immediate(Shape::new(vec![Range::till(0, 5)]), NType::F64);
        let b2 = g.immediate(Shape::new(vec![Range::till(5, 8)]), NType::F64);
        let fa = g.fuse(&[a1, a2]).unwrap();
        let fb = g.fuse(&[b1, b2]).unwrap();
        let m = g.map(OP_ADD, &[fa, fb]).unwrap();

        let spaces = spaces_of(&g, &[m], m);
        // Breaks at 3 and 5 overlay into three cells.
        assert_eq!(spaces.len(), 3);
        let total: i64 = spaces.iter().map(Shape::size).sum();
        assert_eq!(total, 8);
        for i in 0..spaces.len() {
            for j in (i + 1)..spaces.len() {
                assert_eq!(spaces[i].intersect(&spaces[j]), None);
            }
        }
    }

    #[test]
    fn test_fuse_through_reshape_maps_back() {
        use tess_ir::AffineMap;

        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(10, 14)]), NType::F64);
        let b = g.immediate(Shape::new(vec![Range::till(14, 18)]), NType::F64);
        let f = g.fuse(&[a, b]).unwrap();
        // View the fusion through a shift: root space 0..8 reads 10..18.
        let shifted = g
            .reshape(Shape::new(vec![Range::till(0, 8)]), AffineMap::translation(&[10]), f)
            .unwrap();
        let m = g.map(OP_NEG, &[shifted]).unwrap();

        // The fusion's break at 14 maps back to 4 in root coordinates.
        assert_eq!(
            spaces_of(&g, &[m], m),
            vec![
                Shape::new(vec![Range::till(0, 4)]),
                Shape::new(vec![Range::till(4, 8)]),
            ]
        );
    }

    #[test]
    fn test_critical_fuse_is_opaque() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::F64);
        let b = g.immediate(Shape::new(vec![Range::till(4, 8)]), NType::F64);
        let f = g.fuse(&[a, b]).unwrap();
        // Two consumers: f becomes critical and is read as one source.
        let m = g.map(OP_ADD, &[f, f]).unwrap();

        assert_eq!(spaces_of(&g, &[m], m), vec![Shape::new(vec![Range::till(0, 8)])]);
    }

    #[test]
    fn test_reduction_below_yields_single_space() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4), Range::till(0, 3)]), NType::F64);
        let r = g.reduction(OP_ADD, a).unwrap();

        assert_eq!(spaces_of(&g, &[r], r), vec![Shape::new(vec![Range::till(0, 3)])]);
    }

    #[test]
    fn test_interleaved_fuse_partition() {
        let mut g = Graph::new();
        let evens = g.immediate(Shape::new(vec![Range::new(0, 2, 8)]), NType::F64);
        let odds = g.immediate(Shape::new(vec![Range::new(1, 2, 9)]), NType::F64);
        let f = g.fuse(&[evens, odds]).unwrap();
        let m = g.map(OP_NEG, &[f]).unwrap();

        let spaces = spaces_of(&g, &[m], m);
        assert_eq!(
            spaces,
            vec![
                Shape::new(vec![Range::new(0, 2, 8)]),
                Shape::new(vec![Range::new(1, 2, 9)]),
            ]
        );
    }
}
