//! Edge case tests for tess-ir

#[cfg(test)]
mod tests {
    use crate::ntype::NType;
    use crate::shape::{rectangular_union, subdivide, Range, Shape};
    use crate::xform::{AffineMap, AxisMap};
    use crate::Graph;
    use tess_util::opname::OP_ADD;

    // ==================== RANGE EDGE CASES ====================

    /// EDGE CASE: A single-element range behaves like a point.
    #[test]
    fn test_edge_single_element_range() {
        let r = Range::single(7);
        assert_eq!(r.size(), 1);
        assert_eq!(r.start(), 7);
        assert_eq!(r.last(), 7);
        assert!(r.contains(7));
        assert!(!r.contains(8));
    }

    /// EDGE CASE: Intersecting a range with itself is the identity.
    #[test]
    fn test_edge_self_intersection() {
        let r = Range::new(3, 5, 40);
        assert_eq!(r.intersect(&r), Some(r));
    }

    /// EDGE CASE: Two single-element ranges intersect iff equal.
    #[test]
    fn test_edge_point_intersection() {
        let a = Range::single(3);
        assert_eq!(a.intersect(&Range::single(3)), Some(a));
        assert_eq!(a.intersect(&Range::single(4)), None);
    }

    /// EDGE CASE: Huge offsets do not overflow the lattice arithmetic.
    #[test]
    fn test_edge_large_offsets() {
        let base = 1 << 40;
        let a = Range::with_size(base, 3, 100);
        let b = Range::with_size(base + 3, 6, 50);
        let got = a.intersect(&b).unwrap();
        assert_eq!(got.start(), base + 3);
        assert_eq!(got.step(), 6);
    }

    // ==================== SHAPE EDGE CASES ====================

    /// EDGE CASE: Rank-0 shapes intersect to rank 0.
    #[test]
    fn test_edge_scalar_intersection() {
        assert_eq!(Shape::scalar().intersect(&Shape::scalar()), Some(Shape::scalar()));
        assert!(Shape::scalar().contains_shape(&Shape::scalar()));
    }

    /// EDGE CASE: A union of one shape is that shape.
    #[test]
    fn test_edge_union_of_one() {
        let s = Shape::new(vec![Range::till(2, 9)]);
        assert_eq!(rectangular_union(std::slice::from_ref(&s)), Some(s));
    }

    /// EDGE CASE: Subdividing disjoint shapes leaves them untouched.
    #[test]
    fn test_edge_subdivide_disjoint() {
        let a = Shape::new(vec![Range::till(0, 4)]);
        let b = Shape::new(vec![Range::till(4, 8)]);
        assert_eq!(subdivide(&[a.clone(), b.clone()]), vec![a, b]);
    }

    /// EDGE CASE: Interleaved lattices survive subdivision with their
    /// steps intact.
    #[test]
    fn test_edge_subdivide_interleaved() {
        let evens = Shape::new(vec![Range::new(0, 2, 8)]);
        let all = Shape::new(vec![Range::till(0, 8)]);
        let cells = subdivide(&[evens.clone(), all.clone()]);

        // Both shapes span the same interval, so no break point splits
        // them; each survives as its own cell.
        assert!(cells.contains(&evens));
        assert!(cells.contains(&all));
    }

    // ==================== TRANSFORMATION EDGE CASES ====================

    /// EDGE CASE: The rank-0 identity is a valid map.
    #[test]
    fn test_edge_rank0_identity() {
        let id = AffineMap::identity(0);
        assert!(id.is_injective());
        assert_eq!(id.apply(&Shape::scalar()), Shape::scalar());
    }

    /// EDGE CASE: A map onto a single point still inverts on its image.
    #[test]
    fn test_edge_single_point_inverse() {
        let m = AffineMap::new(1, vec![AxisMap::Linear { input: 0, scale: 4, offset: 2 }]);
        let image = Shape::new(vec![Range::single(10)]);
        assert_eq!(m.inverse_image(&image), Shape::new(vec![Range::single(2)]));
    }

    /// EDGE CASE: Collapsing a rank-1 space to rank 0 is not injective.
    #[test]
    fn test_edge_rank_collapse_not_injective() {
        let m = AffineMap::new(1, vec![]);
        assert!(!m.is_injective());
    }

    // ==================== GRAPH EDGE CASES ====================

    /// EDGE CASE: A map over a single input is accepted.
    #[test]
    fn test_edge_unary_map() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::F64);
        let m = g.map(tess_util::opname::OP_NEG, &[a]).unwrap();
        assert_eq!(g.node(m).shape, g.node(a).shape);
    }

    /// EDGE CASE: A fuse of one input is that input's shape.
    #[test]
    fn test_edge_fuse_of_one() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(3, 7)]), NType::F64);
        let f = g.fuse(&[a]).unwrap();
        assert_eq!(g.node(f).shape, g.node(a).shape);
    }

    /// EDGE CASE: Fusing interleaved lattices yields the dense union.
    #[test]
    fn test_edge_fuse_interleaved() {
        let mut g = Graph::new();
        let evens = g.immediate(Shape::new(vec![Range::new(0, 2, 8)]), NType::F64);
        let odds = g.immediate(Shape::new(vec![Range::new(1, 2, 9)]), NType::F64);
        let f = g.fuse(&[evens, odds]).unwrap();
        assert_eq!(g.node(f).shape, Shape::new(vec![Range::till(0, 8)]));
    }

    /// EDGE CASE: Reducing a single-column array yields a scalar node.
    #[test]
    fn test_edge_reduce_to_scalar() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 5)]), NType::F64);
        let r = g.reduction(OP_ADD, a).unwrap();
        assert_eq!(g.node(r).rank(), 0);
        assert_eq!(g.node(r).size(), 1);
    }
}
