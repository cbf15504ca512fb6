//! Edge case tests for tess-lower

#[cfg(test)]
mod tests {
    use crate::blueprint::count_heads;
    use crate::lower_with;
    use tess_ir::{Graph, NType, Range, Shape};
    use tess_util::opname::{HEAD_FOR, HEAD_REDUCE, HEAD_STORE, OP_ADD, OP_NEG};
    use tess_util::TermPool;

    /// EDGE CASE: Empty roots produce an empty lowering and leave the
    /// pool untouched.
    #[test]
    fn test_edge_empty_roots() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::F64);
        let _ = g.map(OP_NEG, &[a]).unwrap();

        let pool = TermPool::new();
        let before = pool.node_count();
        let lowering = lower_with(&g, &[], &pool);

        assert!(lowering.roots.is_empty());
        assert!(lowering.targets.is_empty());
        assert!(lowering.immediates.is_empty());
        assert_eq!(pool.node_count(), before);
    }

    /// EDGE CASE: An immediate root needs no kernels; its immediate is
    /// passed straight through.
    #[test]
    fn test_edge_immediate_root() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::F64);

        let pool = TermPool::new();
        let lowering = lower_with(&g, &[a], &pool);

        assert_eq!(lowering.roots.len(), 1);
        assert!(lowering.targets.is_empty());
        assert_eq!(lowering.immediates.len(), 1);
        assert_eq!(pool.node_count(), 0);
    }

    /// EDGE CASE: A single-element iteration space still gets its loop.
    #[test]
    fn test_edge_single_element_space() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::single(5)]), NType::F64);
        let m = g.map(OP_NEG, &[a]).unwrap();

        let pool = TermPool::new();
        let lowering = lower_with(&g, &[m], &pool);

        let kernel = &lowering.targets[0].kernels[0];
        assert_eq!(kernel.ranges, vec![Range::till(0, 1)]);
        assert_eq!(count_heads(&pool, kernel.blueprint, HEAD_FOR), 1);
    }

    /// EDGE CASE: A rank-0 target (a full reduction to a scalar) has no
    /// loops, only reductions around the store's value.
    #[test]
    fn test_edge_scalar_target() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4), Range::till(0, 3)]), NType::F64);
        let r1 = g.reduction(OP_ADD, a).unwrap();
        let r0 = g.reduction(OP_ADD, r1).unwrap();

        let pool = TermPool::new();
        let lowering = lower_with(&g, &[r0], &pool);

        let kernel = &lowering.targets[0].kernels[0];
        // No storage axes; two reduction axes in encounter order.
        assert_eq!(kernel.ranges, vec![Range::till(0, 3), Range::till(0, 4)]);
        assert_eq!(count_heads(&pool, kernel.blueprint, HEAD_FOR), 0);
        assert_eq!(count_heads(&pool, kernel.blueprint, HEAD_REDUCE), 2);
        assert_eq!(count_heads(&pool, kernel.blueprint, HEAD_STORE), 1);
    }

    /// EDGE CASE: A range immediate is an ordinary source.
    #[test]
    fn test_edge_range_immediate_source() {
        let mut g = Graph::new();
        let iota = g.range_immediate(Range::till(0, 8));
        let m = g.map(OP_NEG, &[iota]).unwrap();

        let pool = TermPool::new();
        let lowering = lower_with(&g, &[m], &pool);

        let kernel = &lowering.targets[0].kernels[0];
        assert_eq!(kernel.sources.len(), 1);
        assert_eq!(lowering.immediates[kernel.sources[0]].ntype, NType::I64);
    }

    /// EDGE CASE: Multi-valued operators lower to indexed operator names.
    #[test]
    fn test_edge_multi_value_lowering() {
        let mut g = Graph::new();
        let a = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::I64);
        let b = g.immediate(Shape::new(vec![Range::till(0, 4)]), NType::I64);
        let divmod = tess_util::OpName::intern("divmod");
        let mv = g.multi_value_map(divmod, 2, &[a, b]).unwrap();
        let q = g.multi_value_ref(0, mv).unwrap();
        let r = g.multi_value_ref(1, mv).unwrap();
        let root = g.map(OP_ADD, &[q, r]).unwrap();

        let pool = TermPool::new();
        let lowering = lower_with(&g, &[root], &pool);

        let kernel = &lowering.targets[0].kernels[0];
        assert_eq!(kernel.sources.len(), 2);

        let rendered = pool.render(Some(kernel.blueprint));
        assert!(rendered.contains("divmod#0"), "{}", rendered);
        assert!(rendered.contains("divmod#1"), "{}", rendered);
    }

    /// EDGE CASE: A kernel over a stepped subspace keeps the step in its
    /// storage ranges.
    #[test]
    fn test_edge_interleaved_fuse_storage_ranges() {
        let mut g = Graph::new();
        let evens = g.immediate(Shape::new(vec![Range::new(0, 2, 8)]), NType::F64);
        let odds = g.immediate(Shape::new(vec![Range::new(1, 2, 9)]), NType::F64);
        let f = g.fuse(&[evens, odds]).unwrap();
        let m = g.map(OP_NEG, &[f]).unwrap();

        let pool = TermPool::new();
        let lowering = lower_with(&g, &[m], &pool);

        let kernels = &lowering.targets[0].kernels;
        assert_eq!(kernels.len(), 2);
        // Target storage is dense 0..8; the kernels sweep its even and
        // odd positions.
        assert_eq!(kernels[0].ranges, vec![Range::new(0, 2, 8)]);
        assert_eq!(kernels[1].ranges, vec![Range::new(1, 2, 9)]);
    }
}
