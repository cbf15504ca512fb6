//! Blueprint terms: the hash-consed kernel description.
//!
//! A blueprint is a term over a small grammar, interned in the process-wide
//! pool so equality is identity:
//!
//! | head         | fields                                  |
//! |--------------|-----------------------------------------|
//! | `blueprint`  | range-info, storage-info, expression    |
//! | `for`        | axis, body                              |
//! | `store`      | reference, expression                   |
//! | `ref`        | storage-id, index triples               |
//! | `call`       | operator, arguments                     |
//! | `reduce`     | axis, operator, body                    |
//! | `accumulate` | axis, operator, initial, body           |
//!
//! Range-info quantizes every swept size to its power-of-two bracket while
//! preserving steps, so kernels that differ only in extent share generated
//! code without losing step specialization. Storage-info lists element
//! types, target first. Index triples `(axis, multiplier, offset)` map
//! loop counters to storage positions; the k-th triple of a reference
//! belongs to the k-th storage axis of the referenced immediate. Empty
//! sub-lists (a rank-0 reference, a rank-0 range-info) are the `nil`
//! marker atom.
//!
//! The builder at the bottom emits one blueprint per kernel by recursive
//! descent from the target node, composing affine maps on the way down and
//! converting them to storage coordinates at the leaves.

use crate::collect::Collected;
use crate::select::Selection;
use tess_ir::{AffineMap, AxisMap, Graph, NType, NodeId, NodeKind, Shape};
use tess_util::opname::{
    HEAD_ACCUMULATE, HEAD_BLUEPRINT, HEAD_CALL, HEAD_FOR, HEAD_REDUCE, HEAD_REF, HEAD_STORE,
    SYM_NIL,
};
use tess_util::{Atom, OpName, TermPool, UTerm};

// ==================== TERM CONSTRUCTORS ====================

/// A `ref` term: a linear index into storage `storage_id`.
///
/// Triple `k` maps loop counters to the k-th storage axis of the
/// referenced immediate: `position = multiplier * counter[axis] + offset`.
pub fn reference(pool: &TermPool, storage_id: u32, triples: &[(usize, i64, i64)]) -> UTerm {
    let triple_atoms: Vec<Atom> = triples
        .iter()
        .map(|&(axis, multiplier, offset)| {
            let t = pool.list(&[
                Atom::Int(axis as i64),
                Atom::Int(multiplier),
                Atom::Int(offset),
            ]);
            Atom::Term(t.expect("triple list is nonempty"))
        })
        .collect();
    let triples_atom = sublist(pool, &triple_atoms);
    pool.list(&[Atom::Op(HEAD_REF), Atom::Int(storage_id as i64), triples_atom])
        .expect("ref term is nonempty")
}

/// A `call` term: apply `op` to the argument expressions.
pub fn call(pool: &TermPool, op: OpName, args: &[UTerm]) -> UTerm {
    let mut atoms = vec![Atom::Op(HEAD_CALL), Atom::Op(op)];
    atoms.extend(args.iter().map(|&arg| Atom::Term(arg)));
    pool.list(&atoms).expect("call term is nonempty")
}

/// A `store` term: write `value` through `reference`.
pub fn store(pool: &TermPool, reference: UTerm, value: UTerm) -> UTerm {
    pool.list(&[Atom::Op(HEAD_STORE), Atom::Term(reference), Atom::Term(value)])
        .expect("store term is nonempty")
}

/// A `for` term: loop over storage axis `axis`.
pub fn for_loop(pool: &TermPool, axis: usize, body: UTerm) -> UTerm {
    pool.list(&[Atom::Op(HEAD_FOR), Atom::Int(axis as i64), Atom::Term(body)])
        .expect("for term is nonempty")
}

/// A `reduce` term: reduce `body` over storage axis `axis` with `op`.
pub fn reduce(pool: &TermPool, axis: usize, op: OpName, body: UTerm) -> UTerm {
    pool.list(&[Atom::Op(HEAD_REDUCE), Atom::Int(axis as i64), Atom::Op(op), Atom::Term(body)])
        .expect("reduce term is nonempty")
}

/// An `accumulate` term: fold `body` over axis `axis` with `op`, starting
/// from `initial`. Emitted by backends that lower reductions to explicit
/// folds with an identity element.
pub fn accumulate(pool: &TermPool, axis: usize, op: OpName, initial: Atom, body: UTerm) -> UTerm {
    pool.list(&[
        Atom::Op(HEAD_ACCUMULATE),
        Atom::Int(axis as i64),
        Atom::Op(op),
        initial,
        Atom::Term(body),
    ])
    .expect("accumulate term is nonempty")
}

/// The range-info header: one `(2^⌊log₂ size⌋, 2^⌈log₂ size⌉, step)`
/// triple per swept range.
pub fn range_info(pool: &TermPool, ranges: &[tess_ir::Range]) -> Atom {
    let triple_atoms: Vec<Atom> = ranges
        .iter()
        .map(|range| {
            let (lo, hi) = size_bracket(range.size());
            let t = pool.list(&[Atom::Int(lo), Atom::Int(hi), Atom::Int(range.step())]);
            Atom::Term(t.expect("triple list is nonempty"))
        })
        .collect();
    sublist(pool, &triple_atoms)
}

/// The storage-info header: element types, target first.
pub fn storage_info(pool: &TermPool, target: NType, sources: &[NType]) -> Atom {
    let mut atoms = vec![Atom::Op(target.opname())];
    atoms.extend(sources.iter().map(|ntype| Atom::Op(ntype.opname())));
    sublist(pool, &atoms)
}

/// A `blueprint` term from its three parts.
pub fn blueprint(pool: &TermPool, range_info: Atom, storage_info: Atom, body: UTerm) -> UTerm {
    pool.list(&[Atom::Op(HEAD_BLUEPRINT), range_info, storage_info, Atom::Term(body)])
        .expect("blueprint term is nonempty")
}

/// An interned sub-list, or the `nil` marker when empty.
fn sublist(pool: &TermPool, atoms: &[Atom]) -> Atom {
    match pool.list(atoms) {
        Some(term) => Atom::Term(term),
        None => Atom::Op(SYM_NIL),
    }
}

/// The power-of-two bracket `(2^⌊log₂ n⌋, 2^⌈log₂ n⌉)` of a size.
fn size_bracket(n: i64) -> (i64, i64) {
    debug_assert!(n >= 1);
    let floor = 1i64 << (63 - n.leading_zeros());
    let ceil = if floor == n { floor } else { floor << 1 };
    (floor, ceil)
}

/// Count occurrences of terms headed by `head` anywhere inside `term`.
///
/// Handy for backends and tests: `count_heads(pool, bp, HEAD_REDUCE)` is
/// the reduction depth of a kernel.
pub fn count_heads(pool: &TermPool, term: UTerm, head: OpName) -> usize {
    let mut count = 0;
    let mut first = true;
    for atom in pool.atoms(Some(term)) {
        match atom {
            Atom::Op(op) if first && op == head => count += 1,
            Atom::Term(sub) => count += count_heads(pool, sub, head),
            _ => {}
        }
        first = false;
    }
    count
}

// ==================== BUILDER ====================

/// Build the blueprint for the kernel of `root` over `space`.
///
/// Loop counters are kernel-relative: counter `a` runs `0..ranges[a].size()`.
/// The target store is always the identity reference; source references
/// absorb every absolute offset, so translated kernels intern to the same
/// handle.
pub fn build(
    pool: &TermPool,
    graph: &Graph,
    selection: &Selection,
    root: NodeId,
    space: &Shape,
    collected: &Collected,
) -> UTerm {
    let target = graph.node(root);
    let rank = target.shape.rank();

    // Loop counters → root index space: counter a sweeps the subspace
    // range of axis a.
    let rows: Vec<AxisMap> = space
        .ranges()
        .iter()
        .enumerate()
        .map(|(axis, r)| AxisMap::Linear { input: axis, scale: r.step(), offset: r.start() })
        .collect();
    let xform = AffineMap::new(rank, rows);

    let mut builder = Builder { pool, graph, selection, root, collected, next_axis: rank };
    let body = builder.descend(root, space.clone(), xform);

    let identity: Vec<(usize, i64, i64)> = (0..rank).map(|axis| (axis, 1, 0)).collect();
    let mut term = store(pool, reference(pool, 0, &identity), body);
    for axis in (0..rank).rev() {
        term = for_loop(pool, axis, term);
    }

    let source_types: Vec<NType> =
        collected.sources.iter().map(|&imm| graph.imm(imm).ntype).collect();
    blueprint(
        pool,
        range_info(pool, &collected.ranges),
        storage_info(pool, target.ntype, &source_types),
        term,
    )
}

struct Builder<'a> {
    pool: &'a TermPool,
    graph: &'a Graph,
    selection: &'a Selection,
    root: NodeId,
    collected: &'a Collected,
    /// Next loop axis to hand to a reduction; starts past the target's
    /// axes and advances in collection order.
    next_axis: usize,
}

impl Builder<'_> {
    /// Emit the expression for `node`. `xform` maps loop counters into the
    /// node's index space; `relevant` is the swept portion of that space.
    fn descend(&mut self, node: NodeId, relevant: Shape, xform: AffineMap) -> UTerm {
        if node != self.root {
            if let Some(imm) = self.selection.imm_of(node) {
                return self.source_reference(imm, &xform);
            }
        }

        match &self.graph.node(node).kind {
            NodeKind::Immediate(_) => unreachable!("immediates are materialization boundaries"),

            NodeKind::Map { op, inputs } => {
                let (op, inputs) = (*op, inputs.clone());
                let args: Vec<UTerm> = inputs
                    .iter()
                    .map(|&input| self.descend(input, relevant.clone(), xform.clone()))
                    .collect();
                call(self.pool, op, &args)
            }

            NodeKind::MultiValueMap { op, inputs, .. } => {
                // Only reachable as a kernel root; lowers like a map.
                let (op, inputs) = (*op, inputs.clone());
                let args: Vec<UTerm> = inputs
                    .iter()
                    .map(|&input| self.descend(input, relevant.clone(), xform.clone()))
                    .collect();
                call(self.pool, op, &args)
            }

            NodeKind::MultiValueRef { value, input } => {
                let (value, input) = (*value, *input);
                let NodeKind::MultiValueMap { op, inputs, .. } = &self.graph.node(input).kind
                else {
                    unreachable!("multi-value ref over a single-valued node")
                };
                let (op, inputs) = (*op, inputs.clone());
                let args: Vec<UTerm> = inputs
                    .iter()
                    .map(|&i| self.descend(i, relevant.clone(), xform.clone()))
                    .collect();
                call(self.pool, op.indexed(value), &args)
            }

            NodeKind::Reshape { map, input } => {
                let input = *input;
                let narrowed = map.apply(&relevant);
                let composed = map.compose(&xform);
                self.descend(input, narrowed, composed)
            }

            NodeKind::Fuse { inputs } => {
                let picked = *inputs
                    .iter()
                    .find(|&&input| self.graph.node(input).shape.contains_shape(&relevant))
                    .expect("iteration space crosses a fuse boundary");
                self.descend(picked, relevant, xform)
            }

            NodeKind::Reduction { op, input } => {
                let (op, input) = (*op, *input);
                let axis = self.next_axis;
                self.next_axis += 1;

                let reduced = self.graph.node(input).shape.axis(0);
                // Lift: the new counter feeds the input's leading axis,
                // existing rows shift down one output position.
                let mut rows = vec![AxisMap::Linear {
                    input: axis,
                    scale: reduced.step(),
                    offset: reduced.start(),
                }];
                rows.extend(xform.rows().iter().cloned());
                let lifted = AffineMap::new(xform.input_rank().max(axis + 1), rows);

                let mut extended = vec![reduced];
                extended.extend(relevant.ranges().iter().copied());

                let body = self.descend(input, Shape::new(extended), lifted);
                reduce(self.pool, axis, op, body)
            }
        }
    }

    /// A reference to a source immediate: its position in the source list
    /// (plus one, the target is storage 0) and one index triple per
    /// storage axis.
    fn source_reference(&self, imm: tess_ir::ImmId, xform: &AffineMap) -> UTerm {
        let storage_id = self
            .collected
            .sources
            .iter()
            .position(|&s| s == imm)
            .expect("referenced leaf missing from sources")
            as u32
            + 1;

        let shape = &self.graph.imm(imm).shape;
        debug_assert_eq!(xform.output_rank(), shape.rank());

        let triples: Vec<(usize, i64, i64)> = xform
            .rows()
            .iter()
            .zip(shape.ranges())
            .map(|(row, axis_range)| match *row {
                AxisMap::Constant(c) => {
                    let offset = c - axis_range.start();
                    debug_assert_eq!(offset % axis_range.step(), 0);
                    (0, 0, offset / axis_range.step())
                }
                AxisMap::Linear { input, scale, offset } => {
                    let position = offset - axis_range.start();
                    debug_assert_eq!(position % axis_range.step(), 0);
                    if self.collected.ranges[input].size() == 1 {
                        // A single-iteration counter contributes only its
                        // base position; normalize the multiplier away.
                        (input, 0, position / axis_range.step())
                    } else {
                        debug_assert_eq!(scale % axis_range.step(), 0);
                        (input, scale / axis_range.step(), position / axis_range.step())
                    }
                }
            })
            .collect();

        reference(self.pool, storage_id, &triples)
    }
}
