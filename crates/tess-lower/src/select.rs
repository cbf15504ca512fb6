//! Critical-node selection.
//!
//! Decides which DAG nodes get materialized as intermediates. A node is
//! critical when it is an immediate, a root, referenced more than once,
//! the input of a replicating reshape, the reduction-carrying input of a
//! node that would otherwise fuse several reductions, or a fusion sitting
//! under a reduction (fusing across a reduced axis cannot be expressed as
//! a partition of the target's index space, so such fusions are always
//! materialized).
//!
//! Two phases: phase A counts references along the roots-reachable
//! subgraph only, so dead code never inflates a count; phase B registers
//! critical nodes in a deterministic depth-first order, creating one fresh
//! target immediate per critical non-immediate node.

use tess_ir::{Graph, ImmId, ImmKind, Immediate, NodeId, NodeKind};
use tess_util::{FxHashMap, FxHashSet, IndexVec};

/// The selection produced by the two-phase walk.
pub struct Selection {
    /// Critical node → its immediate (existing for immediates, fresh for
    /// everything else).
    table: FxHashMap<NodeId, ImmId>,
    /// Critical non-immediate nodes in registration order.
    pub order: Vec<NodeId>,
}

impl Selection {
    /// True if the node will be materialized.
    pub fn is_critical(&self, node: NodeId) -> bool {
        self.table.contains_key(&node)
    }

    /// The immediate a critical node materializes into.
    pub fn imm_of(&self, node: NodeId) -> Option<ImmId> {
        self.table.get(&node).copied()
    }
}

/// Compute reference counts and select critical nodes.
///
/// Fresh target immediates are appended to `immediates`, which starts as a
/// copy of the graph's arena so ids stay aligned.
pub fn critical_nodes(
    graph: &Graph,
    roots: &[NodeId],
    immediates: &mut IndexVec<ImmId, Immediate>,
) -> Selection {
    let refcount = count_references(graph, roots);

    let mut state = Selector {
        graph,
        refcount,
        immediates,
        table: FxHashMap::default(),
        order: Vec::new(),
        visited: FxHashSet::default(),
        reduction_memo: FxHashMap::default(),
    };

    for &root in roots {
        if !matches!(graph.node(root).kind, NodeKind::Immediate(_)) {
            state.register(root);
        }
        state.walk(root, false);
    }

    Selection { table: state.table, order: state.order }
}

/// Phase A: one count per input edge within the reachable subgraph.
fn count_references(graph: &Graph, roots: &[NodeId]) -> FxHashMap<NodeId, u32> {
    let mut refcount = FxHashMap::default();
    let mut visited = FxHashSet::default();
    let mut stack: Vec<NodeId> = roots.to_vec();

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        for &input in graph.node(node).inputs() {
            debug_assert!(
                graph.node(input).depth < graph.node(node).depth,
                "depth must decrease along every edge"
            );
            *refcount.entry(input).or_insert(0) += 1;
            stack.push(input);
        }
    }
    refcount
}

struct Selector<'a> {
    graph: &'a Graph,
    refcount: FxHashMap<NodeId, u32>,
    immediates: &'a mut IndexVec<ImmId, Immediate>,
    table: FxHashMap<NodeId, ImmId>,
    order: Vec<NodeId>,
    visited: FxHashSet<NodeId>,
    reduction_memo: FxHashMap<NodeId, bool>,
}

impl Selector<'_> {
    fn refs(&self, node: NodeId) -> u32 {
        self.refcount.get(&node).copied().unwrap_or(0)
    }

    /// Register a node as critical, creating its target immediate.
    fn register(&mut self, node: NodeId) {
        if self.table.contains_key(&node) {
            return;
        }
        debug_assert!(
            !matches!(self.graph.node(node).kind, NodeKind::MultiValueMap { .. }),
            "a multi-valued node cannot be materialized into one immediate"
        );
        let n = self.graph.node(node);
        let imm = self.immediates.push(Immediate {
            shape: n.shape.clone(),
            ntype: n.ntype,
            kind: ImmKind::Storage,
        });
        self.table.insert(node, imm);
        self.order.push(node);
    }

    /// Phase B walk. Every reachable node is visited exactly once; nodes
    /// referenced twice are therefore traversed once no matter how many
    /// parents reach them.
    fn walk(&mut self, node: NodeId, below_reduction: bool) {
        if !self.visited.insert(node) {
            return;
        }

        let kind = &self.graph.node(node).kind;
        match kind {
            NodeKind::Immediate(imm) => {
                let imm = *imm;
                self.table.entry(node).or_insert(imm);
                return;
            }
            NodeKind::MultiValueMap { .. } => {
                // Multi-valued producers are never materialized; their
                // consumers inline them or get materialized themselves.
            }
            _ => {
                if self.refs(node) >= 2 {
                    self.register(node);
                }
            }
        }

        // A fusion under a reduction would have to split the reduced axis;
        // materialize it instead.
        if below_reduction && matches!(kind, NodeKind::Fuse { .. }) {
            self.register(node);
        }

        // A replicating reshape reads its input repeatedly; materialize
        // the input so the repetition hits storage, not a fused subtree.
        if let NodeKind::Reshape { map, input } = kind {
            if !map.is_injective() {
                let input = *input;
                self.register(input);
            }
        }

        // A node whose inputs carry two or more fusable reductions would
        // fuse them into one kernel; materialize those inputs.
        let inputs: Vec<NodeId> = self.graph.node(node).inputs().to_vec();
        if inputs.len() >= 2 {
            let carrying: Vec<NodeId> = inputs
                .iter()
                .copied()
                .filter(|&input| self.carries_reduction(input))
                .collect();
            if carrying.len() >= 2 {
                for input in carrying {
                    self.register(input);
                }
            }
        }

        let below = (below_reduction && !self.table.contains_key(&node))
            || matches!(kind, NodeKind::Reduction { .. });
        for input in inputs {
            self.walk(input, below);
        }
    }

    /// True if lowering `node` without materializing it would pull a
    /// reduction into the caller's kernel. Stops at immediates and at
    /// nodes that materialize on their own account.
    fn carries_reduction(&mut self, node: NodeId) -> bool {
        if let Some(&cached) = self.reduction_memo.get(&node) {
            return cached;
        }
        let result = match &self.graph.node(node).kind {
            NodeKind::Immediate(_) => false,
            NodeKind::Reduction { .. } => true,
            _ if self.refs(node) >= 2 => false,
            kind => {
                let inputs: Vec<NodeId> = kind.inputs().to_vec();
                inputs.into_iter().any(|input| self.carries_reduction(input))
            }
        };
        self.reduction_memo.insert(node, result);
        result
    }
}
