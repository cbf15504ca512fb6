//! The lazy array DAG.
//!
//! Nodes are immutable once created and live in an arena keyed by
//! [`NodeId`]; materialized arrays live in a parallel arena keyed by
//! [`ImmId`]. A node's inputs must already exist when it is built, so the
//! graph is acyclic by construction and `depth` is strictly monotone along
//! every edge — traversals assert exactly that instead of carrying a
//! cycle-breaking strategy.
//!
//! The constructors validate the producer contract (shape agreement under
//! maps, image containment under reshapes, rectangular partition under
//! fusions) and return [`GraphError`] values naming the offending shapes.

use crate::error::{GraphError, GraphResult};
use crate::ntype::{self, NType};
use crate::shape::{rectangular_union, Range, Shape};
use crate::xform::AffineMap;
use tess_util::{define_idx, IndexVec, OpName};

define_idx!(
    /// Id of a node in the DAG arena.
    pub struct NodeId;
);

define_idx!(
    /// Id of a materialized immediate.
    pub struct ImmId;
);

/// What a materialized immediate holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImmKind {
    /// Backing storage supplied (or to be allocated) by a backend.
    Storage,
    /// The immediate's contents are its own index space; no storage needed
    /// beyond what the backend chooses to realize.
    Range,
}

/// A materialized array value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Immediate {
    pub shape: Shape,
    pub ntype: NType,
    pub kind: ImmKind,
}

/// Discriminator of a DAG node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A materialized array.
    Immediate(ImmId),
    /// Pointwise application of an operator over equally shaped inputs.
    Map { op: OpName, inputs: Vec<NodeId> },
    /// Pointwise application of an operator producing several values.
    MultiValueMap { op: OpName, nvalues: u32, inputs: Vec<NodeId> },
    /// Selection of one value of a multi-valued map.
    MultiValueRef { value: u32, input: NodeId },
    /// Affine re-indexing; `map` sends this node's index space into the
    /// input's.
    Reshape { map: AffineMap, input: NodeId },
    /// Disjoint rectangular assembly of equally ranked inputs.
    Fuse { inputs: Vec<NodeId> },
    /// Reduction over the leading axis of the input.
    Reduction { op: OpName, input: NodeId },
}

/// A lazy array node.
///
/// `shape`, `ntype`, and `depth` form the shared header every kind
/// carries; the discriminator holds the kind-specific payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub shape: Shape,
    pub ntype: NType,
    pub depth: u32,
    pub kind: NodeKind,
}

impl NodeKind {
    /// The ordered inputs of the node kind.
    pub fn inputs(&self) -> &[NodeId] {
        match self {
            NodeKind::Immediate(_) => &[],
            NodeKind::Map { inputs, .. }
            | NodeKind::MultiValueMap { inputs, .. }
            | NodeKind::Fuse { inputs } => inputs,
            NodeKind::MultiValueRef { input, .. }
            | NodeKind::Reshape { input, .. }
            | NodeKind::Reduction { input, .. } => std::slice::from_ref(input),
        }
    }
}

impl Node {
    /// The ordered inputs of the node.
    pub fn inputs(&self) -> &[NodeId] {
        self.kind.inputs()
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> i64 {
        self.shape.size()
    }
}

/// The DAG arena.
#[derive(Default)]
pub struct Graph {
    nodes: IndexVec<NodeId, Node>,
    immediates: IndexVec<ImmId, Immediate>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Access a node.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Access an immediate.
    #[inline]
    pub fn imm(&self, id: ImmId) -> &Immediate {
        &self.immediates[id]
    }

    /// The immediate arena.
    pub fn immediates(&self) -> &IndexVec<ImmId, Immediate> {
        &self.immediates
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, shape: Shape, ntype: NType, kind: NodeKind) -> NodeId {
        let depth = kind
            .inputs()
            .iter()
            .map(|&input| self.nodes[input].depth + 1)
            .max()
            .unwrap_or(0);
        self.nodes.push(Node { shape, ntype, depth, kind })
    }

    /// A materialized array with backing storage.
    pub fn immediate(&mut self, shape: Shape, ntype: NType) -> NodeId {
        let imm = self.immediates.push(Immediate { shape: shape.clone(), ntype, kind: ImmKind::Storage });
        self.push(shape, ntype, NodeKind::Immediate(imm))
    }

    /// A rank-1 immediate whose elements are its own indices.
    pub fn range_immediate(&mut self, range: Range) -> NodeId {
        let shape = Shape::new(vec![range]);
        let imm = self.immediates.push(Immediate { shape: shape.clone(), ntype: NType::I64, kind: ImmKind::Range });
        self.push(shape, NType::I64, NodeKind::Immediate(imm))
    }

    /// Pointwise operator application.
    pub fn map(&mut self, op: OpName, inputs: &[NodeId]) -> GraphResult<NodeId> {
        if inputs.is_empty() {
            return Err(GraphError::NoInputs("map"));
        }
        let shape = self.nodes[inputs[0]].shape.clone();
        for &input in &inputs[1..] {
            let other = &self.nodes[input].shape;
            if *other != shape {
                return Err(GraphError::ShapeMismatch {
                    context: "map",
                    left: shape,
                    right: other.clone(),
                });
            }
        }
        let input_types: Vec<NType> = inputs.iter().map(|&i| self.nodes[i].ntype).collect();
        let ntype = ntype::specialize(op, &input_types).unwrap_or(NType::Generic);
        Ok(self.push(shape, ntype, NodeKind::Map { op, inputs: inputs.to_vec() }))
    }

    /// Pointwise application producing `nvalues` values per element.
    pub fn multi_value_map(&mut self, op: OpName, nvalues: u32, inputs: &[NodeId]) -> GraphResult<NodeId> {
        if inputs.is_empty() {
            return Err(GraphError::NoInputs("multi-value map"));
        }
        let shape = self.nodes[inputs[0]].shape.clone();
        for &input in &inputs[1..] {
            let other = &self.nodes[input].shape;
            if *other != shape {
                return Err(GraphError::ShapeMismatch {
                    context: "multi-value map",
                    left: shape,
                    right: other.clone(),
                });
            }
        }
        let ntype = inputs.iter().map(|&i| self.nodes[i].ntype).reduce(NType::union).unwrap();
        Ok(self.push(shape, ntype, NodeKind::MultiValueMap { op, nvalues, inputs: inputs.to_vec() }))
    }

    /// Select the `value`-th result of a multi-valued map.
    pub fn multi_value_ref(&mut self, value: u32, input: NodeId) -> GraphResult<NodeId> {
        let node = &self.nodes[input];
        let NodeKind::MultiValueMap { nvalues, .. } = &node.kind else {
            return Err(GraphError::NotMultiValued);
        };
        let nvalues = *nvalues;
        if value >= nvalues {
            return Err(GraphError::ValueOutOfRange { value, nvalues });
        }
        let (shape, ntype) = (node.shape.clone(), node.ntype);
        Ok(self.push(shape, ntype, NodeKind::MultiValueRef { value, input }))
    }

    /// Affine re-indexing of `input`.
    ///
    /// `shape` is the new node's index space; `map` sends it into the
    /// input's space, and its image must land inside the input's shape.
    pub fn reshape(&mut self, shape: Shape, map: AffineMap, input: NodeId) -> GraphResult<NodeId> {
        if map.input_rank() != shape.rank() {
            return Err(GraphError::RankMismatch {
                context: "reshape",
                left: map.input_rank(),
                right: shape.rank(),
            });
        }
        let input_shape = &self.nodes[input].shape;
        if map.output_rank() != input_shape.rank() {
            return Err(GraphError::RankMismatch {
                context: "reshape",
                left: map.output_rank(),
                right: input_shape.rank(),
            });
        }
        let image = map.apply(&shape);
        if !input_shape.contains_shape(&image) {
            return Err(GraphError::ShapeMismatch {
                context: "reshape",
                left: image,
                right: input_shape.clone(),
            });
        }
        let ntype = self.nodes[input].ntype;
        Ok(self.push(shape, ntype, NodeKind::Reshape { map, input }))
    }

    /// Assemble disjoint pieces into one array.
    ///
    /// The inputs must have equal rank, be pairwise disjoint, and
    /// partition a rectangular index space exactly.
    pub fn fuse(&mut self, inputs: &[NodeId]) -> GraphResult<NodeId> {
        if inputs.is_empty() {
            return Err(GraphError::EmptyFuse);
        }
        let rank = self.nodes[inputs[0]].rank();
        for &input in &inputs[1..] {
            let other = self.nodes[input].rank();
            if other != rank {
                return Err(GraphError::RankMismatch { context: "fuse", left: rank, right: other });
            }
        }
        for i in 0..inputs.len() {
            for j in (i + 1)..inputs.len() {
                let (a, b) = (&self.nodes[inputs[i]].shape, &self.nodes[inputs[j]].shape);
                if a.intersect(b).is_some() {
                    return Err(GraphError::OverlappingFuse { left: a.clone(), right: b.clone() });
                }
            }
        }
        let shapes: Vec<Shape> = inputs.iter().map(|&i| self.nodes[i].shape.clone()).collect();
        let shape = rectangular_union(&shapes).ok_or(GraphError::NotRectangular)?;
        let ntype = inputs.iter().map(|&i| self.nodes[i].ntype).reduce(NType::union).unwrap();
        Ok(self.push(shape, ntype, NodeKind::Fuse { inputs: inputs.to_vec() }))
    }

    /// Reduce the leading axis of `input` with `op`.
    pub fn reduction(&mut self, op: OpName, input: NodeId) -> GraphResult<NodeId> {
        let node = &self.nodes[input];
        if node.rank() == 0 {
            return Err(GraphError::ReduceRankZero);
        }
        let shape = Shape::new(node.shape.ranges()[1..].to_vec());
        let ntype = ntype::specialize(op, &[node.ntype]).unwrap_or(NType::Generic);
        Ok(self.push(shape, ntype, NodeKind::Reduction { op, input }))
    }
}
