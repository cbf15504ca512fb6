//! tess-ir - The Lazy Array DAG Model
//!
//! Data model consumed by the lowering pass: stepped index ranges and
//! rectangular shapes, affine index transformations, numeric type
//! descriptors, and the immutable DAG of lazy array nodes.
//!
//! Nodes live in an arena ([`Graph`]) and refer to each other by typed ids,
//! so the DAG is acyclic by construction: a node's inputs must already
//! exist when the node is created. Construction validates the caller
//! contract as it goes — shape agreement for maps, image containment for
//! reshapes, disjoint rectangular coverage for fusions — and surfaces
//! violations as [`GraphError`] values carrying the offending shapes.

pub mod error;
pub mod graph;
pub mod ntype;
pub mod shape;
pub mod xform;

mod edge_cases;

pub use error::GraphError;
pub use graph::{Graph, ImmId, ImmKind, Immediate, Node, NodeId, NodeKind};
pub use ntype::NType;
pub use shape::{rectangular_union, subdivide, Range, Shape};
pub use xform::{AffineMap, AxisMap};
