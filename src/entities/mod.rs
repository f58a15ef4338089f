//! Entities module - the document side.
//!
//! Nodes, the tree that owns them, composite ops and color spaces, the image,
//! and the events emitted when any of it changes. Nothing here knows about the
//! layer panel.

pub mod composite_op;
pub mod image;
pub mod node;
pub mod node_events;
pub mod node_tree;

pub use composite_op::{ColorSpace, CompositeOp};
pub use image::{Image, ImageDescription, NodeDescription};
pub use node::{LayerKind, MaskKind, Node, NodeId, NodeKind};
pub use node_tree::{NodeTree, TreeError};
