//! Vector shapes - containment and absolute positioning
//!
//! Shapes sit in containers; a per-child clipping flag decides whether the
//! container's rotation carries over to the child.

mod shape;
mod shape_tree;

pub use shape::{Anchor, Shape, normalize_degrees};
pub use shape_tree::{ShapeError, ShapeId, ShapeTree};
