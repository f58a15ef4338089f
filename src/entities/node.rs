//! Node - a layer or mask in the image's composition tree.
//!
//! The kind of a node is a closed set: [`NodeKind::Layer`] or
//! [`NodeKind::Mask`]. Structural rules ("can this node hold that one?") are
//! capability queries on the kind rather than type inspection.
//!
//! Topology (parent / children) lives in [`NodeTree`](super::node_tree::NodeTree);
//! a `Node` only carries its own properties.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::composite_op::{ColorSpace, OP_NORMAL};

/// Stable handle to a node. Valid for as long as the node is in its tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first group is plenty to tell nodes apart in logs
        let s = self.0.simple().to_string();
        write!(f, "NodeId({})", &s[..8])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Paint,
    Group,
    Clone,
    Shape,
    Adjustment,
    Fill,
    File,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    Transparency,
    Filter,
    Selection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Layer(LayerKind),
    Mask(MaskKind),
}

impl NodeKind {
    pub const PAINT_LAYER: Self = NodeKind::Layer(LayerKind::Paint);
    pub const GROUP_LAYER: Self = NodeKind::Layer(LayerKind::Group);
    pub const SELECTION_MASK: Self = NodeKind::Mask(MaskKind::Selection);
    pub const TRANSPARENCY_MASK: Self = NodeKind::Mask(MaskKind::Transparency);
    pub const FILTER_MASK: Self = NodeKind::Mask(MaskKind::Filter);

    pub fn is_layer(&self) -> bool {
        matches!(self, NodeKind::Layer(_))
    }

    pub fn is_mask(&self) -> bool {
        matches!(self, NodeKind::Mask(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::Layer(LayerKind::Group))
    }

    pub fn is_selection_mask(&self) -> bool {
        matches!(self, NodeKind::Mask(MaskKind::Selection))
    }

    /// Whether nodes of this kind own pixels (and thus a color space).
    pub fn has_paint_device(&self) -> bool {
        match self {
            NodeKind::Layer(LayerKind::Group | LayerKind::Adjustment | LayerKind::Shape) => false,
            NodeKind::Layer(_) => true,
            NodeKind::Mask(_) => true,
        }
    }

    /// Can a node of this kind hold a child of kind `child`?
    ///
    /// Groups hold anything, other layers hold masks only, masks hold nothing.
    /// The image root has its own rule, see [`NodeKind::root_accepts`].
    pub fn accepts_child(&self, child: NodeKind) -> bool {
        match self {
            NodeKind::Layer(LayerKind::Group) => true,
            NodeKind::Layer(_) => child.is_mask(),
            NodeKind::Mask(_) => false,
        }
    }

    /// The image root holds layers plus the global selection mask.
    pub fn root_accepts(child: NodeKind) -> bool {
        child.is_layer() || child.is_selection_mask()
    }

    /// Default display name for a freshly created node
    pub fn default_name(&self) -> &'static str {
        match self {
            NodeKind::Layer(LayerKind::Paint) => "Paint Layer",
            NodeKind::Layer(LayerKind::Group) => "Group",
            NodeKind::Layer(LayerKind::Clone) => "Clone Layer",
            NodeKind::Layer(LayerKind::Shape) => "Vector Layer",
            NodeKind::Layer(LayerKind::Adjustment) => "Filter Layer",
            NodeKind::Layer(LayerKind::Fill) => "Fill Layer",
            NodeKind::Layer(LayerKind::File) => "File Layer",
            NodeKind::Mask(MaskKind::Transparency) => "Transparency Mask",
            NodeKind::Mask(MaskKind::Filter) => "Filter Mask",
            NodeKind::Mask(MaskKind::Selection) => "Selection Mask",
        }
    }
}

/// Node properties.
///
/// Opacity is stored 0..=255; the panel presents it as a 0..=100 percentage.
/// `composite_op` is only meaningful for layers; masks carry None.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub opacity: u8,
    pub composite_op: Option<String>,
    pub visible: bool,
    pub locked: bool,
    pub collapsed: bool,
    /// Color space of the node's pixels; None = image color space
    pub color_space: Option<ColorSpace>,
}

impl Node {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            kind,
            opacity: u8::MAX,
            composite_op: kind.is_layer().then(|| OP_NORMAL.to_string()),
            visible: true,
            locked: false,
            collapsed: false,
            color_space: None,
        }
    }

    pub fn layer(kind: LayerKind, name: impl Into<String>) -> Self {
        Self::new(NodeKind::Layer(kind), name)
    }

    pub fn mask(kind: MaskKind, name: impl Into<String>) -> Self {
        Self::new(NodeKind::Mask(kind), name)
    }

    pub fn with_opacity(mut self, opacity: u8) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_composite_op(mut self, op: Option<&str>) -> Self {
        self.composite_op = op.map(str::to_string);
        self
    }

    pub fn with_color_space(mut self, cs: ColorSpace) -> Self {
        self.color_space = Some(cs);
        self
    }

    pub fn is_layer(&self) -> bool {
        self.kind.is_layer()
    }

    pub fn is_mask(&self) -> bool {
        self.kind.is_mask()
    }

    /// Opacity as 0..=100
    pub fn opacity_percent(&self) -> f64 {
        f64::from(self.opacity) * 100.0 / 255.0
    }

    /// Copy of this node with a fresh id, for duplication
    pub fn duplicate(&self) -> Self {
        Self {
            id: NodeId::new(),
            name: format!("{} Copy", self.name),
            ..self.clone()
        }
    }
}

/// Convert a 0..=100 percentage to stored 0..=255 opacity
pub fn percent_to_opacity(percent: f64) -> u8 {
    (percent.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_child() {
        let group = NodeKind::GROUP_LAYER;
        let paint = NodeKind::PAINT_LAYER;
        let mask = NodeKind::TRANSPARENCY_MASK;

        assert!(group.accepts_child(paint));
        assert!(group.accepts_child(mask));
        assert!(!paint.accepts_child(paint));
        assert!(paint.accepts_child(mask));
        assert!(!mask.accepts_child(mask));
        assert!(!mask.accepts_child(paint));

        assert!(NodeKind::root_accepts(paint));
        assert!(NodeKind::root_accepts(NodeKind::SELECTION_MASK));
        assert!(!NodeKind::root_accepts(NodeKind::FILTER_MASK));
    }

    #[test]
    fn test_new_node_defaults() {
        let layer = Node::layer(LayerKind::Paint, "A");
        assert_eq!(layer.opacity, 255);
        assert_eq!(layer.composite_op.as_deref(), Some(OP_NORMAL));
        assert!(layer.visible && !layer.locked && !layer.collapsed);

        let mask = Node::mask(MaskKind::Filter, "M");
        assert!(mask.composite_op.is_none());
    }

    #[test]
    fn test_opacity_conversion() {
        assert_eq!(percent_to_opacity(100.0), 255);
        assert_eq!(percent_to_opacity(0.0), 0);
        assert_eq!(percent_to_opacity(50.0), 128);
        assert_eq!(percent_to_opacity(150.0), 255);

        let node = Node::layer(LayerKind::Paint, "A").with_opacity(51);
        assert!((node.opacity_percent() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_gets_fresh_id() {
        let node = Node::layer(LayerKind::Paint, "A");
        let copy = node.duplicate();
        assert_ne!(node.id, copy.id);
        assert_eq!(copy.name, "A Copy");
        assert_eq!(copy.kind, node.kind);
    }
}
