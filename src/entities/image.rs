//! Image - a named node tree with a color space.
//!
//! Also owns the on-disk document format: a nested JSON description
//! ([`ImageDescription`] / [`NodeDescription`]) where `children` are listed
//! bottom to top, like the tree stores them.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::composite_op::ColorSpace;
use super::node::{Node, NodeId, NodeKind};
use super::node_tree::NodeTree;

#[derive(Clone, Debug)]
pub struct Image {
    pub name: String,
    pub color_space: ColorSpace,
    pub tree: NodeTree,
}

impl Default for Image {
    fn default() -> Self {
        Self::new("Untitled", ColorSpace::default())
    }
}

impl Image {
    pub fn new(name: impl Into<String>, color_space: ColorSpace) -> Self {
        Self {
            name: name.into(),
            color_space,
            tree: NodeTree::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Color space a node's pixels use: its own or the image's
    pub fn node_color_space(&self, id: NodeId) -> ColorSpace {
        self.tree
            .get(id)
            .and_then(|n| n.color_space)
            .unwrap_or(self.color_space)
    }

    pub fn from_description(desc: &ImageDescription) -> Result<Self> {
        let mut image = Image::new(desc.name.clone(), desc.color_space);
        let root = image.root();
        for child in &desc.nodes {
            add_described(&mut image.tree, root, child)?;
        }
        Ok(image)
    }

    pub fn to_description(&self) -> ImageDescription {
        ImageDescription {
            name: self.name.clone(),
            color_space: self.color_space,
            nodes: self
                .tree
                .children(self.root())
                .iter()
                .filter_map(|c| describe(&self.tree, *c))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read image description {}", path.display()))?;
        let desc: ImageDescription = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse image description {}", path.display()))?;
        Self::from_description(&desc)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_description())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write image description {}", path.display()))
    }
}

fn add_described(tree: &mut NodeTree, parent: NodeId, desc: &NodeDescription) -> Result<()> {
    let mut node = Node::new(desc.kind, desc.name.clone());
    node.opacity = desc.opacity;
    if desc.composite_op.is_some() {
        node.composite_op = desc.composite_op.clone();
    }
    node.visible = desc.visible;
    node.locked = desc.locked;
    node.collapsed = desc.collapsed;
    node.color_space = desc.color_space;

    let id = tree
        .push(node, parent)
        .with_context(|| format!("Cannot place node '{}'", desc.name))?;
    for child in &desc.children {
        add_described(tree, id, child)?;
    }
    Ok(())
}

fn describe(tree: &NodeTree, id: NodeId) -> Option<NodeDescription> {
    let node = tree.get(id)?;
    Some(NodeDescription {
        name: node.name.clone(),
        kind: node.kind,
        opacity: node.opacity,
        composite_op: node.composite_op.clone(),
        visible: node.visible,
        locked: node.locked,
        collapsed: node.collapsed,
        color_space: node.color_space,
        children: tree
            .children(id)
            .iter()
            .filter_map(|c| describe(tree, *c))
            .collect(),
    })
}

fn default_opacity() -> u8 {
    u8::MAX
}

fn default_true() -> bool {
    true
}

/// Serialized node, children bottom to top
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_op: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_space: Option<ColorSpace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageDescription {
    pub name: String,
    #[serde(default)]
    pub color_space: ColorSpace,
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
}
