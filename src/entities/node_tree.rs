//! NodeTree - the image's layer/mask tree.
//!
//! The tree owns every [`Node`]. Everybody else (node manager, list model,
//! layer panel) holds [`NodeId`] handles and looks nodes up here.
//!
//! ## Child Order
//!
//! `children` vectors store nodes from **bottom to top** (stacking order):
//! - `children[0]` = bottom-most child
//! - `children[N-1]` = top-most child
//!
//! So the "previous sibling" of a node is the one directly beneath it and the
//! "next sibling" the one directly above. Display order (top first) is the
//! list model's business.
//!
//! ## Mutations
//!
//! All mutations validate and return [`TreeError`] instead of panicking:
//! unknown ids, moving the root, moving a node into its own subtree, and
//! parents that refuse the child kind ([`NodeKind::accepts_child`]).

use std::collections::HashMap;
use std::fmt;

use super::node::{LayerKind, Node, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    UnknownNode(NodeId),
    RootImmutable,
    Cycle { node: NodeId, parent: NodeId },
    Refused { parent: NodeId, child: NodeKind },
    HasChildren(NodeId),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::UnknownNode(id) => write!(f, "Unknown node: {}", id),
            TreeError::RootImmutable => write!(f, "The root node cannot be moved or removed"),
            TreeError::Cycle { node, parent } => {
                write!(f, "Cannot move {} into its own subtree ({})", node, parent)
            }
            TreeError::Refused { parent, child } => {
                write!(f, "Node {} does not accept a {:?} child", parent, child)
            }
            TreeError::HasChildren(id) => write!(f, "Node {} still has children", id),
        }
    }
}

impl std::error::Error for TreeError {}

#[derive(Clone, Debug)]
struct Slot {
    node: Node,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct NodeTree {
    root: NodeId,
    slots: HashMap<NodeId, Slot>,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    /// Create a tree holding only a root group
    pub fn new() -> Self {
        let root = Node::layer(LayerKind::Group, "root");
        let root_id = root.id;
        let mut slots = HashMap::new();
        slots.insert(
            root_id,
            Slot {
                node: root,
                parent: None,
                children: Vec::new(),
            },
        );
        Self { root: root_id, slots }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        // root is always there
        self.slots.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(&id).map(|s| &s.node)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(&id).map(|s| &mut s.node)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(|n| n.kind)
    }

    // -- Topology queries --

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(&id).and_then(|s| s.parent)
    }

    pub fn grandparent(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).and_then(|p| self.parent(p))
    }

    /// Children bottom to top
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slots.get(&id).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// Child of `parent` at `index`. Negative or out-of-range indices give None.
    pub fn child_at(&self, parent: NodeId, index: isize) -> Option<NodeId> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Position of `id` among its siblings
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Sibling directly beneath
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_of(id)?;
        idx.checked_sub(1).map(|i| self.children(parent)[i])
    }

    /// Sibling directly above
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_of(id)?;
        self.children(parent).get(idx + 1).copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// Is `ancestor` equal to `id` or one of its ancestors?
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    /// Would `parent` take a node of kind `child` under it?
    pub fn allows_as_child(&self, parent: NodeId, child: NodeKind) -> bool {
        if parent == self.root {
            return NodeKind::root_accepts(child);
        }
        self.kind(parent).is_some_and(|k| k.accepts_child(child))
    }

    /// Editable = visible, not locked, and no locked ancestor below the root.
    pub fn is_editable(&self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        if !node.visible || node.locked {
            return false;
        }
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if p == self.root {
                break;
            }
            if self.get(p).is_some_and(|n| n.locked) {
                return false;
            }
            cur = self.parent(p);
        }
        true
    }

    /// The global selection mask: the top-most selection mask directly under the root.
    pub fn global_selection_mask(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .rev()
            .copied()
            .find(|c| self.kind(*c).is_some_and(|k| k.is_selection_mask()))
    }

    /// Depth-first pre-order walk below `id` (excluding `id`), bottom child first
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Find the first node (pre-order) with the given name
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.get(*id).is_some_and(|n| n.name == name))
    }

    // -- Mutations --

    /// Insert `node` under `parent` at `index` (clamped to the child count).
    pub fn insert(&mut self, node: Node, parent: NodeId, index: usize) -> Result<NodeId, TreeError> {
        if !self.contains(parent) {
            return Err(TreeError::UnknownNode(parent));
        }
        if !self.allows_as_child(parent, node.kind) {
            return Err(TreeError::Refused { parent, child: node.kind });
        }
        let id = node.id;
        self.slots.insert(
            id,
            Slot {
                node,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        self.attach(id, parent, index);
        Ok(id)
    }

    /// Append `node` as top-most child of `parent`
    pub fn push(&mut self, node: Node, parent: NodeId) -> Result<NodeId, TreeError> {
        let index = self.child_count(parent);
        self.insert(node, parent, index)
    }

    /// Remove `id` and its whole subtree, returning the removed nodes (pre-order).
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<Node>, TreeError> {
        if id == self.root {
            return Err(TreeError::RootImmutable);
        }
        if !self.contains(id) {
            return Err(TreeError::UnknownNode(id));
        }
        self.detach(id);
        let mut order = vec![id];
        order.extend(self.descendants(id));
        Ok(order
            .into_iter()
            .filter_map(|n| self.slots.remove(&n).map(|s| s.node))
            .collect())
    }

    /// Move `id` under `new_parent` at `index`.
    ///
    /// The node is detached first, so for moves within the same parent
    /// `index` counts positions without the node. The index is clamped.
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::RootImmutable);
        }
        let kind = self.kind(id).ok_or(TreeError::UnknownNode(id))?;
        if !self.contains(new_parent) {
            return Err(TreeError::UnknownNode(new_parent));
        }
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(TreeError::Cycle { node: id, parent: new_parent });
        }
        if !self.allows_as_child(new_parent, kind) {
            return Err(TreeError::Refused { parent: new_parent, child: kind });
        }
        self.detach(id);
        self.attach(id, new_parent, index);
        Ok(())
    }

    /// Change the kind of `id` in place.
    ///
    /// Refused when the parent would not hold the new kind or the new kind
    /// would not hold one of the current children.
    pub fn convert(&mut self, id: NodeId, kind: NodeKind) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::RootImmutable);
        }
        let parent = self.parent(id).ok_or(TreeError::UnknownNode(id))?;
        if !self.allows_as_child(parent, kind) {
            return Err(TreeError::Refused { parent, child: kind });
        }
        for child in self.children(id) {
            if let Some(child_kind) = self.kind(*child)
                && !kind.accepts_child(child_kind)
            {
                return Err(TreeError::HasChildren(id));
            }
        }
        if let Some(node) = self.get_mut(id) {
            node.kind = kind;
            if kind.is_mask() {
                node.composite_op = None;
            } else if node.composite_op.is_none() {
                node.composite_op = Some(super::composite_op::OP_NORMAL.to_string());
            }
        }
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.slots.get_mut(&id).and_then(|s| s.parent.take())
            && let Some(p) = self.slots.get_mut(&parent)
        {
            p.children.retain(|c| *c != id);
        }
    }

    fn attach(&mut self, id: NodeId, parent: NodeId, index: usize) {
        if let Some(p) = self.slots.get_mut(&parent) {
            let index = index.min(p.children.len());
            p.children.insert(index, id);
        }
        if let Some(s) = self.slots.get_mut(&id) {
            s.parent = Some(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::node::MaskKind;

    fn paint(name: &str) -> Node {
        Node::layer(LayerKind::Paint, name)
    }

    /// root: [a, group[g1, g2], b]
    fn sample() -> (NodeTree, [NodeId; 5]) {
        let mut tree = NodeTree::new();
        let root = tree.root();
        let a = tree.push(paint("a"), root).unwrap();
        let group = tree.push(Node::layer(LayerKind::Group, "group"), root).unwrap();
        let b = tree.push(paint("b"), root).unwrap();
        let g1 = tree.push(paint("g1"), group).unwrap();
        let g2 = tree.push(paint("g2"), group).unwrap();
        (tree, [a, group, b, g1, g2])
    }

    #[test]
    fn test_siblings_and_indices() {
        let (tree, [a, group, b, g1, g2]) = sample();
        assert_eq!(tree.index_of(a), Some(0));
        assert_eq!(tree.index_of(b), Some(2));
        assert_eq!(tree.prev_sibling(group), Some(a));
        assert_eq!(tree.next_sibling(group), Some(b));
        assert_eq!(tree.prev_sibling(a), None);
        assert_eq!(tree.next_sibling(b), None);
        assert_eq!(tree.grandparent(g1), Some(tree.root()));
        assert_eq!(tree.child_at(group, -1), None);
        assert_eq!(tree.child_at(group, 1), Some(g2));
        assert_eq!(tree.child_at(group, 2), None);
        assert_eq!(tree.grandparent(a), None);
    }

    #[test]
    fn test_move_within_and_across_parents() {
        let (mut tree, [a, group, b, g1, g2]) = sample();
        let root = tree.root();

        tree.move_node(a, root, 1).unwrap();
        assert_eq!(tree.children(root), &[group, a, b]);

        tree.move_node(g1, root, 0).unwrap();
        assert_eq!(tree.children(root), &[g1, group, a, b]);
        assert_eq!(tree.children(group), &[g2]);
        assert_eq!(tree.parent(g1), Some(root));

        // index clamps
        tree.move_node(g1, group, 99).unwrap();
        assert_eq!(tree.children(group), &[g2, g1]);
    }

    #[test]
    fn test_move_refusals() {
        let (mut tree, [a, group, b, g1, _]) = sample();
        let root = tree.root();

        assert_eq!(tree.move_node(root, group, 0), Err(TreeError::RootImmutable));
        assert!(matches!(tree.move_node(group, group, 0), Err(TreeError::Cycle { .. })));
        assert!(matches!(tree.move_node(a, b, 0), Err(TreeError::Refused { .. })));

        let mask = tree.push(Node::mask(MaskKind::Transparency, "m"), g1).unwrap();
        // plain masks don't go to the root
        assert!(matches!(tree.move_node(mask, root, 0), Err(TreeError::Refused { .. })));
        // but into a group they do
        tree.move_node(mask, group, 0).unwrap();
        assert_eq!(tree.child_at(group, 0), Some(mask));
    }

    #[test]
    fn test_remove_subtree() {
        let (mut tree, [_, group, _, g1, g2]) = sample();
        let before = tree.len();
        let removed = tree.remove(group).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(tree.len(), before - 3);
        assert!(!tree.contains(g1) && !tree.contains(g2));
        assert_eq!(tree.remove(tree.root()), Err(TreeError::RootImmutable));
    }

    #[test]
    fn test_editable_and_global_selection() {
        let (mut tree, [a, group, _, g1, _]) = sample();
        assert!(tree.is_editable(g1));
        tree.get_mut(group).unwrap().locked = true;
        assert!(!tree.is_editable(g1));
        tree.get_mut(a).unwrap().visible = false;
        assert!(!tree.is_editable(a));

        assert_eq!(tree.global_selection_mask(), None);
        let root = tree.root();
        let sel = tree.push(Node::mask(MaskKind::Selection, "sel"), root).unwrap();
        assert_eq!(tree.global_selection_mask(), Some(sel));
    }

    #[test]
    fn test_convert() {
        let (mut tree, [a, group, _, _, _]) = sample();
        // top-level layers can't become plain masks
        assert!(matches!(
            tree.convert(a, NodeKind::TRANSPARENCY_MASK),
            Err(TreeError::Refused { .. })
        ));
        // group with layer children can't become a paint layer
        assert_eq!(tree.convert(group, NodeKind::PAINT_LAYER), Err(TreeError::HasChildren(group)));

        tree.convert(a, NodeKind::SELECTION_MASK).unwrap();
        assert!(tree.get(a).unwrap().composite_op.is_none());
        tree.convert(a, NodeKind::PAINT_LAYER).unwrap();
        assert_eq!(tree.get(a).unwrap().composite_op.as_deref(), Some("normal"));
    }

    #[test]
    fn test_descendants_and_find() {
        let (tree, [a, group, b, g1, g2]) = sample();
        assert_eq!(tree.descendants(tree.root()), vec![a, group, g1, g2, b]);
        assert_eq!(tree.find_by_name("g2"), Some(g2));
        assert_eq!(tree.find_by_name("nope"), None);
    }
}
