//! Node manager - the single writer of the image's node tree.
//!
//! The layer panel never mutates nodes itself. It asks a [`NodeManager`] for
//! the active node / selection and forwards edit commands to it. The manager
//! validates each command against the tree, applies it, records it in its
//! edit journal and emits the matching notification on the bus.
//!
//! Refused commands (locked node, no active node, parent that won't take the
//! child) are logged and otherwise ignored: callers never see an error.
//!
//! [`ImageNodeManager`] is the in-memory implementation used by the binary
//! and the tests.

use crate::entities::composite_op::ColorSpace;
use crate::entities::image::Image;
use crate::entities::node::{Node, NodeId, NodeKind, percent_to_opacity};
use crate::entities::node_events::*;
use crate::entities::node_tree::NodeTree;

use super::event_bus::EventEmitter;

/// Collaborator contract consumed by the layer panel.
pub trait NodeManager: Send {
    fn image(&self) -> &Image;

    // -- Queries --

    fn active_node(&self) -> Option<NodeId>;
    /// Active node when it owns pixels
    fn active_paint_device(&self) -> Option<NodeId>;
    /// Color space of the active paint device, else the image's
    fn active_color_space(&self) -> ColorSpace;
    fn selected_nodes(&self) -> Vec<NodeId>;

    // -- Activation / selection --

    /// Activation coming from the view: the view is already up to date.
    fn slot_ui_activated_node(&mut self, node: Option<NodeId>);
    /// Activation from anywhere else: the view is told to follow.
    fn slot_non_ui_activated_node(&mut self, node: NodeId);
    fn set_selected_nodes(&mut self, nodes: Vec<NodeId>);

    // -- Structure --

    /// Create a node of `kind` next to (or inside) the active node
    fn create_node(&mut self, kind: NodeKind) -> Option<NodeId>;
    fn add_node_direct(&mut self, node: Node, parent: NodeId, index: usize) -> Option<NodeId>;
    fn move_node_direct(&mut self, node: NodeId, parent: NodeId, index: usize) -> bool;
    fn move_node_at(&mut self, node: NodeId, parent: NodeId, index: usize) -> bool;
    /// Swap the active node with its next sibling
    fn raise_node(&mut self);
    /// Swap the active node with its previous sibling
    fn lower_node(&mut self);
    /// Remove the selected nodes (or the active one)
    fn remove_node(&mut self);
    fn duplicate_active_node(&mut self) -> Option<NodeId>;
    fn merge_layer_down(&mut self) -> Option<NodeId>;
    fn convert_active_node(&mut self, kind: NodeKind) -> bool;

    // -- Properties --

    /// Opacity of the active layer in percent. Only `finalize` edits are journaled.
    fn set_node_opacity(&mut self, percent: f64, finalize: bool);
    /// Composite op of the active layer, validated against the active color space
    fn set_node_composite_op(&mut self, op_id: &str);
    fn set_node_collapsed(&mut self, node: NodeId, collapsed: bool);
    fn node_properties(&mut self, node: NodeId);
    fn toggle_isolate_active_node(&mut self);
    fn isolated_node(&self) -> Option<NodeId>;
    /// Replace the global selection with the active layer's opaque area
    fn select_opaque(&mut self) -> Option<NodeId>;
}

/// One journaled edit.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    Add,
    Remove,
    Move { parent: NodeId, index: usize },
    Duplicate { source: NodeId },
    Merge { into: NodeId },
    Convert(NodeKind),
    Opacity(u8),
    CompositeOp(String),
    SelectOpaque,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditRecord {
    pub node: NodeId,
    pub edit: Edit,
}

/// In-memory node manager over an [`Image`].
#[derive(Debug)]
pub struct ImageNodeManager {
    image: Image,
    active: Option<NodeId>,
    selected: Vec<NodeId>,
    isolated: Option<NodeId>,
    history: Vec<EditRecord>,
    emitter: EventEmitter,
}

impl ImageNodeManager {
    /// Wrap `image`; the top-most root child becomes active.
    pub fn new(image: Image, emitter: EventEmitter) -> Self {
        let active = image.tree.last_child(image.root());
        Self {
            image,
            active,
            selected: active.into_iter().collect(),
            isolated: None,
            history: Vec::new(),
            emitter,
        }
    }

    pub fn tree(&self) -> &NodeTree {
        &self.image.tree
    }

    /// Journaled edits, oldest first
    pub fn history(&self) -> &[EditRecord] {
        &self.history
    }

    /// Announce that the image is going away. Panels detach on this.
    pub fn close_image(&self) {
        log::info!("Closing image '{}'", self.image.name);
        self.emitter.emit(ImageAboutToBeDeletedEvent);
    }

    fn record(&mut self, node: NodeId, edit: Edit) {
        log::debug!("Edit on {:?}: {:?}", node, edit);
        self.history.push(EditRecord { node, edit });
    }

    /// Active node if it is an editable layer
    fn active_editable_layer(&self) -> Option<NodeId> {
        let id = self.active?;
        let tree = &self.image.tree;
        if tree.get(id).is_some_and(|n| n.is_layer()) && tree.is_editable(id) {
            Some(id)
        } else {
            log::debug!("No editable active layer");
            None
        }
    }

    fn activate(&mut self, node: Option<NodeId>) {
        self.active = node;
        self.selected = node.into_iter().collect();
        self.emitter.emit(UiNeedChangeActiveNodeEvent(node));
    }

    /// Where a new node of `kind` goes, relative to the active node.
    fn insertion_point(&self, kind: NodeKind) -> Option<(NodeId, usize)> {
        let tree = &self.image.tree;
        let root = tree.root();
        let Some(active) = self.active.filter(|a| tree.contains(*a)) else {
            return tree
                .allows_as_child(root, kind)
                .then(|| (root, tree.child_count(root)));
        };

        // masks go inside the active layer when it takes them
        if kind.is_mask() && tree.allows_as_child(active, kind) && active != root {
            return Some((active, tree.child_count(active)));
        }

        // otherwise directly above the active node, climbing until a parent accepts
        let mut anchor = active;
        while let Some(parent) = tree.parent(anchor) {
            if tree.allows_as_child(parent, kind) {
                let index = tree.index_of(anchor).map_or(0, |i| i + 1);
                return Some((parent, index));
            }
            anchor = parent;
        }
        None
    }

    fn next_name(&self, kind: NodeKind) -> String {
        let tree = &self.image.tree;
        let count = tree
            .descendants(tree.root())
            .into_iter()
            .filter(|id| tree.kind(*id) == Some(kind))
            .count();
        format!("{} {}", kind.default_name(), count + 1)
    }

    /// Copy `source`'s subtree under `parent` at `index`, fresh ids throughout.
    fn copy_subtree(&mut self, source: NodeId, parent: NodeId, index: usize, top: bool) -> Option<NodeId> {
        let tree = &mut self.image.tree;
        let node = tree.get(source)?;
        let copy = if top {
            node.duplicate()
        } else {
            Node {
                id: NodeId::new(),
                ..node.clone()
            }
        };
        let children = tree.children(source).to_vec();
        let id = match tree.insert(copy, parent, index) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Duplicate failed: {}", e);
                return None;
            }
        };
        for (i, child) in children.into_iter().enumerate() {
            self.copy_subtree(child, id, i, false);
        }
        Some(id)
    }

    fn apply_move(&mut self, node: NodeId, parent: NodeId, index: usize) -> bool {
        let old_parent = self.image.tree.parent(node);
        match self.image.tree.move_node(node, parent, index) {
            Ok(()) => {
                let new_index = self.image.tree.index_of(node).unwrap_or(index);
                self.record(node, Edit::Move { parent, index: new_index });
                if let Some(old_parent) = old_parent {
                    self.emitter.emit(NodeMovedEvent {
                        node,
                        old_parent,
                        new_parent: parent,
                        new_index,
                    });
                }
                true
            }
            Err(e) => {
                log::debug!("Move refused: {}", e);
                false
            }
        }
    }
}

impl NodeManager for ImageNodeManager {
    fn image(&self) -> &Image {
        &self.image
    }

    fn active_node(&self) -> Option<NodeId> {
        self.active
    }

    fn active_paint_device(&self) -> Option<NodeId> {
        self.active
            .filter(|id| self.image.tree.kind(*id).is_some_and(|k| k.has_paint_device()))
    }

    fn active_color_space(&self) -> ColorSpace {
        match self.active_paint_device() {
            Some(id) => self.image.node_color_space(id),
            None => self.image.color_space,
        }
    }

    fn selected_nodes(&self) -> Vec<NodeId> {
        self.selected.clone()
    }

    fn slot_ui_activated_node(&mut self, node: Option<NodeId>) {
        let node = node.filter(|n| self.image.tree.contains(*n));
        log::trace!("UI activated {:?}", node);
        self.active = node;
        if let Some(n) = node
            && !self.selected.contains(&n)
        {
            self.selected = vec![n];
        }
    }

    fn slot_non_ui_activated_node(&mut self, node: NodeId) {
        if !self.image.tree.contains(node) {
            log::warn!("Cannot activate unknown node {:?}", node);
            return;
        }
        self.activate(Some(node));
    }

    fn set_selected_nodes(&mut self, nodes: Vec<NodeId>) {
        self.selected = nodes
            .into_iter()
            .filter(|n| self.image.tree.contains(*n))
            .collect();
    }

    fn create_node(&mut self, kind: NodeKind) -> Option<NodeId> {
        let Some((parent, index)) = self.insertion_point(kind) else {
            log::debug!("No place for a new {:?}", kind);
            return None;
        };
        let node = Node::new(kind, self.next_name(kind));
        self.add_node_direct(node, parent, index)
    }

    fn add_node_direct(&mut self, node: Node, parent: NodeId, index: usize) -> Option<NodeId> {
        match self.image.tree.insert(node, parent, index) {
            Ok(id) => {
                self.record(id, Edit::Add);
                self.emitter.emit(NodesInsertedEvent { parent, nodes: vec![id] });
                self.activate(Some(id));
                Some(id)
            }
            Err(e) => {
                log::debug!("Add refused: {}", e);
                None
            }
        }
    }

    fn move_node_direct(&mut self, node: NodeId, parent: NodeId, index: usize) -> bool {
        if !self.image.tree.is_editable(node) {
            log::debug!("Drop of locked node {:?} ignored", node);
            return false;
        }
        let moved = self.apply_move(node, parent, index);
        if moved {
            self.activate(Some(node));
        }
        moved
    }

    fn move_node_at(&mut self, node: NodeId, parent: NodeId, index: usize) -> bool {
        self.apply_move(node, parent, index)
    }

    fn raise_node(&mut self) {
        let Some(active) = self.active.filter(|a| self.image.tree.is_editable(*a)) else {
            return;
        };
        let tree = &self.image.tree;
        if let (Some(parent), Some(idx), Some(_)) =
            (tree.parent(active), tree.index_of(active), tree.next_sibling(active))
        {
            self.apply_move(active, parent, idx + 1);
        }
    }

    fn lower_node(&mut self) {
        let Some(active) = self.active.filter(|a| self.image.tree.is_editable(*a)) else {
            return;
        };
        let tree = &self.image.tree;
        if let (Some(parent), Some(idx)) = (tree.parent(active), tree.index_of(active))
            && idx > 0
        {
            self.apply_move(active, parent, idx - 1);
        }
    }

    fn remove_node(&mut self) {
        let targets = if self.selected.is_empty() {
            self.active.into_iter().collect()
        } else {
            self.selected.clone()
        };
        let root = self.image.root();
        let targets: Vec<NodeId> = targets
            .into_iter()
            .filter(|t| *t != root && self.image.tree.contains(*t))
            .collect();
        let Some(first) = targets.first().copied() else {
            return;
        };

        // next active: below, above, then the parent
        let tree = &self.image.tree;
        let survivor = |n: &NodeId| !targets.iter().any(|t| tree.is_ancestor_or_self(*t, *n));
        let mut candidates = Vec::new();
        let mut cur = tree.prev_sibling(first);
        while let Some(n) = cur {
            candidates.push(n);
            cur = tree.prev_sibling(n);
        }
        let mut cur = tree.next_sibling(first);
        while let Some(n) = cur {
            candidates.push(n);
            cur = tree.next_sibling(n);
        }
        candidates.extend(tree.parent(first).filter(|p| *p != root));
        let next_active = candidates.into_iter().find(survivor);

        for target in targets {
            let Some(parent) = self.image.tree.parent(target) else {
                // already gone with an ancestor
                continue;
            };
            match self.image.tree.remove(target) {
                Ok(removed) => {
                    self.record(target, Edit::Remove);
                    if self.isolated.is_some_and(|i| removed.iter().any(|n| n.id == i)) {
                        self.isolated = None;
                    }
                    self.emitter.emit(NodesRemovedEvent {
                        parent,
                        nodes: removed.iter().map(|n| n.id).collect(),
                    });
                }
                Err(e) => log::debug!("Remove refused: {}", e),
            }
        }
        self.activate(next_active);
    }

    fn duplicate_active_node(&mut self) -> Option<NodeId> {
        let active = self.active?;
        let tree = &self.image.tree;
        let parent = tree.parent(active)?;
        let index = tree.index_of(active)? + 1;
        let id = self.copy_subtree(active, parent, index, true)?;
        self.record(id, Edit::Duplicate { source: active });
        self.emitter.emit(NodesInsertedEvent { parent, nodes: vec![id] });
        self.activate(Some(id));
        Some(id)
    }

    fn merge_layer_down(&mut self) -> Option<NodeId> {
        let active = self.active_editable_layer()?;
        let tree = &self.image.tree;
        let parent = tree.parent(active)?;
        let below = tree.prev_sibling(active).filter(|b| {
            tree.get(*b)
                .is_some_and(|n| n.is_layer() && !n.kind.is_group())
                && tree.is_editable(*b)
        });
        let Some(below) = below else {
            log::debug!("Nothing to merge {:?} into", active);
            return None;
        };

        // masks of the merged layer are applied, so they go with it
        let removed = self.image.tree.remove(active).ok()?;
        self.emitter.emit(NodesRemovedEvent {
            parent,
            nodes: removed.iter().map(|n| n.id).collect(),
        });
        self.record(below, Edit::Merge { into: below });
        self.emitter.emit(NodeDataChangedEvent(below));
        self.activate(Some(below));
        Some(below)
    }

    fn convert_active_node(&mut self, kind: NodeKind) -> bool {
        let Some(active) = self.active.filter(|a| self.image.tree.is_editable(*a)) else {
            return false;
        };
        match self.image.tree.convert(active, kind) {
            Ok(()) => {
                self.record(active, Edit::Convert(kind));
                self.emitter.emit(NodeDataChangedEvent(active));
                self.emitter.emit(UiNeedChangeActiveNodeEvent(Some(active)));
                true
            }
            Err(e) => {
                log::debug!("Convert refused: {}", e);
                false
            }
        }
    }

    fn set_node_opacity(&mut self, percent: f64, finalize: bool) {
        let Some(active) = self.active_editable_layer() else {
            return;
        };
        let opacity = percent_to_opacity(percent);
        if let Some(node) = self.image.tree.get_mut(active) {
            node.opacity = opacity;
        }
        if finalize {
            self.record(active, Edit::Opacity(opacity));
        }
        self.emitter.emit(NodeDataChangedEvent(active));
    }

    fn set_node_composite_op(&mut self, op_id: &str) {
        let Some(active) = self.active_editable_layer() else {
            return;
        };
        let Some(op) = self.active_color_space().composite_op(op_id) else {
            log::warn!(
                "Composite op '{}' not supported by {}",
                op_id,
                self.active_color_space().id()
            );
            return;
        };
        if let Some(node) = self.image.tree.get_mut(active) {
            node.composite_op = Some(op.id.to_string());
        }
        self.record(active, Edit::CompositeOp(op.id.to_string()));
        self.emitter.emit(NodeDataChangedEvent(active));
    }

    fn set_node_collapsed(&mut self, node: NodeId, collapsed: bool) {
        let Some(n) = self.image.tree.get_mut(node) else {
            return;
        };
        if n.collapsed == collapsed {
            return;
        }
        n.collapsed = collapsed;
        self.emitter.emit(NodeCollapsedChangedEvent { node, collapsed });
    }

    fn node_properties(&mut self, node: NodeId) {
        let nodes = if self.selected.contains(&node) {
            self.selected.clone()
        } else {
            vec![node]
        };
        log::info!("Properties requested for {} node(s)", nodes.len());
        self.emitter.emit(PropertiesRequestedEvent(nodes));
    }

    fn toggle_isolate_active_node(&mut self) {
        self.isolated = match (self.isolated, self.active) {
            (Some(_), _) => None,
            (None, active) => active,
        };
        log::info!("Isolate mode: {:?}", self.isolated);
        if let Some(node) = self.isolated.or(self.active) {
            self.emitter.emit(NodeDataChangedEvent(node));
        }
    }

    fn isolated_node(&self) -> Option<NodeId> {
        self.isolated
    }

    fn select_opaque(&mut self) -> Option<NodeId> {
        let source = self.active_paint_device()?;
        let root = self.image.root();
        let mask = match self.image.tree.global_selection_mask() {
            Some(mask) => mask,
            None => {
                let node = Node::new(NodeKind::SELECTION_MASK, "Selection");
                let index = self.image.tree.child_count(root);
                let id = self.image.tree.insert(node, root, index).ok()?;
                self.emitter.emit(NodesInsertedEvent { parent: root, nodes: vec![id] });
                id
            }
        };
        self.record(source, Edit::SelectOpaque);
        self.emitter.emit(NodeDataChangedEvent(mask));
        Some(mask)
    }
}
