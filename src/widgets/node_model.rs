//! Node list model - display projection of the node tree.
//!
//! The tree stores children bottom to top; a layer list shows them top
//! first. This model does the translation in both directions and is the
//! only place that knows about display rows.
//!
//! A selection mask sitting directly under the root (the global selection)
//! is hidden unless `show_global_selection` is on.
//!
//! User gestures on rows (activation, isolate toggle, drops) are turned into
//! events; the model never touches the tree.

use crate::core::event_bus::EventEmitter;
use crate::entities::node::{NodeId, NodeKind};
use crate::entities::node_events::{
    ModelResetEvent, NodeActivatedEvent, RequestAddNodeEvent, RequestMoveNodeEvent, ToggleIsolateEvent,
};
use crate::entities::node_tree::NodeTree;

/// Display position: `row` among the visible children of `parent`, top row 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelIndex {
    pub parent: NodeId,
    pub row: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NodeModel {
    show_global_selection: bool,
    emitter: EventEmitter,
}

impl NodeModel {
    pub fn new(show_global_selection: bool, emitter: EventEmitter) -> Self {
        Self {
            show_global_selection,
            emitter,
        }
    }

    /// Point the model at another bus (or a dummy when the panel detaches)
    pub fn set_emitter(&mut self, emitter: EventEmitter) {
        self.emitter = emitter;
    }

    pub fn show_global_selection(&self) -> bool {
        self.show_global_selection
    }

    /// Flip global selection visibility. Rows change, so the model resets.
    pub fn set_show_global_selection(&mut self, show: bool) {
        if self.show_global_selection != show {
            self.show_global_selection = show;
            self.emitter.emit(ModelResetEvent);
        }
    }

    fn is_hidden(&self, tree: &NodeTree, node: NodeId) -> bool {
        !self.show_global_selection
            && tree.parent(node) == Some(tree.root())
            && tree.kind(node).is_some_and(|k| k.is_selection_mask())
    }

    /// Visible children of `parent`, top first
    pub fn visible_children(&self, tree: &NodeTree, parent: NodeId) -> Vec<NodeId> {
        tree.children(parent)
            .iter()
            .rev()
            .copied()
            .filter(|c| !self.is_hidden(tree, *c))
            .collect()
    }

    pub fn row_count(&self, tree: &NodeTree, parent: NodeId) -> usize {
        self.visible_children(tree, parent).len()
    }

    pub fn index(&self, tree: &NodeTree, parent: NodeId, row: usize) -> Option<ModelIndex> {
        (row < self.row_count(tree, parent)).then_some(ModelIndex { parent, row })
    }

    pub fn index_from_node(&self, tree: &NodeTree, node: NodeId) -> Option<ModelIndex> {
        let parent = tree.parent(node)?;
        let row = self.visible_children(tree, parent).iter().position(|c| *c == node)?;
        Some(ModelIndex { parent, row })
    }

    pub fn node_from_index(&self, tree: &NodeTree, index: ModelIndex) -> Option<NodeId> {
        self.visible_children(tree, index.parent).get(index.row).copied()
    }

    /// Same parent, other row. None when that row doesn't exist.
    pub fn sibling(&self, tree: &NodeTree, index: ModelIndex, row: usize) -> Option<ModelIndex> {
        self.index(tree, index.parent, row)
    }

    /// Every visible row depth-first, top first, with its depth
    pub fn rows(&self, tree: &NodeTree) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        self.collect_rows(tree, tree.root(), 0, &mut out);
        out
    }

    fn collect_rows(&self, tree: &NodeTree, parent: NodeId, depth: usize, out: &mut Vec<(NodeId, usize)>) {
        for child in self.visible_children(tree, parent) {
            out.push((child, depth));
            self.collect_rows(tree, child, depth + 1, out);
        }
    }

    /// Stacking index for something dropped at display `row` under `parent`.
    ///
    /// The dropped item lands directly above the row it was dropped on; past
    /// the last row it goes to the bottom.
    pub fn drop_index(&self, tree: &NodeTree, parent: NodeId, row: usize) -> usize {
        match self.visible_children(tree, parent).get(row) {
            Some(below) => tree.index_of(*below).map_or(0, |i| i + 1),
            None => 0,
        }
    }

    // -- Gestures --

    /// Row clicked
    pub fn activate(&self, tree: &NodeTree, index: ModelIndex) {
        if let Some(node) = self.node_from_index(tree, index) {
            self.emitter.emit(NodeActivatedEvent(node));
        }
    }

    pub fn toggle_isolate(&self, tree: &NodeTree, index: ModelIndex) {
        if let Some(node) = self.node_from_index(tree, index) {
            self.emitter.emit(ToggleIsolateEvent(node));
        }
    }

    /// Existing `node` dropped at display `row` under `parent`
    pub fn request_move(&self, tree: &NodeTree, node: NodeId, parent: NodeId, row: usize) {
        let mut index = self.drop_index(tree, parent, row);
        // the tree detaches before inserting
        if tree.parent(node) == Some(parent)
            && let Some(old) = tree.index_of(node)
            && old < index
        {
            index -= 1;
        }
        self.emitter.emit(RequestMoveNodeEvent { node, parent, index });
    }

    /// New node of `kind` dropped at display `row` under `parent`
    pub fn request_add(&self, tree: &NodeTree, kind: NodeKind, name: &str, parent: NodeId, row: usize) {
        let index = self.drop_index(tree, parent, row);
        self.emitter.emit(RequestAddNodeEvent {
            kind,
            name: name.to_string(),
            parent,
            index,
        });
    }
}
