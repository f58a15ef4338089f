//! Node tree events.
//!
//! Three groups:
//! - **Tree notifications** emitted by the node manager after it mutated the
//!   tree (inserted / removed / moved / data changed / collapsed changed)
//! - **Model notifications** emitted by the list model (reset, activation,
//!   drag-and-drop requests, isolate toggles)
//! - **Manager requests to the UI** ([`UiNeedChangeActiveNodeEvent`])
//!
//! The layer panel subscribes to all of them on attach.

use super::node::{NodeId, NodeKind};

// === Tree Notifications ===

/// Rows were inserted under `parent`.
#[derive(Clone, Debug)]
pub struct NodesInsertedEvent {
    pub parent: NodeId,
    pub nodes: Vec<NodeId>,
}

/// Rows were removed from under `parent`.
#[derive(Clone, Debug)]
pub struct NodesRemovedEvent {
    pub parent: NodeId,
    pub nodes: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct NodeMovedEvent {
    pub node: NodeId,
    pub old_parent: NodeId,
    pub new_parent: NodeId,
    pub new_index: usize,
}

/// Node properties changed (opacity, composite op, name, lock, visibility).
#[derive(Clone, Debug)]
pub struct NodeDataChangedEvent(pub NodeId);

#[derive(Clone, Debug)]
pub struct NodeCollapsedChangedEvent {
    pub node: NodeId,
    pub collapsed: bool,
}

/// The image is going away; holders of node ids must let go.
#[derive(Clone, Debug)]
pub struct ImageAboutToBeDeletedEvent;

// === Model Notifications ===

/// The whole projection changed (e.g. global selection visibility flipped).
#[derive(Clone, Debug)]
pub struct ModelResetEvent;

/// A row was activated in the view (click).
#[derive(Clone, Debug)]
pub struct NodeActivatedEvent(pub NodeId);

#[derive(Clone, Debug)]
pub struct ToggleIsolateEvent(pub NodeId);

/// Drop of an existing node onto the view.
#[derive(Clone, Debug)]
pub struct RequestMoveNodeEvent {
    pub node: NodeId,
    pub parent: NodeId,
    pub index: usize,
}

/// Drop of a new node (from outside the view).
#[derive(Clone, Debug)]
pub struct RequestAddNodeEvent {
    pub kind: NodeKind,
    pub name: String,
    pub parent: NodeId,
    pub index: usize,
}

// === Manager -> UI ===

/// The manager activated a node on its own; the view should follow.
#[derive(Clone, Debug)]
pub struct UiNeedChangeActiveNodeEvent(pub Option<NodeId>);

/// Properties dialog requested for these nodes (no dialog here, hosts listen).
#[derive(Clone, Debug)]
pub struct PropertiesRequestedEvent(pub Vec<NodeId>);
