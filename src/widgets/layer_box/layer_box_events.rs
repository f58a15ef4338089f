//! Layer panel inbox.
//!
//! Bus callbacks only record a [`PanelSignal`]; the panel applies them in
//! `LayerBox::process_events`, outside any lock held by whoever emitted.

use crate::entities::node::{NodeId, NodeKind};

#[derive(Clone, Debug, PartialEq)]
pub enum PanelSignal {
    RowsInserted,
    RowsRemoved,
    RowMoved,
    DataChanged,
    ModelReset,
    CollapsedChanged,
    ImageDeleted,
    /// Manager wants the view to show another active node
    UiNeedChangeActiveNode(Option<NodeId>),
    /// Row activated in the view
    NodeActivated(NodeId),
    ToggleIsolate(NodeId),
    AddNode {
        kind: NodeKind,
        name: String,
        parent: NodeId,
        index: usize,
    },
    MoveNode {
        node: NodeId,
        parent: NodeId,
        index: usize,
    },
    Action {
        name: String,
        checked: bool,
    },
}
