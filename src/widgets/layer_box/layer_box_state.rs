//! Layer panel - widget state.
//!
//! Everything a renderer needs to draw the panel: which controls are
//! enabled, what the opacity spinner and composite combo show, the list's
//! current row, selection and collapsed rows, and the view mode.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::composite_op::CompositeOp;
use crate::entities::node::NodeId;

/// Row presentation of the layer list. Exactly one is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Minimal,
    #[default]
    Detailed,
    Thumbnail,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewMode::Minimal => "minimal",
            ViewMode::Detailed => "detailed",
            ViewMode::Thumbnail => "thumbnail",
        };
        f.write_str(s)
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Ok(ViewMode::Minimal),
            "detailed" => Ok(ViewMode::Detailed),
            "thumbnail" | "thumbnails" => Ok(ViewMode::Thumbnail),
            other => Err(format!("unknown view mode '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LayerBoxWidgets {
    /// List view's current row
    pub current: Option<NodeId>,
    pub selection: Vec<NodeId>,
    /// Rows shown collapsed
    pub collapsed: HashSet<NodeId>,
    pub view_mode: ViewMode,

    pub add_enabled: bool,
    pub raise_enabled: bool,
    pub lower_enabled: bool,
    pub duplicate_enabled: bool,
    pub properties_enabled: bool,

    pub opacity_enabled: bool,
    /// Spinner value, 0..=100
    pub opacity: f64,

    pub composite_enabled: bool,
    /// Combo entries, validated against the active color space
    pub composite_ops: Vec<&'static CompositeOp>,
    pub composite_op: Option<&'static str>,
}

impl Default for LayerBoxWidgets {
    fn default() -> Self {
        Self {
            current: None,
            selection: Vec::new(),
            collapsed: HashSet::new(),
            view_mode: ViewMode::default(),
            add_enabled: true,
            raise_enabled: false,
            lower_enabled: false,
            duplicate_enabled: true,
            properties_enabled: true,
            opacity_enabled: false,
            opacity: 100.0,
            composite_enabled: false,
            composite_ops: Vec::new(),
            composite_op: None,
        }
    }
}

impl LayerBoxWidgets {
    /// Gate the controls that only work on a single selected node.
    ///
    /// Runs after the node-dependent enable states are computed: a single
    /// selection keeps them, a multi-selection turns them all off.
    pub fn apply_selection_gate(&mut self) {
        let single = self.selection.len() <= 1;
        self.add_enabled = single;
        self.duplicate_enabled = single;
        self.properties_enabled = single;
        if !single {
            self.raise_enabled = false;
            self.lower_enabled = false;
            self.composite_enabled = false;
            self.opacity_enabled = false;
        }
    }

    pub fn is_collapsed(&self, node: NodeId) -> bool {
        self.collapsed.contains(&node)
    }
}
