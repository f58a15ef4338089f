//! Layer box - the layer panel
//!
//! Tree view of the image's layers and masks with the stacking controls
//! (add, raise, lower, indent, remove), opacity and blend mode editors.

mod context_menu;
mod layer_box;
mod layer_box_events;
mod layer_box_state;
mod layer_box_ui;

pub use context_menu::*;
pub use layer_box::{
    ACTION_LAYER_PROPERTIES, ACTION_MOVE_LAYER_LEFT, ACTION_MOVE_LAYER_RIGHT, ACTION_REMOVE_LAYER,
    ACTION_SELECT_OPAQUE, ACTION_SHOW_GLOBAL_SELECTION, LayerBox, LayerBoxContext, PANEL_ACTIONS,
};
pub use layer_box_events::PanelSignal;
pub use layer_box_state::{LayerBoxWidgets, ViewMode};
pub use layer_box_ui::{render, render_rows};
