//! layerbox - headless layers panel library
//!
//! Re-exports all modules for use by the binary target.

// Core (events, debounce, node manager)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod help;
pub mod prefs;
pub mod shapes;
pub mod shell;
pub mod widgets;

// Re-export commonly used types from core
pub use core::event_bus::{EventBus, EventEmitter, SubscriptionId};
pub use core::node_manager::{ImageNodeManager, NodeManager};

// Re-export entities
pub use entities::{Image, Node, NodeId, NodeKind, NodeTree};
pub use widgets::layer_box::{LayerBox, LayerBoxContext};
