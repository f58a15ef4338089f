//! Core modules - event bus, debouncing, node manager
//!
//! These modules know nothing about the panel that drives them.

pub mod debounce;
pub mod event_bus;
pub mod node_manager;

// Re-exports for convenience
pub use debounce::Debouncer;
pub use event_bus::{EventBus, EventEmitter, SubscriptionId};
pub use node_manager::{ImageNodeManager, NodeManager};
