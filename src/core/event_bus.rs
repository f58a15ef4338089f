//! Pub/Sub Event Bus for decoupled component communication.
//!
//! Architecture:
//! - Components subscribe to event types with callbacks (immediate invocation)
//! - subscribe() hands back a [`SubscriptionId`]; the subscriber keeps it and
//!   passes it to unsubscribe() when it goes away
//! - emit() invokes every callback registered for the event type, in order
//!
//! Callback order: FIFO (first-subscribed, first-called) within same event type.
//! Cross-type order undefined - don't rely on ordering between different event types.
//!
//! emit() snapshots the callback list first, so a callback may subscribe or
//! unsubscribe; the change applies from the next emit(). Callbacks that need
//! to mutate their owner should record the event and act on it later (see
//! `LayerBox::process_events`).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

// Blanket impl for all qualifying types
impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Type-erased callback
type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    serial: u64,
}

#[derive(Default)]
struct Subscribers {
    by_type: HashMap<TypeId, Vec<(u64, Callback)>>,
}

/// Pub/Sub Event Bus.
///
/// Cloning yields another handle to the same subscriber table.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<Subscribers>>,
    next_serial: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Subscribers::default())),
            next_serial: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to events of type E.
    ///
    /// Callback is invoked immediately when emit() is called.
    /// Use Arc<Mutex<State>> in the callback for state mutations.
    ///
    /// # Example
    /// ```ignore
    /// let inbox = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&inbox);
    /// let id = event_bus.subscribe::<MyEvent, _>(move |e| {
    ///     sink.lock().unwrap().push(e.clone());
    /// });
    /// // ...
    /// event_bus.unsubscribe(id);
    /// ```
    pub fn subscribe<E, F>(&self, callback: F) -> SubscriptionId
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .by_type
            .entry(type_id)
            .or_default()
            .push((serial, wrapped));
        log::trace!("EventBus: subscribed #{} to {}", serial, std::any::type_name::<E>());
        SubscriptionId { type_id, serial }
    }

    /// Remove one subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let Some(list) = subs.by_type.get_mut(&id.type_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|(serial, _)| *serial != id.serial);
        let removed = list.len() != before;
        if list.is_empty() {
            subs.by_type.remove(&id.type_id);
        }
        removed
    }

    /// Invoke every callback subscribed to E.
    pub fn emit<E: Event>(&self, event: E) {
        emit_to(&self.subscribers, &event);
    }

    /// Get an emitter handle for passing to models and managers.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            subscribers: Some(Arc::clone(&self.subscribers)),
        }
    }

    /// Clear subscribers for type E
    pub fn unsubscribe_all<E: Event>(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .by_type
            .remove(&TypeId::of::<E>());
    }

    /// Clear all subscribers
    pub fn clear(&self) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).by_type.clear();
    }

    /// Check if there are subscribers for event type E
    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_type
            .get(&TypeId::of::<E>())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// Total number of live subscriptions across all event types
    pub fn subscription_count(&self) -> usize {
        self.subscribers
            .read()
            .map(|s| s.by_type.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

fn emit_to<E: Event>(subscribers: &RwLock<Subscribers>, event: &E) {
    let type_id = TypeId::of::<E>();
    // Snapshot so a slow callback doesn't hold the table
    let callbacks: Vec<Callback> = match subscribers
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .by_type
        .get(&type_id)
    {
        Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
        None => return,
    };
    for cb in callbacks {
        cb(event);
    }
}

/// Lightweight emitter handle.
///
/// Can be cloned and passed to models and managers for emitting events.
/// [`EventEmitter::dummy`] drops everything it is given, for components
/// that are not yet wired to a bus.
#[derive(Clone, Default)]
pub struct EventEmitter {
    subscribers: Option<Arc<RwLock<Subscribers>>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("connected", &self.subscribers.is_some())
            .finish()
    }
}

impl EventEmitter {
    /// Create a no-op emitter (for initialization before event system is ready)
    pub fn dummy() -> Self {
        Self { subscribers: None }
    }

    /// Emit event to the bus this handle came from (no-op if dummy)
    pub fn emit<E: Event>(&self, event: E) {
        if let Some(subs) = &self.subscribers {
            emit_to(subs, &event);
        }
    }
}
