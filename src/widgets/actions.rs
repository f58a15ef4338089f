//! Named actions and the host-side action manager.
//!
//! A panel owns a handful of [`Action`]s. While attached it lends them to
//! the host's [`ActionManager`] so menus and shortcuts can trigger them by
//! name; on detach it takes them back.
//!
//! Triggering an action emits [`ActionTriggeredEvent`]; whoever owns the
//! action subscribes to that and does the work.

use indexmap::IndexMap;

use crate::core::event_bus::EventEmitter;

/// When an action makes sense at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Activation {
    #[default]
    Always,
    ActiveNode,
    ActiveLayer,
    ActiveMask,
}

/// Extra requirement on top of [`Activation`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Condition {
    #[default]
    None,
    ActiveNodeEditable,
}

/// Snapshot of the active node the enable rules are evaluated against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionState {
    pub has_active_node: bool,
    pub active_is_layer: bool,
    pub active_is_mask: bool,
    pub active_editable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    pub name: String,
    pub text: String,
    pub enabled: bool,
    pub checkable: bool,
    pub checked: bool,
    pub activation: Activation,
    pub condition: Condition,
}

impl Action {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            enabled: true,
            checkable: false,
            checked: false,
            activation: Activation::Always,
            condition: Condition::None,
        }
    }

    pub fn checkable(mut self, checked: bool) -> Self {
        self.checkable = true;
        self.checked = checked;
        self
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Would this action be enabled for `state`?
    pub fn allowed(&self, state: &ActionState) -> bool {
        let active_ok = match self.activation {
            Activation::Always => true,
            Activation::ActiveNode => state.has_active_node,
            Activation::ActiveLayer => state.active_is_layer,
            Activation::ActiveMask => state.active_is_mask,
        };
        let condition_ok = match self.condition {
            Condition::None => true,
            Condition::ActiveNodeEditable => state.active_editable,
        };
        active_ok && condition_ok
    }
}

/// Emitted when an action fires, from a button or from the host.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionTriggeredEvent {
    pub name: String,
    /// New checked state for checkable actions
    pub checked: bool,
}

/// Host-side action registry, keyed by name in registration order.
#[derive(Debug, Default)]
pub struct ActionManager {
    actions: IndexMap<String, Action>,
    emitter: EventEmitter,
}

impl ActionManager {
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            actions: IndexMap::new(),
            emitter,
        }
    }

    /// Register `action`; an action of the same name is replaced.
    pub fn add_action(&mut self, action: Action) {
        log::trace!("ActionManager: add '{}'", action.name);
        self.actions.insert(action.name.clone(), action);
    }

    /// Hand an action back to its owner
    pub fn take_action(&mut self, name: &str) -> Option<Action> {
        log::trace!("ActionManager: take '{}'", name);
        self.actions.shift_remove(name)
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(action) = self.actions.get_mut(name) {
            action.enabled = enabled;
        }
    }

    /// Set the checked state without firing
    pub fn set_checked(&mut self, name: &str, checked: bool) {
        if let Some(action) = self.actions.get_mut(name).filter(|a| a.checkable) {
            action.checked = checked;
        }
    }

    /// Fire `name`. Disabled or unknown actions do nothing and return false.
    /// Checkable actions flip their checked state first.
    pub fn trigger(&mut self, name: &str) -> bool {
        let Some(action) = self.actions.get_mut(name) else {
            log::debug!("ActionManager: no action '{}'", name);
            return false;
        };
        if !action.enabled {
            log::debug!("ActionManager: '{}' is disabled", name);
            return false;
        }
        if action.checkable {
            action.checked = !action.checked;
        }
        let event = ActionTriggeredEvent {
            name: action.name.clone(),
            checked: action.checked,
        };
        self.emitter.emit(event);
        true
    }

    /// Re-evaluate every action's enabled state against `state`
    pub fn update_gui(&mut self, state: &ActionState) {
        for action in self.actions.values_mut() {
            action.enabled = action.allowed(state);
        }
    }
}
