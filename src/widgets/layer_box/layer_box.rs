//! Layer panel controller.
//!
//! Binds the node list model to the image's node tree through a
//! [`NodeManager`]: user gestures become manager commands, manager and model
//! notifications become widget state.
//!
//! # Lifecycle
//!
//! - [`LayerBox::attach`] subscribes to every notification it needs, lends its
//!   actions to the host [`ActionManager`] and does a cold start.
//! - [`LayerBox::detach`] takes the actions back and drops every
//!   subscription made in attach. Dropping the panel detaches it.
//!
//! # Event flow
//!
//! Bus callbacks never touch the panel. They push a [`PanelSignal`] into the
//! inbox and [`LayerBox::process_events`] applies them later. Every command
//! processes the inbox before returning, so callers see a settled state.
//!
//! # Stacking order
//!
//! Child index 0 is the bottom-most child. "Raise" moves a node towards the
//! end of its parent's children, "lower" towards the start.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::core::debounce::Debouncer;
use crate::core::event_bus::{Event, EventBus, EventEmitter, SubscriptionId};
use crate::core::node_manager::NodeManager;
use crate::entities::composite_op::find_op;
use crate::entities::node::{Node, NodeId, NodeKind};
use crate::entities::node_events::*;
use crate::entities::node_tree::NodeTree;
use crate::prefs::LayerBoxSettings;
use crate::widgets::actions::{Action, ActionManager, ActionState, ActionTriggeredEvent, Activation, Condition};
use crate::widgets::node_model::{ModelIndex, NodeModel};

use super::context_menu::*;
use super::layer_box_events::PanelSignal;
use super::layer_box_state::{LayerBoxWidgets, ViewMode};

pub const ACTION_REMOVE_LAYER: &str = CMD_REMOVE;
pub const ACTION_MOVE_LAYER_LEFT: &str = "move_layer_left";
pub const ACTION_MOVE_LAYER_RIGHT: &str = "move_layer_right";
pub const ACTION_LAYER_PROPERTIES: &str = CMD_PROPERTIES;
pub const ACTION_SELECT_OPAQUE: &str = CMD_SELECT_OPAQUE;
pub const ACTION_SHOW_GLOBAL_SELECTION: &str = "show-global-selection-mask";

/// Actions the panel lends to the host while attached
pub const PANEL_ACTIONS: [&str; 6] = [
    ACTION_REMOVE_LAYER,
    ACTION_MOVE_LAYER_LEFT,
    ACTION_MOVE_LAYER_RIGHT,
    ACTION_LAYER_PROPERTIES,
    ACTION_SELECT_OPAQUE,
    ACTION_SHOW_GLOBAL_SELECTION,
];

/// What the panel is attached to.
#[derive(Clone)]
pub struct LayerBoxContext {
    pub manager: Arc<Mutex<dyn NodeManager>>,
    pub bus: EventBus,
    pub actions: Arc<Mutex<ActionManager>>,
}

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Raise/lower resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// Swap with the neighbouring sibling
    Swap,
    /// Leave the parent for the grandparent
    Escalate { node: NodeId, parent: NodeId, index: usize },
}

pub struct LayerBox {
    context: Option<LayerBoxContext>,
    model: NodeModel,
    widgets: LayerBoxWidgets,
    /// Actions owned while detached
    actions: Vec<Action>,
    subscriptions: Vec<SubscriptionId>,
    inbox: Arc<Mutex<Vec<PanelSignal>>>,
    opacity_delay: Debouncer<f64>,
    processing: bool,
}

impl LayerBox {
    pub fn new(settings: &LayerBoxSettings) -> Self {
        let widgets = LayerBoxWidgets {
            view_mode: settings.view_mode,
            ..Default::default()
        };
        Self {
            context: None,
            model: NodeModel::new(settings.show_global_selection, EventEmitter::dummy()),
            widgets,
            actions: Self::create_actions(settings.show_global_selection),
            subscriptions: Vec::new(),
            inbox: Arc::default(),
            opacity_delay: Debouncer::new(settings.opacity_delay_ms),
            processing: false,
        }
    }

    fn create_actions(show_global_selection: bool) -> Vec<Action> {
        vec![
            Action::new(ACTION_REMOVE_LAYER, "&Remove Layer")
                .activation(Activation::ActiveNode)
                .condition(Condition::ActiveNodeEditable),
            Action::new(ACTION_MOVE_LAYER_LEFT, "Move Layer Left")
                .activation(Activation::ActiveNode)
                .condition(Condition::ActiveNodeEditable),
            Action::new(ACTION_MOVE_LAYER_RIGHT, "Move Layer Right")
                .activation(Activation::ActiveNode)
                .condition(Condition::ActiveNodeEditable),
            Action::new(ACTION_LAYER_PROPERTIES, "&Properties...").activation(Activation::ActiveNode),
            Action::new(ACTION_SELECT_OPAQUE, "&Select Opaque").activation(Activation::ActiveLayer),
            Action::new(ACTION_SHOW_GLOBAL_SELECTION, "&Show Global Selection Mask").checkable(show_global_selection),
        ]
    }

    // -- Accessors --

    pub fn is_attached(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> Option<&LayerBoxContext> {
        self.context.as_ref()
    }

    pub fn model(&self) -> &NodeModel {
        &self.model
    }

    pub fn widgets(&self) -> &LayerBoxWidgets {
        &self.widgets
    }

    /// Actions currently held by the panel (empty while attached)
    pub fn owned_actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn manager(&self) -> Option<Arc<Mutex<dyn NodeManager>>> {
        self.context.as_ref().map(|c| Arc::clone(&c.manager))
    }

    /// Run `f` against the manager, then settle. No-op when detached.
    fn with_manager(&mut self, f: impl FnOnce(&mut dyn NodeManager)) {
        let Some(mgr) = self.manager() else {
            return;
        };
        f(&mut *lock(&mgr));
        self.process_events();
    }

    // -- Lifecycle --

    pub fn attach(&mut self, context: LayerBoxContext) {
        if self.context.is_some() {
            self.detach();
        }

        let bus = context.bus.clone();
        self.model.set_emitter(bus.emitter());

        self.subscribe::<NodesInsertedEvent, _>(&bus, |_| PanelSignal::RowsInserted);
        self.subscribe::<NodesRemovedEvent, _>(&bus, |_| PanelSignal::RowsRemoved);
        self.subscribe::<NodeMovedEvent, _>(&bus, |_| PanelSignal::RowMoved);
        self.subscribe::<NodeDataChangedEvent, _>(&bus, |_| PanelSignal::DataChanged);
        self.subscribe::<ModelResetEvent, _>(&bus, |_| PanelSignal::ModelReset);
        self.subscribe::<NodeCollapsedChangedEvent, _>(&bus, |_| PanelSignal::CollapsedChanged);
        self.subscribe::<ImageAboutToBeDeletedEvent, _>(&bus, |_| PanelSignal::ImageDeleted);
        self.subscribe::<UiNeedChangeActiveNodeEvent, _>(&bus, |e| PanelSignal::UiNeedChangeActiveNode(e.0));
        self.subscribe::<NodeActivatedEvent, _>(&bus, |e| PanelSignal::NodeActivated(e.0));
        self.subscribe::<ToggleIsolateEvent, _>(&bus, |e| PanelSignal::ToggleIsolate(e.0));
        self.subscribe::<RequestAddNodeEvent, _>(&bus, |e| PanelSignal::AddNode {
            kind: e.kind,
            name: e.name.clone(),
            parent: e.parent,
            index: e.index,
        });
        self.subscribe::<RequestMoveNodeEvent, _>(&bus, |e| PanelSignal::MoveNode {
            node: e.node,
            parent: e.parent,
            index: e.index,
        });
        self.subscribe::<ActionTriggeredEvent, _>(&bus, |e| PanelSignal::Action {
            name: e.name.clone(),
            checked: e.checked,
        });

        {
            let mut host = lock(&context.actions);
            for action in self.actions.drain(..) {
                host.add_action(action);
            }
        }

        let active = lock(&context.manager).active_node();
        self.context = Some(context);
        log::info!("LayerBox: attached ({} subscriptions)", self.subscriptions.len());

        // cold start
        self.set_current_node(active);
        self.sync_collapsed();
        self.process_events();
    }

    fn subscribe<E, F>(&mut self, bus: &EventBus, signal: F)
    where
        E: Event,
        F: Fn(&E) -> PanelSignal + Send + Sync + 'static,
    {
        let inbox = Arc::clone(&self.inbox);
        let id = bus.subscribe::<E, _>(move |e| lock(&inbox).push(signal(e)));
        self.subscriptions.push(id);
    }

    pub fn detach(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };

        {
            let mut host = lock(&context.actions);
            for name in PANEL_ACTIONS {
                if let Some(action) = host.take_action(name) {
                    self.actions.push(action);
                }
            }
        }
        // the host may have dropped some
        for action in Self::create_actions(self.model.show_global_selection()) {
            if !self.actions.iter().any(|a| a.name == action.name) {
                self.actions.push(action);
            }
        }

        for id in self.subscriptions.drain(..) {
            context.bus.unsubscribe(id);
        }
        self.model.set_emitter(EventEmitter::dummy());
        self.opacity_delay.cancel();
        lock(&self.inbox).clear();

        self.widgets.current = None;
        self.widgets.selection.clear();
        self.widgets.collapsed.clear();
        log::info!("LayerBox: detached");
    }

    fn notify_image_deleted(&mut self) {
        log::info!("LayerBox: image deleted");
        self.detach();
    }

    /// Apply every recorded notification. Re-entrant calls return at once;
    /// the outer call picks up whatever they would have handled.
    pub fn process_events(&mut self) {
        if self.processing {
            return;
        }
        self.processing = true;
        loop {
            let batch = std::mem::take(&mut *lock(&self.inbox));
            if batch.is_empty() || self.context.is_none() {
                break;
            }
            for signal in batch {
                if self.context.is_none() {
                    break;
                }
                self.handle(signal);
            }
        }
        self.processing = false;
    }

    fn handle(&mut self, signal: PanelSignal) {
        log::trace!("LayerBox: {:?}", signal);
        match signal {
            PanelSignal::RowsInserted
            | PanelSignal::RowsRemoved
            | PanelSignal::RowMoved
            | PanelSignal::DataChanged
            | PanelSignal::ModelReset => self.update_ui(),
            PanelSignal::CollapsedChanged => self.sync_collapsed(),
            PanelSignal::ImageDeleted => self.notify_image_deleted(),
            PanelSignal::UiNeedChangeActiveNode(node) => self.set_current_node(node),
            PanelSignal::NodeActivated(node) => {
                if let Some(mgr) = self.manager() {
                    let mut m = lock(&mgr);
                    m.slot_ui_activated_node(Some(node));
                    m.set_selected_nodes(vec![node]);
                }
                self.widgets.current = Some(node);
                self.widgets.selection = vec![node];
                self.update_ui();
            }
            PanelSignal::ToggleIsolate(node) => self.with_manager(|m| {
                if m.active_node() != Some(node) {
                    m.slot_ui_activated_node(Some(node));
                }
                m.toggle_isolate_active_node();
            }),
            PanelSignal::AddNode {
                kind,
                name,
                parent,
                index,
            } => self.with_manager(|m| {
                m.add_node_direct(Node::new(kind, name), parent, index);
            }),
            PanelSignal::MoveNode { node, parent, index } => self.with_manager(|m| {
                m.move_node_direct(node, parent, index);
            }),
            PanelSignal::Action { name, checked } => self.action_triggered(&name, checked),
        }
    }

    fn action_triggered(&mut self, name: &str, checked: bool) {
        match name {
            ACTION_SHOW_GLOBAL_SELECTION => self.edit_global_selection(checked),
            n if PANEL_ACTIONS.iter().any(|a| *a == n) => {
                self.run_command(n);
            }
            _ => {}
        }
    }

    // -- View sync --

    /// Re-derive every control from the active node.
    pub fn update_ui(&mut self) {
        let Some(mgr) = self.manager() else {
            return;
        };
        let state = {
            let m = lock(&mgr);
            let image = m.image();
            let tree = &image.tree;
            let root = tree.root();
            let w = &mut self.widgets;

            let active = m.active_node().filter(|a| tree.contains(*a));
            let editable = active.is_some_and(|a| tree.is_editable(a));
            let below_root = active.and_then(|a| tree.parent(a)).is_some_and(|p| p != root);

            w.raise_enabled = editable && (active.and_then(|a| tree.next_sibling(a)).is_some() || below_root);
            w.lower_enabled = editable && (active.and_then(|a| tree.prev_sibling(a)).is_some() || below_root);
            w.opacity_enabled = editable;
            w.composite_enabled = editable;

            let mut state = ActionState {
                has_active_node: active.is_some(),
                active_editable: editable,
                ..Default::default()
            };

            if let Some(node) = active.and_then(|a| tree.get(a)) {
                let color_space = if m.active_paint_device().is_some() {
                    m.active_color_space()
                } else {
                    image.color_space
                };
                w.composite_ops = color_space.composite_ops();
                state.active_is_layer = node.is_layer();
                state.active_is_mask = node.is_mask();

                if node.is_mask() {
                    w.composite_enabled = false;
                    w.opacity_enabled = false;
                } else {
                    w.opacity = node.opacity_percent();
                    match node.composite_op.as_deref().and_then(find_op) {
                        Some(op) => w.composite_op = Some(op.id),
                        None => {
                            w.composite_op = None;
                            w.composite_enabled = false;
                        }
                    }
                }
            }
            w.apply_selection_gate();
            state
        };
        if let Some(ctx) = &self.context {
            lock(&ctx.actions).update_gui(&state);
        }
    }

    /// Point the list at `node`. Used when non-UI code changed the active node.
    pub fn set_current_node(&mut self, node: Option<NodeId>) {
        if let Some(mgr) = self.manager() {
            let m = lock(&mgr);
            let tree = &m.image().tree;
            self.widgets.current = node.filter(|n| self.model.index_from_node(tree, *n).is_some());
            self.widgets.selection = self.widgets.current.into_iter().collect();
        }
        self.update_ui();
    }

    /// Expand everything, then collapse the nodes flagged collapsed.
    fn sync_collapsed(&mut self) {
        let Some(mgr) = self.manager() else {
            return;
        };
        let m = lock(&mgr);
        let tree = &m.image().tree;
        self.widgets.collapsed.clear();
        for node in tree.descendants(tree.root()) {
            if tree.get(node).is_some_and(|n| n.collapsed) && self.model.index_from_node(tree, node).is_some() {
                self.widgets.collapsed.insert(node);
            }
        }
    }

    // -- Selection / activation --

    /// Row clicked in the list
    pub fn activate_row(&mut self, index: ModelIndex) {
        let Some(mgr) = self.manager() else {
            return;
        };
        self.model.activate(&lock(&mgr).image().tree, index);
        self.process_events();
    }

    pub fn activate_node(&mut self, node: NodeId) {
        let Some(mgr) = self.manager() else {
            return;
        };
        let index = self.model.index_from_node(&lock(&mgr).image().tree, node);
        match index {
            Some(index) => self.activate_row(index),
            None => log::debug!("LayerBox: {:?} has no row", node),
        }
    }

    /// The list's selection changed to `selection`.
    pub fn selection_changed(&mut self, selection: &[ModelIndex]) {
        let Some(mgr) = self.manager() else {
            return;
        };
        {
            let mut m = lock(&mgr);
            if selection.is_empty() {
                let active = m.active_node();
                let tree = &m.image().tree;
                self.widgets.current = active.filter(|a| self.model.index_from_node(tree, *a).is_some());
                self.widgets.selection = self.widgets.current.into_iter().collect();
            } else {
                let nodes: Vec<NodeId> = {
                    let tree = &m.image().tree;
                    selection
                        .iter()
                        .filter_map(|i| self.model.node_from_index(tree, *i))
                        .collect()
                };
                m.set_selected_nodes(nodes.clone());
                self.widgets.selection = nodes;
            }
        }
        self.process_events();
        self.update_ui();
    }

    /// Select `nodes` as if picked in the list. Hidden nodes are skipped.
    pub fn select_nodes(&mut self, nodes: &[NodeId]) {
        let Some(mgr) = self.manager() else {
            return;
        };
        let indices: Vec<ModelIndex> = {
            let m = lock(&mgr);
            let tree = &m.image().tree;
            nodes
                .iter()
                .filter_map(|n| self.model.index_from_node(tree, *n))
                .collect()
        };
        self.selection_changed(&indices);
    }

    // -- Structure --

    pub fn raise_clicked(&mut self) {
        self.with_manager(|m| match raise_lower_step(m, true) {
            Some(Step::Swap) => m.raise_node(),
            Some(Step::Escalate { node, parent, index }) => {
                m.move_node_at(node, parent, index);
            }
            None => {}
        });
    }

    pub fn lower_clicked(&mut self) {
        self.with_manager(|m| match raise_lower_step(m, false) {
            Some(Step::Swap) => m.lower_node(),
            Some(Step::Escalate { node, parent, index }) => {
                m.move_node_at(node, parent, index);
            }
            None => {}
        });
    }

    /// Move each selected node out of its parent
    pub fn left_clicked(&mut self) {
        self.with_manager(|m| {
            for node in m.selected_nodes() {
                match indent_target(&m.image().tree, node) {
                    Some((parent, index)) => {
                        m.move_node_at(node, parent, index);
                    }
                    None => log::debug!("LayerBox: {:?} can't move left", node),
                }
            }
        });
    }

    /// Move each selected node into a neighbouring sibling
    pub fn right_clicked(&mut self) {
        self.with_manager(|m| {
            for node in m.selected_nodes() {
                match outdent_target(&m.image().tree, node) {
                    Some((parent, index)) => {
                        m.move_node_at(node, parent, index);
                    }
                    None => log::debug!("LayerBox: {:?} can't move right", node),
                }
            }
        });
    }

    pub fn remove_clicked(&mut self) {
        self.with_manager(|m| m.remove_node());
    }

    pub fn properties_clicked(&mut self) {
        self.with_manager(|m| {
            if let Some(active) = m.active_node() {
                m.node_properties(active);
            }
        });
    }

    pub fn duplicate_clicked(&mut self) {
        self.with_manager(|m| {
            m.duplicate_active_node();
        });
    }

    pub fn add_node(&mut self, kind: NodeKind) {
        self.with_manager(|m| {
            m.create_node(kind);
        });
    }

    pub fn merge_layer(&mut self) {
        self.with_manager(|m| {
            m.merge_layer_down();
        });
    }

    pub fn convert_active(&mut self, kind: NodeKind) {
        self.with_manager(|m| {
            m.convert_active_node(kind);
        });
    }

    pub fn toggle_isolate(&mut self) {
        self.with_manager(|m| m.toggle_isolate_active_node());
    }

    pub fn select_opaque(&mut self) {
        self.with_manager(|m| {
            m.select_opaque();
        });
    }

    /// Existing node dropped on the list at display `row` under `parent`
    pub fn drop_node(&mut self, node: NodeId, parent: NodeId, row: usize) {
        let Some(mgr) = self.manager() else {
            return;
        };
        self.model.request_move(&lock(&mgr).image().tree, node, parent, row);
        self.process_events();
    }

    /// New node dropped on the list at display `row` under `parent`
    pub fn drop_new_node(&mut self, kind: NodeKind, name: &str, parent: NodeId, row: usize) {
        let Some(mgr) = self.manager() else {
            return;
        };
        self.model.request_add(&lock(&mgr).image().tree, kind, name, parent, row);
        self.process_events();
    }

    // -- Properties --

    /// Slider moved: show the value now, commit once it settles.
    pub fn opacity_slider_moved(&mut self, value: f64) {
        self.opacity_slider_moved_at(value, Instant::now());
    }

    pub fn opacity_slider_moved_at(&mut self, value: f64, now: Instant) {
        let value = value.clamp(0.0, 100.0);
        self.widgets.opacity = value;
        self.opacity_delay.schedule_at(value, now);
    }

    /// Commit a settled opacity change. Returns true if one was committed.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        let Some(value) = self.opacity_delay.tick_at(now) else {
            return false;
        };
        let Some(mgr) = self.manager() else {
            return false;
        };
        lock(&mgr).set_node_opacity(value, true);
        self.process_events();
        true
    }

    pub fn has_pending_opacity(&self) -> bool {
        self.opacity_delay.is_pending()
    }

    /// Composite combo entry chosen
    pub fn composite_op_activated(&mut self, id: &str) {
        if !self.widgets.composite_ops.iter().any(|op| op.id == id) {
            log::debug!("LayerBox: '{}' is not in the composite list", id);
            return;
        }
        self.with_manager(|m| m.set_node_composite_op(id));
    }

    // -- View --

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        log::debug!("LayerBox: view mode {}", mode);
        self.widgets.view_mode = mode;
    }

    pub fn row_collapsed(&mut self, node: NodeId) {
        self.with_manager(|m| m.set_node_collapsed(node, true));
    }

    pub fn row_expanded(&mut self, node: NodeId) {
        self.with_manager(|m| m.set_node_collapsed(node, false));
    }

    /// Show or hide the global selection mask.
    ///
    /// Hiding it while it is active moves activation to the nearest node that
    /// stays visible; showing it activates it.
    pub fn edit_global_selection(&mut self, show: bool) {
        let Some(mgr) = self.manager() else {
            return;
        };
        let (last_active, mut activate) = {
            let m = lock(&mgr);
            let last = m.active_node();
            let activate = if show {
                last
            } else {
                last.and_then(|n| find_non_hidable_node(&m.image().tree, n))
            };
            (last, activate)
        };

        self.model.set_show_global_selection(show);
        self.set_action_checked(ACTION_SHOW_GLOBAL_SELECTION, show);

        if show {
            let mask = lock(&mgr).image().tree.global_selection_mask();
            if mask.is_some() {
                activate = mask;
            }
        }

        if let Some(node) = activate {
            if last_active != Some(node) {
                lock(&mgr).slot_non_ui_activated_node(node);
            } else {
                self.set_current_node(last_active);
            }
        }
        self.process_events();
    }

    fn set_action_checked(&mut self, name: &str, checked: bool) {
        if let Some(ctx) = &self.context {
            lock(&ctx.actions).set_checked(name, checked);
        }
        for action in self.actions.iter_mut().filter(|a| a.name == name && a.checkable) {
            action.checked = checked;
        }
    }

    fn action_enabled(&self, name: &str) -> bool {
        match &self.context {
            Some(ctx) => lock(&ctx.actions).action(name).is_some_and(|a| a.enabled),
            None => self.actions.iter().any(|a| a.name == name && a.enabled),
        }
    }

    // -- Menus --

    /// Context menu for a click on `index` (None = empty area)
    pub fn context_menu(&self, index: Option<ModelIndex>) -> ContextMenu {
        let mut menu = ContextMenu::default();

        let row = self.manager().and_then(|mgr| {
            let m = lock(&mgr);
            let tree = &m.image().tree;
            let index = index.filter(|i| self.model.node_from_index(tree, *i).is_some())?;
            let has_below = self.model.sibling(tree, index, index.row + 1).is_some();
            Some(has_below)
        });

        if let Some(has_below) = row {
            menu.push(MenuEntry::command(
                CMD_PROPERTIES,
                "&Properties...",
                self.action_enabled(ACTION_LAYER_PROPERTIES),
            ));
            menu.separator();
            menu.push(MenuEntry::command(
                CMD_REMOVE,
                "&Remove Layer",
                self.action_enabled(ACTION_REMOVE_LAYER),
            ));
            menu.push(MenuEntry::command(CMD_DUPLICATE, "&Duplicate Layer or Mask", true));
            menu.push(MenuEntry::command(CMD_MERGE_DOWN, "&Merge with Layer Below", has_below));
            menu.separator();
            menu.push(MenuEntry::Submenu {
                text: "&Convert".to_string(),
                entries: vec![
                    MenuEntry::command(CMD_CONVERT_TO_PAINT_LAYER, "to &Paint Layer", true),
                    MenuEntry::command(CMD_CONVERT_TO_TRANSPARENCY_MASK, "to &Transparency Mask", true),
                    MenuEntry::command(CMD_CONVERT_TO_FILTER_MASK, "to &Filter Mask", true),
                    MenuEntry::command(CMD_CONVERT_TO_SELECTION_MASK, "to &Selection Mask", true),
                ],
            });
            menu.push(MenuEntry::command(CMD_ISOLATE, "&Isolate Layer", true));
        }
        menu.separator();
        menu.push(MenuEntry::command(CMD_ADD_TRANSPARENCY_MASK, "&Transparency Mask", true));
        menu.push(MenuEntry::command(CMD_ADD_FILTER_MASK, "&Filter Mask...", true));
        menu.push(MenuEntry::command(CMD_ADD_SELECTION_MASK, "&Local Selection", true));
        menu.separator();
        menu.push(MenuEntry::command(
            CMD_SELECT_OPAQUE,
            "&Select Opaque",
            self.action_enabled(ACTION_SELECT_OPAQUE),
        ));
        menu
    }

    /// Menu behind the add button's arrow
    pub fn new_layer_menu(&self) -> ContextMenu {
        let mut menu = ContextMenu::default();
        for (name, text) in [
            (CMD_ADD_PAINT_LAYER, "&Paint Layer"),
            (CMD_ADD_GROUP_LAYER, "&Group Layer"),
            (CMD_ADD_CLONE_LAYER, "&Clone Layer"),
            (CMD_ADD_SHAPE_LAYER, "&Vector Layer"),
            (CMD_ADD_ADJUSTMENT_LAYER, "&Filter Layer..."),
            (CMD_ADD_FILL_LAYER, "&Fill Layer..."),
            (CMD_ADD_FILE_LAYER, "&File Layer..."),
        ] {
            menu.push(MenuEntry::command(name, text, self.widgets.add_enabled));
        }
        menu.separator();
        menu.push(MenuEntry::command(CMD_ADD_TRANSPARENCY_MASK, "&Transparency Mask", true));
        menu.push(MenuEntry::command(CMD_ADD_FILTER_MASK, "&Filter Mask...", true));
        menu.push(MenuEntry::command(CMD_ADD_SELECTION_MASK, "&Local Selection", true));
        menu
    }

    /// Run a menu / action command by name. False for unknown names.
    pub fn run_command(&mut self, name: &str) -> bool {
        match name {
            CMD_PROPERTIES => self.properties_clicked(),
            CMD_REMOVE => self.remove_clicked(),
            ACTION_MOVE_LAYER_LEFT => self.left_clicked(),
            ACTION_MOVE_LAYER_RIGHT => self.right_clicked(),
            CMD_DUPLICATE => self.duplicate_clicked(),
            CMD_MERGE_DOWN => self.merge_layer(),
            CMD_CONVERT_TO_PAINT_LAYER => self.convert_active(NodeKind::PAINT_LAYER),
            CMD_CONVERT_TO_TRANSPARENCY_MASK => self.convert_active(NodeKind::TRANSPARENCY_MASK),
            CMD_CONVERT_TO_FILTER_MASK => self.convert_active(NodeKind::FILTER_MASK),
            CMD_CONVERT_TO_SELECTION_MASK => self.convert_active(NodeKind::SELECTION_MASK),
            CMD_ISOLATE => self.toggle_isolate(),
            CMD_SELECT_OPAQUE => self.select_opaque(),
            other => match add_command_kind(other) {
                Some(kind) => self.add_node(kind),
                None => {
                    log::debug!("LayerBox: unknown command '{}'", other);
                    return false;
                }
            },
        }
        true
    }
}

impl Drop for LayerBox {
    fn drop(&mut self) {
        self.detach();
    }
}

fn raise_lower_step(m: &dyn NodeManager, raise: bool) -> Option<Step> {
    let node = m.active_node()?;
    let tree = &m.image().tree;
    if !tree.is_editable(node) {
        log::debug!("LayerBox: {:?} is not editable", node);
        return None;
    }
    let sibling = if raise { tree.next_sibling(node) } else { tree.prev_sibling(node) };
    if sibling.is_some() {
        return Some(Step::Swap);
    }
    let parent = tree.parent(node)?;
    let Some(grandparent) = tree.grandparent(node) else {
        log::debug!("LayerBox: {:?} is already at the top level", node);
        return None;
    };
    if grandparent == tree.root() && tree.kind(node).is_some_and(|k| k.is_mask()) {
        log::debug!("LayerBox: masks can't leave their layer for the root");
        return None;
    }
    let index = tree.index_of(parent)? + usize::from(raise);
    Some(Step::Escalate {
        node,
        parent: grandparent,
        index,
    })
}

/// Grandparent slot for a node leaving its parent: below the parent when it
/// sits in the lower half of the siblings (ties included), above otherwise.
pub(crate) fn indent_target(tree: &NodeTree, node: NodeId) -> Option<(NodeId, usize)> {
    let parent = tree.parent(node)?;
    let grandparent = tree.grandparent(node)?;
    if grandparent == tree.root() && tree.kind(node).is_some_and(|k| k.is_mask()) {
        return None;
    }
    let node_index = tree.index_of(node)?;
    let parent_index = tree.index_of(parent)?;
    if node_index <= tree.child_count(parent) / 2 {
        Some((grandparent, parent_index))
    } else {
        Some((grandparent, parent_index + 1))
    }
}

/// Sibling that takes the node: the one below (appended on top of its
/// children), else the one above (inserted at the bottom).
pub(crate) fn outdent_target(tree: &NodeTree, node: NodeId) -> Option<(NodeId, usize)> {
    let parent = tree.parent(node)?;
    let kind = tree.kind(node)?;
    let index = tree.index_of(node)? as isize;

    if let Some(below) = tree.child_at(parent, index - 1)
        && tree.allows_as_child(below, kind)
    {
        return Some((below, tree.child_count(below)));
    }
    if let Some(above) = tree.child_at(parent, index + 1)
        && tree.allows_as_child(above, kind)
    {
        return Some((above, 0));
    }
    None
}

/// Node to activate instead of `start` once the global selection is hidden.
///
/// Only a selection mask directly under the root needs replacing. Searches
/// previous siblings, then next siblings, then the root's children from the
/// top, skipping selection masks throughout.
pub(crate) fn find_non_hidable_node(tree: &NodeTree, start: NodeId) -> Option<NodeId> {
    let is_selection = |n: NodeId| tree.kind(n).is_some_and(|k| k.is_selection_mask());
    if !(is_selection(start) && tree.parent(start) == Some(tree.root())) {
        return Some(start);
    }

    let walk = |first: Option<NodeId>, step: &dyn Fn(NodeId) -> Option<NodeId>| {
        let mut node = first;
        while let Some(n) = node {
            if !is_selection(n) {
                break;
            }
            node = step(n);
        }
        node
    };

    let node = walk(tree.prev_sibling(start), &|n| tree.prev_sibling(n))
        .or_else(|| walk(tree.next_sibling(start), &|n| tree.next_sibling(n)))
        .or_else(|| walk(tree.last_child(tree.root()), &|n| tree.prev_sibling(n)));

    if node.is_none() {
        log::error!("LayerBox: cannot activate any node!");
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::EventBus;
    use crate::core::node_manager::{Edit, ImageNodeManager};
    use crate::entities::composite_op::ColorSpace;
    use crate::entities::image::Image;
    use crate::entities::node::{LayerKind, MaskKind};
    use std::time::Duration;

    struct Fixture {
        bus: EventBus,
        manager: Arc<Mutex<ImageNodeManager>>,
        actions: Arc<Mutex<ActionManager>>,
        panel: LayerBox,
    }

    impl Fixture {
        fn new(image: Image) -> Self {
            let bus = EventBus::new();
            let manager = Arc::new(Mutex::new(ImageNodeManager::new(image, bus.emitter())));
            let actions = Arc::new(Mutex::new(ActionManager::new(bus.emitter())));
            let mut panel = LayerBox::new(&LayerBoxSettings::default());
            panel.attach(Self::context(&bus, &manager, &actions));
            Self {
                bus,
                manager,
                actions,
                panel,
            }
        }

        fn context(
            bus: &EventBus,
            manager: &Arc<Mutex<ImageNodeManager>>,
            actions: &Arc<Mutex<ActionManager>>,
        ) -> LayerBoxContext {
            let manager: Arc<Mutex<dyn NodeManager>> = manager.clone();
            LayerBoxContext {
                manager,
                bus: bus.clone(),
                actions: Arc::clone(actions),
            }
        }

        fn id(&self, name: &str) -> NodeId {
            self.manager.lock().unwrap().tree().find_by_name(name).unwrap()
        }

        fn root(&self) -> NodeId {
            self.manager.lock().unwrap().tree().root()
        }

        fn children(&self, name: Option<&str>) -> Vec<String> {
            let mgr = self.manager.lock().unwrap();
            let tree = mgr.tree();
            let parent = match name {
                Some(n) => tree.find_by_name(n).unwrap(),
                None => tree.root(),
            };
            tree.children(parent)
                .iter()
                .map(|c| tree.get(*c).unwrap().name.clone())
                .collect()
        }

        fn activate(&mut self, name: &str) {
            let id = self.id(name);
            self.panel.activate_node(id);
            self.panel.select_nodes(&[id]);
        }

        fn active(&self) -> Option<NodeId> {
            self.manager.lock().unwrap().active_node()
        }
    }

    /// Build an image from (name, kind, parent name) triples, in order.
    fn image(nodes: &[(&str, NodeKind, Option<&str>)]) -> Image {
        let mut image = Image::default();
        for (name, kind, parent) in nodes {
            let parent = match parent {
                Some(p) => image.tree.find_by_name(p).unwrap(),
                None => image.root(),
            };
            image.tree.push(Node::new(*kind, *name), parent).unwrap();
        }
        image
    }

    const PAINT: NodeKind = NodeKind::PAINT_LAYER;
    const GROUP: NodeKind = NodeKind::GROUP_LAYER;

    /// root: [bg, group[g1, g2], top]
    fn basic() -> Image {
        image(&[
            ("bg", PAINT, None),
            ("group", GROUP, None),
            ("g1", PAINT, Some("group")),
            ("g2", PAINT, Some("group")),
            ("top", PAINT, None),
        ])
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_attach_detach_symmetry() {
        let bus = EventBus::new();
        let manager = Arc::new(Mutex::new(ImageNodeManager::new(basic(), bus.emitter())));
        let actions = Arc::new(Mutex::new(ActionManager::new(bus.emitter())));
        let before = bus.subscription_count();

        let mut panel = LayerBox::new(&LayerBoxSettings::default());
        assert_eq!(panel.owned_actions().len(), PANEL_ACTIONS.len());

        panel.attach(Fixture::context(&bus, &manager, &actions));
        let attached = bus.subscription_count();
        assert!(attached > before);
        assert_eq!(panel.subscription_count(), attached - before);
        assert!(panel.owned_actions().is_empty());
        for name in PANEL_ACTIONS {
            assert!(actions.lock().unwrap().contains(name), "{} not registered", name);
        }

        // attaching again replaces, never stacks
        panel.attach(Fixture::context(&bus, &manager, &actions));
        assert_eq!(bus.subscription_count(), attached);
        assert_eq!(actions.lock().unwrap().len(), PANEL_ACTIONS.len());

        panel.detach();
        assert_eq!(bus.subscription_count(), before);
        assert!(actions.lock().unwrap().is_empty());
        assert_eq!(panel.owned_actions().len(), PANEL_ACTIONS.len());
        assert!(!panel.is_attached());

        // dropping an attached panel cleans up too
        panel.attach(Fixture::context(&bus, &manager, &actions));
        drop(panel);
        assert_eq!(bus.subscription_count(), before);
    }

    #[test]
    fn test_cold_start_and_collapsed_rows() {
        let mut img = basic();
        let group = img.tree.find_by_name("group").unwrap();
        img.tree.get_mut(group).unwrap().collapsed = true;

        let mut fx = Fixture::new(img);
        let top = fx.id("top");
        assert_eq!(fx.panel.widgets().current, Some(top));
        assert!(fx.panel.widgets().is_collapsed(group));

        fx.panel.row_expanded(group);
        assert!(!fx.panel.widgets().is_collapsed(group));
        assert!(!fx.manager.lock().unwrap().tree().get(group).unwrap().collapsed);

        fx.panel.row_collapsed(group);
        assert!(fx.panel.widgets().is_collapsed(group));
    }

    #[test]
    fn test_raise_swaps_then_escalates() {
        let mut fx = Fixture::new(basic());

        fx.activate("g1");
        fx.panel.raise_clicked();
        assert_eq!(fx.children(Some("group")), strings(&["g2", "g1"]));

        // top of the group: out to the root, right above the group
        fx.panel.raise_clicked();
        assert_eq!(fx.children(None), strings(&["bg", "group", "g1", "top"]));
        assert_eq!(fx.children(Some("group")), strings(&["g2"]));

        // top of the root: nowhere to go
        fx.activate("top");
        fx.panel.raise_clicked();
        assert_eq!(fx.children(None), strings(&["bg", "group", "g1", "top"]));
    }

    #[test]
    fn test_lower_escalates_below_parent() {
        let mut fx = Fixture::new(basic());
        fx.activate("g1");
        fx.panel.lower_clicked();
        assert_eq!(fx.children(None), strings(&["bg", "g1", "group", "top"]));

        fx.activate("bg");
        fx.panel.lower_clicked();
        assert_eq!(fx.children(None), strings(&["bg", "g1", "group", "top"]));
    }

    #[test]
    fn test_mask_never_escalates_to_root() {
        let mut fx = Fixture::new(image(&[
            ("layer", PAINT, None),
            ("mask", NodeKind::TRANSPARENCY_MASK, Some("layer")),
        ]));
        fx.activate("mask");
        fx.panel.raise_clicked();
        fx.panel.lower_clicked();
        fx.panel.left_clicked();
        assert_eq!(fx.children(Some("layer")), strings(&["mask"]));
    }

    #[test]
    fn test_indent_halves() {
        // 4 children: index 3 goes above the parent, index 1 below
        let mut fx = Fixture::new(image(&[
            ("group", GROUP, None),
            ("c0", PAINT, Some("group")),
            ("c1", PAINT, Some("group")),
            ("c2", PAINT, Some("group")),
            ("c3", PAINT, Some("group")),
        ]));

        fx.activate("c3");
        fx.panel.left_clicked();
        assert_eq!(fx.children(None), strings(&["group", "c3"]));

        fx.activate("c1");
        fx.panel.left_clicked();
        assert_eq!(fx.children(None), strings(&["c1", "group", "c3"]));
        assert_eq!(fx.children(Some("group")), strings(&["c0", "c2"]));
    }

    #[test]
    fn test_indent_index_one_of_four() {
        let mut fx = Fixture::new(image(&[
            ("group", GROUP, None),
            ("c0", PAINT, Some("group")),
            ("c1", PAINT, Some("group")),
            ("c2", PAINT, Some("group")),
            ("c3", PAINT, Some("group")),
        ]));
        fx.activate("c1");
        fx.panel.left_clicked();
        assert_eq!(fx.children(None), strings(&["c1", "group"]));
    }

    #[test]
    fn test_indent_multiple_sequential() {
        let mut fx = Fixture::new(image(&[
            ("group", GROUP, None),
            ("c0", PAINT, Some("group")),
            ("c1", PAINT, Some("group")),
            ("c2", PAINT, Some("group")),
            ("c3", PAINT, Some("group")),
        ]));
        let (c0, c1) = (fx.id("c0"), fx.id("c1"));
        fx.panel.select_nodes(&[c0, c1]);
        assert!(!fx.panel.widgets().raise_enabled);
        fx.panel.left_clicked();
        assert_eq!(fx.children(None), strings(&["c0", "c1", "group"]));
    }

    #[test]
    fn test_outdent_prefers_below_then_above() {
        let mut fx = Fixture::new(image(&[
            ("p1", PAINT, None),
            ("p2", PAINT, None),
            ("g", GROUP, None),
        ]));

        // below is a paint layer (refuses), above is a group
        fx.activate("p2");
        fx.panel.right_clicked();
        assert_eq!(fx.children(Some("g")), strings(&["p2"]));

        // nothing below, group above: inserted at the bottom
        fx.activate("p1");
        fx.panel.right_clicked();
        assert_eq!(fx.children(Some("g")), strings(&["p1", "p2"]));
        assert_eq!(fx.children(None), strings(&["g"]));
    }

    #[test]
    fn test_outdent_into_group_below() {
        let mut fx = Fixture::new(image(&[
            ("g", GROUP, None),
            ("inner", PAINT, Some("g")),
            ("p", PAINT, None),
            ("g2", GROUP, None),
        ]));
        fx.activate("p");
        fx.panel.right_clicked();
        assert_eq!(fx.children(Some("g")), strings(&["inner", "p"]));
        assert_eq!(fx.children(Some("g2")), Vec::<String>::new());
    }

    #[test]
    fn test_outdent_neither_accepts() {
        let mut fx = Fixture::new(image(&[
            ("p1", PAINT, None),
            ("p2", PAINT, None),
            ("p3", PAINT, None),
        ]));
        fx.activate("p2");
        fx.panel.right_clicked();
        assert_eq!(fx.children(None), strings(&["p1", "p2", "p3"]));
    }

    #[test]
    fn test_opacity_debounce_commits_once() {
        let mut fx = Fixture::new(basic());
        let top = fx.id("top");
        let t0 = Instant::now();

        fx.panel.opacity_slider_moved_at(50.0, t0);
        fx.panel.opacity_slider_moved_at(60.0, t0 + Duration::from_millis(50));
        assert_eq!(fx.panel.widgets().opacity, 60.0);

        assert!(!fx.panel.tick_at(t0 + Duration::from_millis(200)));
        assert!(fx.manager.lock().unwrap().history().is_empty());

        assert!(fx.panel.tick_at(t0 + Duration::from_millis(260)));
        assert!(!fx.panel.tick_at(t0 + Duration::from_millis(600)));

        let mgr = fx.manager.lock().unwrap();
        assert_eq!(mgr.history().len(), 1);
        assert_eq!(mgr.history()[0].node, top);
        assert_eq!(mgr.history()[0].edit, Edit::Opacity(153));
        assert_eq!(mgr.tree().get(top).unwrap().opacity, 153);
    }

    #[test]
    fn test_update_ui_enable_states() {
        let mut fx = Fixture::new(image(&[
            ("bg", PAINT, None),
            ("top", PAINT, None),
            ("mask", NodeKind::FILTER_MASK, Some("top")),
        ]));

        // top of the root: can go down, not up
        let w = fx.panel.widgets();
        assert!(!w.raise_enabled);
        assert!(w.lower_enabled);
        assert!(w.opacity_enabled && w.composite_enabled);
        assert_eq!(w.composite_op, Some("normal"));

        // masks: movable within their layer, no opacity/composite
        fx.activate("mask");
        let w = fx.panel.widgets();
        assert!(w.raise_enabled && w.lower_enabled);
        assert!(!w.opacity_enabled && !w.composite_enabled);

        // activation from outside the view is followed
        let bg = fx.id("bg");
        fx.manager.lock().unwrap().slot_non_ui_activated_node(bg);
        fx.panel.process_events();
        assert_eq!(fx.panel.widgets().current, Some(bg));
        assert!(fx.panel.widgets().raise_enabled);
        assert!(fx.actions.lock().unwrap().action(ACTION_REMOVE_LAYER).unwrap().enabled);
    }

    #[test]
    fn test_single_selection_keeps_node_rules() {
        let mut img = image(&[
            ("bg", PAINT, None),
            ("top", PAINT, None),
            ("mask", NodeKind::FILTER_MASK, Some("top")),
        ]);
        let bg = img.tree.find_by_name("bg").unwrap();
        img.tree.get_mut(bg).unwrap().locked = true;
        let mut fx = Fixture::new(img);
        let top = fx.id("top");

        fx.panel.select_nodes(&[bg, top]);
        let w = fx.panel.widgets();
        assert!(!w.add_enabled && !w.duplicate_enabled && !w.properties_enabled);
        assert!(!w.raise_enabled && !w.lower_enabled);
        assert!(!w.opacity_enabled && !w.composite_enabled);

        fx.activate("mask");
        let w = fx.panel.widgets();
        assert!(w.add_enabled && w.duplicate_enabled && w.properties_enabled);
        assert!(!w.opacity_enabled && !w.composite_enabled);

        fx.activate("bg");
        let w = fx.panel.widgets();
        assert!(w.properties_enabled);
        assert!(!w.raise_enabled && !w.lower_enabled);
        assert!(!w.opacity_enabled && !w.composite_enabled);

        fx.activate("top");
        let w = fx.panel.widgets();
        assert!(!w.raise_enabled && w.lower_enabled);
        assert!(w.opacity_enabled);
    }

    #[test]
    fn test_row_click_narrows_selection() {
        let mut fx = Fixture::new(image(&[
            ("group", GROUP, None),
            ("c0", PAINT, Some("group")),
            ("c1", PAINT, Some("group")),
            ("c2", PAINT, Some("group")),
            ("c3", PAINT, Some("group")),
        ]));
        let (c0, c3) = (fx.id("c0"), fx.id("c3"));
        fx.panel.select_nodes(&[c0, c3]);
        assert!(!fx.panel.widgets().add_enabled);

        fx.panel.activate_node(c0);
        assert_eq!(fx.manager.lock().unwrap().selected_nodes(), vec![c0]);
        assert_eq!(fx.panel.widgets().selection, vec![c0]);
        assert!(fx.panel.widgets().add_enabled && fx.panel.widgets().duplicate_enabled);

        // only the clicked node moves
        fx.panel.left_clicked();
        assert_eq!(fx.children(None), strings(&["c0", "group"]));
        assert_eq!(fx.children(Some("group")), strings(&["c1", "c2", "c3"]));
    }

    #[test]
    fn test_locked_node_disables_controls() {
        let mut img = basic();
        let top = img.tree.find_by_name("top").unwrap();
        img.tree.get_mut(top).unwrap().locked = true;
        let fx = Fixture::new(img);

        let w = fx.panel.widgets();
        assert!(!w.raise_enabled && !w.lower_enabled);
        assert!(!w.opacity_enabled && !w.composite_enabled);
        let actions = fx.actions.lock().unwrap();
        assert!(!actions.action(ACTION_REMOVE_LAYER).unwrap().enabled);
        assert!(actions.action(ACTION_LAYER_PROPERTIES).unwrap().enabled);
    }

    #[test]
    fn test_composite_list_follows_color_space() {
        let mut img = basic();
        let top = img.tree.find_by_name("top").unwrap();
        img.tree.get_mut(top).unwrap().color_space = Some(ColorSpace::Alpha8);
        let mut fx = Fixture::new(img);

        let ids: Vec<_> = fx.panel.widgets().composite_ops.iter().map(|op| op.id).collect();
        assert_eq!(ids, vec!["normal", "multiply", "erase", "copy"]);

        fx.panel.composite_op_activated("screen");
        fx.panel.composite_op_activated("erase");
        assert_eq!(fx.panel.widgets().composite_op, Some("erase"));

        // groups have no paint device: image color space
        fx.activate("group");
        assert_eq!(fx.panel.widgets().composite_ops.len(), ColorSpace::Rgba8.composite_ops().len());
    }

    #[test]
    fn test_selection_changed() {
        let mut fx = Fixture::new(basic());
        let (bg, top) = (fx.id("bg"), fx.id("top"));

        fx.panel.select_nodes(&[bg, top]);
        assert_eq!(fx.manager.lock().unwrap().selected_nodes(), vec![bg, top]);
        let w = fx.panel.widgets();
        assert!(!w.add_enabled && !w.duplicate_enabled && !w.properties_enabled && !w.opacity_enabled);

        fx.panel.select_nodes(&[bg]);
        assert!(fx.panel.widgets().add_enabled);

        // empty selection snaps back to the active row
        fx.panel.selection_changed(&[]);
        assert_eq!(fx.panel.widgets().current, fx.active());
        assert_eq!(fx.panel.widgets().selection, vec![top]);
    }

    #[test]
    fn test_hiding_global_selection_reactivates() {
        let mut fx = Fixture::new(image(&[
            ("bg", PAINT, None),
            ("top", PAINT, None),
            ("sel", NodeKind::SELECTION_MASK, None),
        ]));
        let (top, sel) = (fx.id("top"), fx.id("sel"));

        // showing activates the mask
        fx.panel.edit_global_selection(true);
        assert_eq!(fx.active(), Some(sel));
        assert_eq!(fx.panel.widgets().current, Some(sel));
        assert!(fx.actions.lock().unwrap().action(ACTION_SHOW_GLOBAL_SELECTION).unwrap().checked);

        // hiding moves to the nearest visible node
        fx.panel.edit_global_selection(false);
        assert_eq!(fx.active(), Some(top));
        assert_eq!(fx.panel.widgets().current, Some(top));
        let mgr = fx.manager.lock().unwrap();
        assert_eq!(fx.panel.model().index_from_node(mgr.tree(), sel), None);
    }

    #[test]
    fn test_find_non_hidable_node_order() {
        let img = image(&[
            ("sel_a", NodeKind::SELECTION_MASK, None),
            ("layer", PAINT, None),
            ("sel_b", NodeKind::SELECTION_MASK, None),
            ("sel_c", NodeKind::SELECTION_MASK, None),
        ]);
        let tree = &img.tree;
        let id = |n| tree.find_by_name(n).unwrap();

        // previous siblings first, skipping masks
        assert_eq!(find_non_hidable_node(tree, id("sel_c")), Some(id("layer")));
        // then next siblings
        assert_eq!(find_non_hidable_node(tree, id("sel_a")), Some(id("layer")));
        // anything else stays
        assert_eq!(find_non_hidable_node(tree, id("layer")), Some(id("layer")));

        let only = image(&[("sel", NodeKind::SELECTION_MASK, None)]);
        let sel = only.tree.find_by_name("sel").unwrap();
        assert_eq!(find_non_hidable_node(&only.tree, sel), None);

        // selection masks inside layers are never hidden
        let local = image(&[("l", PAINT, None), ("m", NodeKind::Mask(MaskKind::Selection), Some("l"))]);
        let m = local.tree.find_by_name("m").unwrap();
        assert_eq!(find_non_hidable_node(&local.tree, m), Some(m));
    }

    #[test]
    fn test_host_actions_reach_panel() {
        let mut fx = Fixture::new(basic());
        let top = fx.id("top");

        assert!(fx.actions.lock().unwrap().trigger(ACTION_REMOVE_LAYER));
        fx.panel.process_events();
        assert!(!fx.manager.lock().unwrap().tree().contains(top));
        assert_eq!(fx.panel.widgets().current, fx.active());

        assert!(fx.actions.lock().unwrap().trigger(ACTION_SHOW_GLOBAL_SELECTION));
        fx.panel.process_events();
        assert!(fx.panel.model().show_global_selection());

        // foreign actions are ignored
        fx.actions.lock().unwrap().add_action(Action::new("zoom_in", "Zoom In"));
        assert!(fx.actions.lock().unwrap().trigger("zoom_in"));
        fx.panel.process_events();
    }

    #[test]
    fn test_image_deletion_detaches() {
        let mut fx = Fixture::new(basic());
        fx.manager.lock().unwrap().close_image();
        fx.panel.process_events();
        assert!(!fx.panel.is_attached());
        assert_eq!(fx.bus.subscription_count(), 0);
        assert!(fx.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn test_context_menu() {
        let mut fx = Fixture::new(basic());
        let root = fx.root();

        // "top" is display row 0, "bg" the last row
        let menu = fx.panel.context_menu(Some(ModelIndex { parent: root, row: 0 }));
        assert!(menu.is_enabled(CMD_MERGE_DOWN));
        assert!(menu.find(CMD_CONVERT_TO_FILTER_MASK).is_some());

        let menu = fx.panel.context_menu(Some(ModelIndex { parent: root, row: 2 }));
        assert!(!menu.is_enabled(CMD_MERGE_DOWN));

        let menu = fx.panel.context_menu(None);
        assert_eq!(
            menu.commands(),
            vec![
                CMD_ADD_TRANSPARENCY_MASK,
                CMD_ADD_FILTER_MASK,
                CMD_ADD_SELECTION_MASK,
                CMD_SELECT_OPAQUE
            ]
        );

        // running an entry
        assert!(fx.panel.run_command(CMD_DUPLICATE));
        assert_eq!(fx.children(None), strings(&["bg", "group", "top", "top Copy"]));
        assert!(fx.panel.run_command(CMD_MERGE_DOWN));
        assert_eq!(fx.children(None), strings(&["bg", "group", "top"]));
        assert!(!fx.panel.run_command("no_such_command"));
    }

    #[test]
    fn test_add_and_convert_commands() {
        let mut fx = Fixture::new(basic());
        fx.panel.run_command(CMD_ADD_TRANSPARENCY_MASK);
        let mask = fx.active().unwrap();
        let top = fx.id("top");
        assert_eq!(fx.manager.lock().unwrap().tree().parent(mask), Some(top));

        fx.panel.run_command(CMD_CONVERT_TO_FILTER_MASK);
        assert_eq!(
            fx.manager.lock().unwrap().tree().kind(mask),
            Some(NodeKind::Mask(MaskKind::Filter))
        );

        fx.panel.run_command(CMD_ADD_GROUP_LAYER);
        let group = fx.active().unwrap();
        assert_eq!(fx.manager.lock().unwrap().tree().kind(group), Some(NodeKind::Layer(LayerKind::Group)));
        assert_eq!(fx.panel.widgets().current, Some(group));
    }

    #[test]
    fn test_drag_and_drop_requests() {
        let mut fx = Fixture::new(basic());
        let (bg, group) = (fx.id("bg"), fx.id("group"));

        // drop bg onto the group's top row
        fx.panel.drop_node(bg, group, 0);
        assert_eq!(fx.children(Some("group")), strings(&["g1", "g2", "bg"]));
        assert_eq!(fx.active(), Some(bg));

        let root = fx.root();
        fx.panel.drop_new_node(PAINT, "dropped", root, 0);
        assert_eq!(fx.children(None), strings(&["group", "top", "dropped"]));
    }

    #[test]
    fn test_isolate_from_model() {
        let mut fx = Fixture::new(basic());
        let bg = fx.id("bg");
        let root = fx.root();
        {
            let mgr = fx.manager.lock().unwrap();
            fx.panel.model().toggle_isolate(mgr.tree(), ModelIndex { parent: root, row: 2 });
        }
        fx.panel.process_events();
        assert_eq!(fx.manager.lock().unwrap().isolated_node(), Some(bg));
    }

    #[test]
    fn test_detached_panel_is_inert() {
        let mut panel = LayerBox::new(&LayerBoxSettings::default());
        panel.raise_clicked();
        panel.left_clicked();
        panel.right_clicked();
        panel.edit_global_selection(true);
        panel.opacity_slider_moved(10.0);
        assert!(!panel.tick_at(Instant::now() + Duration::from_secs(1)));
        assert_eq!(panel.context_menu(None).commands().len(), 4);
        panel.set_view_mode(ViewMode::Thumbnail);
        assert_eq!(panel.widgets().view_mode, ViewMode::Thumbnail);
    }
}
