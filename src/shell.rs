//! Headless shell: one image, its node manager and an attached layer panel.
//!
//! Used by the binary to drive the panel from `--exec` commands, and handy
//! in tests that want the whole wiring without building it by hand.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use crate::core::event_bus::EventBus;
use crate::core::node_manager::{ImageNodeManager, NodeManager};
use crate::entities::image::Image;
use crate::entities::node::{LayerKind, MaskKind, Node, NodeId};
use crate::prefs::LayerBoxSettings;
use crate::widgets::actions::ActionManager;
use crate::widgets::layer_box::{self, LayerBox, LayerBoxContext, ViewMode, add_command_kind};

pub struct Shell {
    pub event_bus: EventBus,
    pub manager: Arc<Mutex<ImageNodeManager>>,
    pub actions: Arc<Mutex<ActionManager>>,
    pub panel: LayerBox,
    opacity_delay: Duration,
}

impl Shell {
    /// Wire up `image` and attach a fresh panel to it
    pub fn new(image: Image, settings: &LayerBoxSettings) -> Self {
        let event_bus = EventBus::new();
        let manager = Arc::new(Mutex::new(ImageNodeManager::new(image, event_bus.emitter())));
        let actions = Arc::new(Mutex::new(ActionManager::new(event_bus.emitter())));

        let mut panel = LayerBox::new(settings);
        let dyn_manager: Arc<Mutex<dyn NodeManager>> = manager.clone();
        panel.attach(LayerBoxContext {
            manager: dyn_manager,
            bus: event_bus.clone(),
            actions: Arc::clone(&actions),
        });

        Self {
            event_bus,
            manager,
            actions,
            panel,
            opacity_delay: Duration::from_millis(settings.opacity_delay_ms),
        }
    }

    /// Small image with a group, a mask and a global selection
    pub fn demo_image() -> Image {
        let mut image = Image::new("demo", Default::default());
        let root = image.root();
        let tree = &mut image.tree;
        let nodes = [
            (root, Node::layer(LayerKind::Paint, "Background")),
            (root, Node::layer(LayerKind::Group, "Sketch")),
            (root, Node::layer(LayerKind::Paint, "Ink").with_opacity(204)),
            (root, Node::mask(MaskKind::Selection, "Selection")),
        ];
        let mut ids = Vec::new();
        for (parent, node) in nodes {
            match tree.push(node, parent) {
                Ok(id) => ids.push(id),
                Err(e) => log::warn!("Demo image: {}", e),
            }
        }
        let Some(sketch) = ids.get(1).copied() else {
            return image;
        };
        if let Err(e) = tree.push(Node::layer(LayerKind::Paint, "Lines"), sketch) {
            log::warn!("Demo image: {}", e);
        }
        let fade = tree
            .push(Node::layer(LayerKind::Paint, "Colors"), sketch)
            .and_then(|colors| tree.push(Node::mask(MaskKind::Transparency, "Fade"), colors));
        if let Err(e) = fade {
            log::warn!("Demo image: {}", e);
        }
        image
    }

    fn find(&self, name: &str) -> Result<NodeId> {
        let manager = self.manager.lock().unwrap_or_else(|e| e.into_inner());
        manager
            .tree()
            .find_by_name(name)
            .with_context(|| format!("No node named '{}'", name))
    }

    /// Run one `--exec` command
    pub fn run(&mut self, command: &str) -> Result<()> {
        let (verb, arg) = match command.split_once(':') {
            Some((verb, arg)) => (verb.trim(), Some(arg.trim())),
            None => (command.trim(), None),
        };
        log::debug!("Shell: {} {:?}", verb, arg);

        match (verb, arg) {
            ("activate", Some(name)) => {
                let id = self.find(name)?;
                self.panel.activate_node(id);
            }
            ("select", Some(names)) => {
                let ids = names
                    .split(',')
                    .map(|n| self.find(n.trim()))
                    .collect::<Result<Vec<_>>>()?;
                self.panel.select_nodes(&ids);
            }
            ("raise", None) => self.panel.raise_clicked(),
            ("lower", None) => self.panel.lower_clicked(),
            ("left", None) => self.panel.left_clicked(),
            ("right", None) => self.panel.right_clicked(),
            ("remove", None) => self.panel.remove_clicked(),
            ("duplicate", None) => self.panel.duplicate_clicked(),
            ("merge", None) => self.panel.merge_layer(),
            ("isolate", None) => self.panel.toggle_isolate(),
            ("properties", None) => self.panel.properties_clicked(),
            ("select-opaque", None) => self.panel.select_opaque(),
            ("opacity", Some(value)) => {
                let value: f64 = value
                    .parse()
                    .with_context(|| format!("Bad opacity '{}'", value))?;
                // slider release: commit once the quiet period is over
                let now = Instant::now();
                self.panel.opacity_slider_moved_at(value, now);
                self.panel.tick_at(now + self.opacity_delay);
            }
            ("composite", Some(id)) => self.panel.composite_op_activated(id),
            ("global-selection", Some(state)) => {
                let show = match state {
                    "on" | "true" | "1" => true,
                    "off" | "false" | "0" => false,
                    other => bail!("Expected on/off, got '{}'", other),
                };
                self.panel.edit_global_selection(show);
            }
            ("collapse", Some(name)) => {
                let id = self.find(name)?;
                self.panel.row_collapsed(id);
            }
            ("expand", Some(name)) => {
                let id = self.find(name)?;
                self.panel.row_expanded(id);
            }
            ("add", Some(kind)) => {
                let Some(kind) = add_command_kind(&format!("add_new_{}", kind)) else {
                    bail!("Unknown node kind '{}'", kind);
                };
                self.panel.add_node(kind);
            }
            ("convert", Some(kind)) => {
                if !self.panel.run_command(&format!("convert_to_{}", kind)) {
                    bail!("Cannot convert to '{}'", kind);
                }
            }
            ("view", Some(mode)) => {
                let mode: ViewMode = mode.parse().map_err(anyhow::Error::msg)?;
                self.panel.set_view_mode(mode);
            }
            ("menu", name) => {
                let index = match name {
                    Some(name) => {
                        let id = self.find(name)?;
                        let manager = self.manager.lock().unwrap_or_else(|e| e.into_inner());
                        self.panel.model().index_from_node(manager.tree(), id)
                    }
                    None => None,
                };
                print!("{}", self.panel.context_menu(index));
            }
            (other, _) => {
                if !self.panel.run_command(other) {
                    bail!("Unknown command '{}'", command);
                }
            }
        }
        Ok(())
    }

    /// Panel as text
    pub fn render(&self) -> String {
        layer_box::render(&self.panel)
    }

    /// Write the current image description
    pub fn save(&self, path: &Path) -> Result<()> {
        let manager = self.manager.lock().unwrap_or_else(|e| e.into_inner());
        manager.image().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(shell: &Shell, parent: Option<&str>) -> Vec<String> {
        let mgr = shell.manager.lock().unwrap();
        let tree = mgr.tree();
        let parent = parent.map_or(tree.root(), |p| tree.find_by_name(p).unwrap());
        tree.children(parent)
            .iter()
            .map(|c| tree.get(*c).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_demo_image_layout() {
        let shell = Shell::new(Shell::demo_image(), &LayerBoxSettings::default());
        assert_eq!(names(&shell, None), vec!["Background", "Sketch", "Ink", "Selection"]);
        assert_eq!(names(&shell, Some("Sketch")), vec!["Lines", "Colors"]);
        assert_eq!(names(&shell, Some("Colors")), vec!["Fade"]);
        // the global selection is hidden by default
        assert!(!shell.render().contains("Selection"));
    }

    #[test]
    fn test_command_sequence() {
        let mut shell = Shell::new(Shell::demo_image(), &LayerBoxSettings::default());
        for cmd in ["activate:Ink", "lower", "opacity:50", "composite:multiply"] {
            shell.run(cmd).unwrap();
        }
        assert_eq!(names(&shell, None), vec!["Background", "Ink", "Sketch", "Selection"]);
        let ink = shell.find("Ink").unwrap();
        let mgr = shell.manager.lock().unwrap();
        let node = mgr.tree().get(ink).unwrap();
        assert_eq!(node.opacity, 128);
        assert_eq!(node.composite_op.as_deref(), Some("multiply"));
    }

    #[test]
    fn test_bad_commands() {
        let mut shell = Shell::new(Shell::demo_image(), &LayerBoxSettings::default());
        assert!(shell.run("activate:Nope").is_err());
        assert!(shell.run("opacity:lots").is_err());
        assert!(shell.run("view:grid").is_err());
        assert!(shell.run("global-selection:maybe").is_err());
        assert!(shell.run("frobnicate").is_err());
        assert!(shell.run("add:unicorn_layer").is_err());
    }

    #[test]
    fn test_add_and_view() {
        let mut shell = Shell::new(Shell::demo_image(), &LayerBoxSettings::default());
        shell.run("activate:Lines").unwrap();
        shell.run("add:transparency_mask").unwrap();
        assert_eq!(names(&shell, Some("Lines")), vec!["Transparency Mask 2"]);
        shell.run("view:minimal").unwrap();
        assert!(shell.render().starts_with("demo [minimal]"));
    }
}
