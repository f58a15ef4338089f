//! Layer list context menu.
//!
//! Built fresh for every request from the clicked row (if any). Entries carry
//! the command name the panel runs when the entry is chosen.

use std::fmt;

use crate::entities::node::{LayerKind, MaskKind, NodeKind};

pub const CMD_PROPERTIES: &str = "layer_properties";
pub const CMD_REMOVE: &str = "remove_layer";
pub const CMD_DUPLICATE: &str = "duplicatelayer";
pub const CMD_MERGE_DOWN: &str = "merge_layer_down";
pub const CMD_CONVERT_TO_PAINT_LAYER: &str = "convert_to_paint_layer";
pub const CMD_CONVERT_TO_TRANSPARENCY_MASK: &str = "convert_to_transparency_mask";
pub const CMD_CONVERT_TO_FILTER_MASK: &str = "convert_to_filter_mask";
pub const CMD_CONVERT_TO_SELECTION_MASK: &str = "convert_to_selection_mask";
pub const CMD_ISOLATE: &str = "isolate_layer";
pub const CMD_ADD_TRANSPARENCY_MASK: &str = "add_new_transparency_mask";
pub const CMD_ADD_FILTER_MASK: &str = "add_new_filter_mask";
pub const CMD_ADD_SELECTION_MASK: &str = "add_new_selection_mask";
pub const CMD_SELECT_OPAQUE: &str = "select_opaque";

pub const CMD_ADD_PAINT_LAYER: &str = "add_new_paint_layer";
pub const CMD_ADD_GROUP_LAYER: &str = "add_new_group_layer";
pub const CMD_ADD_CLONE_LAYER: &str = "add_new_clone_layer";
pub const CMD_ADD_SHAPE_LAYER: &str = "add_new_shape_layer";
pub const CMD_ADD_ADJUSTMENT_LAYER: &str = "add_new_adjustment_layer";
pub const CMD_ADD_FILL_LAYER: &str = "add_new_fill_layer";
pub const CMD_ADD_FILE_LAYER: &str = "add_new_file_layer";

/// Node kind created by an `add_new_*` command
pub fn add_command_kind(name: &str) -> Option<NodeKind> {
    let kind = match name {
        CMD_ADD_PAINT_LAYER => NodeKind::Layer(LayerKind::Paint),
        CMD_ADD_GROUP_LAYER => NodeKind::Layer(LayerKind::Group),
        CMD_ADD_CLONE_LAYER => NodeKind::Layer(LayerKind::Clone),
        CMD_ADD_SHAPE_LAYER => NodeKind::Layer(LayerKind::Shape),
        CMD_ADD_ADJUSTMENT_LAYER => NodeKind::Layer(LayerKind::Adjustment),
        CMD_ADD_FILL_LAYER => NodeKind::Layer(LayerKind::Fill),
        CMD_ADD_FILE_LAYER => NodeKind::Layer(LayerKind::File),
        CMD_ADD_TRANSPARENCY_MASK => NodeKind::Mask(MaskKind::Transparency),
        CMD_ADD_FILTER_MASK => NodeKind::Mask(MaskKind::Filter),
        CMD_ADD_SELECTION_MASK => NodeKind::Mask(MaskKind::Selection),
        _ => return None,
    };
    Some(kind)
}

#[derive(Clone, Debug, PartialEq)]
pub enum MenuEntry {
    Command {
        name: &'static str,
        text: String,
        enabled: bool,
    },
    Separator,
    Submenu {
        text: String,
        entries: Vec<MenuEntry>,
    },
}

impl MenuEntry {
    pub fn command(name: &'static str, text: &str, enabled: bool) -> Self {
        MenuEntry::Command {
            name,
            text: text.to_string(),
            enabled,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextMenu {
    pub entries: Vec<MenuEntry>,
}

impl ContextMenu {
    pub fn push(&mut self, entry: MenuEntry) {
        self.entries.push(entry);
    }

    pub fn separator(&mut self) {
        self.entries.push(MenuEntry::Separator);
    }

    /// Find a command anywhere in the menu, submenus included
    pub fn find(&self, name: &str) -> Option<&MenuEntry> {
        fn walk<'a>(entries: &'a [MenuEntry], name: &str) -> Option<&'a MenuEntry> {
            entries.iter().find_map(|e| match e {
                MenuEntry::Command { name: n, .. } if *n == name => Some(e),
                MenuEntry::Submenu { entries, .. } => walk(entries, name),
                _ => None,
            })
        }
        walk(&self.entries, name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.find(name), Some(MenuEntry::Command { enabled: true, .. }))
    }

    /// Command names in menu order, submenus flattened
    pub fn commands(&self) -> Vec<&'static str> {
        fn walk(entries: &[MenuEntry], out: &mut Vec<&'static str>) {
            for e in entries {
                match e {
                    MenuEntry::Command { name, .. } => out.push(*name),
                    MenuEntry::Submenu { entries, .. } => walk(entries, out),
                    MenuEntry::Separator => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.entries, &mut out);
        out
    }
}

impl fmt::Display for ContextMenu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_entries(f: &mut fmt::Formatter<'_>, entries: &[MenuEntry], depth: usize) -> fmt::Result {
            let pad = "  ".repeat(depth);
            for e in entries {
                match e {
                    MenuEntry::Command { text, enabled, .. } => {
                        let mark = if *enabled { "" } else { " (disabled)" };
                        writeln!(f, "{}{}{}", pad, text, mark)?;
                    }
                    MenuEntry::Separator => writeln!(f, "{}----", pad)?,
                    MenuEntry::Submenu { text, entries } => {
                        writeln!(f, "{}{} >", pad, text)?;
                        write_entries(f, entries, depth + 1)?;
                    }
                }
            }
            Ok(())
        }
        write_entries(f, &self.entries, 0)
    }
}
