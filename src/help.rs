//! Command reference for the `--exec` driver.

/// Single help entry (command syntax + description)
#[derive(Clone, Debug)]
pub struct HelpEntry {
    pub key: &'static str,
    pub desc: &'static str,
}

impl HelpEntry {
    pub const fn new(key: &'static str, desc: &'static str) -> Self {
        Self { key, desc }
    }
}

pub const SHELL_COMMANDS: &[HelpEntry] = &[
    HelpEntry::new("activate:NAME", "Click the row of node NAME"),
    HelpEntry::new("select:A,B,..", "Select the named nodes"),
    HelpEntry::new("raise / lower", "Move the active node up / down"),
    HelpEntry::new("left / right", "Move selected nodes out of / into a sibling"),
    HelpEntry::new("opacity:N", "Set the active layer's opacity (0-100)"),
    HelpEntry::new("composite:ID", "Set the active layer's blend mode"),
    HelpEntry::new("global-selection:on|off", "Show or hide the global selection mask"),
    HelpEntry::new("collapse:NAME / expand:NAME", "Fold or unfold a row"),
    HelpEntry::new("add:KIND", "Add a node (paint_layer, group_layer, filter_mask, ...)"),
    HelpEntry::new("convert:KIND", "Convert the active node (paint_layer, *_mask)"),
    HelpEntry::new("remove / duplicate / merge", "Edit the active node"),
    HelpEntry::new("isolate / properties / select-opaque", "Misc node commands"),
    HelpEntry::new("view:MODE", "minimal, detailed or thumbnail"),
    HelpEntry::new("menu[:NAME]", "Print the context menu (for row NAME)"),
];

/// Aligned two-column listing
pub fn format_help(entries: &[HelpEntry]) -> String {
    let width = entries.iter().map(|e| e.key.len()).max().unwrap_or(0);
    entries
        .iter()
        .map(|e| format!("  {:<width$}  {}\n", e.key, e.desc, width = width))
        .collect()
}
