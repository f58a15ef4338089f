//! Layer panel - text rendering.
//!
//! Draws the panel as plain text: a header line with the property controls,
//! then one line per visible row, top first. Rows under a collapsed node are
//! skipped. How much a row shows depends on the view mode.

use std::fmt::Write;

use crate::entities::image::Image;
use crate::entities::node::{LayerKind, MaskKind, Node, NodeKind};

use super::layer_box::{LayerBox, lock};
use super::layer_box_state::ViewMode;

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Layer(LayerKind::Paint) => "paint",
        NodeKind::Layer(LayerKind::Group) => "group",
        NodeKind::Layer(LayerKind::Clone) => "clone",
        NodeKind::Layer(LayerKind::Shape) => "vector",
        NodeKind::Layer(LayerKind::Adjustment) => "filter",
        NodeKind::Layer(LayerKind::Fill) => "fill",
        NodeKind::Layer(LayerKind::File) => "file",
        NodeKind::Mask(MaskKind::Transparency) => "transparency mask",
        NodeKind::Mask(MaskKind::Filter) => "filter mask",
        NodeKind::Mask(MaskKind::Selection) => "selection mask",
    }
}

fn row_detail(node: &Node, mode: ViewMode) -> String {
    let mut flags = String::new();
    if !node.visible {
        flags.push_str(" hidden");
    }
    if node.locked {
        flags.push_str(" locked");
    }
    match mode {
        ViewMode::Minimal => flags,
        ViewMode::Detailed | ViewMode::Thumbnail => {
            let mut detail = format!("  ({}", kind_label(node.kind));
            if node.is_layer() {
                let _ = write!(detail, ", {:.0}%", node.opacity_percent());
                if let Some(op) = &node.composite_op {
                    let _ = write!(detail, ", {}", op);
                }
            }
            detail.push(')');
            detail + &flags
        }
    }
}

/// Render `panel` against `image`.
pub fn render_rows(panel: &LayerBox, image: &Image) -> String {
    let tree = &image.tree;
    let w = panel.widgets();
    let mut out = String::new();

    let opacity = if w.opacity_enabled {
        format!("{:.0}%", w.opacity)
    } else {
        "--".to_string()
    };
    let op = match (w.composite_enabled, w.composite_op) {
        (true, Some(op)) => op,
        _ => "--",
    };
    let _ = writeln!(out, "{} [{}]  opacity {}  blend {}", image.name, w.view_mode, opacity, op);

    let mut skip_below: Option<usize> = None;
    for (node, depth) in panel.model().rows(tree) {
        if let Some(d) = skip_below {
            if depth > d {
                continue;
            }
            skip_below = None;
        }
        let Some(data) = tree.get(node) else {
            continue;
        };
        let marker = if w.current == Some(node) {
            '>'
        } else if w.selection.contains(&node) {
            '*'
        } else {
            ' '
        };
        let fold = if tree.child_count(node) == 0 {
            "    "
        } else if w.is_collapsed(node) {
            skip_below = Some(depth);
            "[+] "
        } else {
            "[-] "
        };
        let thumb = if w.view_mode == ViewMode::Thumbnail { "[#] " } else { "" };
        let _ = writeln!(
            out,
            "{} {}{}{}{}{}",
            marker,
            "  ".repeat(depth),
            fold,
            thumb,
            data.name,
            row_detail(data, w.view_mode)
        );
    }
    out
}

/// Render an attached panel. Detached panels render nothing.
pub fn render(panel: &LayerBox) -> String {
    let Some(ctx) = panel.context() else {
        return String::new();
    };
    let manager = lock(&ctx.manager);
    render_rows(panel, manager.image())
}
