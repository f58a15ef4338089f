//! Composite operations and the color spaces that support them.
//!
//! A composite op decides how a layer's pixels combine with what lies
//! beneath it. Not every color space supports every op: alpha-only and gray
//! spaces expose a reduced set. The layer panel lists only the ops of the
//! active color space.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const OP_NORMAL: &str = "normal";
pub const OP_MULTIPLY: &str = "multiply";
pub const OP_SCREEN: &str = "screen";
pub const OP_OVERLAY: &str = "overlay";
pub const OP_DARKEN: &str = "darken";
pub const OP_LIGHTEN: &str = "lighten";
pub const OP_ADD: &str = "add";
pub const OP_SUBTRACT: &str = "subtract";
pub const OP_DIFFERENCE: &str = "difference";
pub const OP_DIVIDE: &str = "divide";
pub const OP_ERASE: &str = "erase";
pub const OP_COPY: &str = "copy";
pub const OP_DISSOLVE: &str = "dissolve";
pub const OP_COLOR_DODGE: &str = "color-dodge";
pub const OP_COLOR_BURN: &str = "color-burn";
pub const OP_HARD_LIGHT: &str = "hard-light";
pub const OP_SOFT_LIGHT: &str = "soft-light";

/// Grouping used when presenting ops in a list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCategory {
    Mix,
    Darken,
    Lighten,
    Arithmetic,
    Misc,
}

/// Registry entry for one composite op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeOp {
    pub id: &'static str,
    pub name: &'static str,
    pub category: OpCategory,
}

static REGISTRY: Lazy<Vec<CompositeOp>> = Lazy::new(|| {
    use OpCategory::*;
    let op = |id, name, category| CompositeOp { id, name, category };
    vec![
        op(OP_NORMAL, "Normal", Mix),
        op(OP_DISSOLVE, "Dissolve", Mix),
        op(OP_OVERLAY, "Overlay", Mix),
        op(OP_HARD_LIGHT, "Hard Light", Mix),
        op(OP_SOFT_LIGHT, "Soft Light", Mix),
        op(OP_MULTIPLY, "Multiply", Darken),
        op(OP_DARKEN, "Darken", Darken),
        op(OP_COLOR_BURN, "Color Burn", Darken),
        op(OP_SCREEN, "Screen", Lighten),
        op(OP_LIGHTEN, "Lighten", Lighten),
        op(OP_COLOR_DODGE, "Color Dodge", Lighten),
        op(OP_ADD, "Addition", Arithmetic),
        op(OP_SUBTRACT, "Subtract", Arithmetic),
        op(OP_DIFFERENCE, "Difference", Arithmetic),
        op(OP_DIVIDE, "Divide", Arithmetic),
        op(OP_ERASE, "Erase", Misc),
        op(OP_COPY, "Copy", Misc),
    ]
});

/// All registered ops, in presentation order
pub fn all_ops() -> &'static [CompositeOp] {
    &REGISTRY
}

/// Look up a registered op by id
pub fn find_op(id: &str) -> Option<&'static CompositeOp> {
    REGISTRY.iter().find(|op| op.id == id)
}

/// Pixel color model. Determines which composite ops apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    Rgba8,
    GrayA8,
    Alpha8,
}

impl ColorSpace {
    pub fn id(&self) -> &'static str {
        match self {
            ColorSpace::Rgba8 => "RGBA8",
            ColorSpace::GrayA8 => "GRAYA8",
            ColorSpace::Alpha8 => "ALPHA8",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "RGBA8" => Some(ColorSpace::Rgba8),
            "GRAYA8" => Some(ColorSpace::GrayA8),
            "ALPHA8" => Some(ColorSpace::Alpha8),
            _ => None,
        }
    }

    /// Does this space implement op `id`?
    pub fn supports(&self, id: &str) -> bool {
        match self {
            ColorSpace::Rgba8 => find_op(id).is_some(),
            // no hue/lightness mixing without color channels
            ColorSpace::GrayA8 => {
                find_op(id).is_some() && !matches!(id, OP_COLOR_DODGE | OP_COLOR_BURN | OP_SOFT_LIGHT)
            }
            ColorSpace::Alpha8 => matches!(id, OP_NORMAL | OP_ERASE | OP_COPY | OP_MULTIPLY),
        }
    }

    /// Ops supported by this space, in registry order
    pub fn composite_ops(&self) -> Vec<&'static CompositeOp> {
        REGISTRY.iter().filter(|op| self.supports(op.id)).collect()
    }

    /// Resolve `id` to an op this space can run
    pub fn composite_op(&self, id: &str) -> Option<&'static CompositeOp> {
        find_op(id).filter(|op| self.supports(op.id))
    }
}
