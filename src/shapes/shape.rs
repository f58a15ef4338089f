//! Shape geometry: position, size, rotation and the local transform.
//!
//! Coordinates are y-down (screen space). Rotation is in degrees, about the
//! shape's center, kept in `[0, 360)`.
//!
//! Local transform (shape -> parent):
//! `T(position) * T(size/2) * R(rotation) * T(-size/2)`

use std::fmt;

use glam::{DAffine2, DVec2};

/// Reference point on a shape's bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 5] = [
        Anchor::Center,
        Anchor::TopLeft,
        Anchor::TopRight,
        Anchor::BottomLeft,
        Anchor::BottomRight,
    ];

    /// Anchor point in shape coordinates for a box of `size`
    pub fn point(&self, size: DVec2) -> DVec2 {
        match self {
            Anchor::Center => size * 0.5,
            Anchor::TopLeft => DVec2::ZERO,
            Anchor::TopRight => DVec2::new(size.x, 0.0),
            Anchor::BottomLeft => DVec2::new(0.0, size.y),
            Anchor::BottomRight => size,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Anchor::Center => "center",
            Anchor::TopLeft => "top-left",
            Anchor::TopRight => "top-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomRight => "bottom-right",
        };
        f.write_str(s)
    }
}

/// Normalize degrees into `[0, 360)`
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negatives
    if a >= 360.0 { 0.0 } else { a }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub name: String,
    /// Top-left in parent coordinates, before rotation
    pub position: DVec2,
    pub size: DVec2,
    rotation: f64,
}

impl Shape {
    pub fn new(name: impl Into<String>, position: DVec2, size: DVec2) -> Self {
        Self {
            name: name.into(),
            position,
            size,
            rotation: 0.0,
        }
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Set the rotation to `angle` degrees
    pub fn rotate(&mut self, angle: f64) {
        self.rotation = normalize_degrees(angle);
    }

    /// Add `delta` degrees to the rotation
    pub fn rotate_by(&mut self, delta: f64) {
        self.rotation = normalize_degrees(self.rotation + delta);
    }

    /// Rotation about the center, without the translation to `position`
    pub fn rotation_transform(&self) -> DAffine2 {
        let center = self.size * 0.5;
        DAffine2::from_translation(center)
            * DAffine2::from_angle(self.rotation.to_radians())
            * DAffine2::from_translation(-center)
    }

    /// Shape -> parent coordinates
    pub fn local_transform(&self) -> DAffine2 {
        DAffine2::from_translation(self.position) * self.rotation_transform()
    }
}
