//! Shape containment and absolute positioning.
//!
//! Shapes live in an arena and are addressed by [`ShapeId`]. Any shape can
//! act as a container. Each child carries a clipping flag that decides how
//! its container's transform applies:
//!
//! - clipped: the container's full absolute transform (rotation included);
//! - unclipped: the container's own parent chain plus a plain translation by
//!   the container's position. The container's rotation is ignored.

use std::fmt;

use glam::{DAffine2, DVec2};

use super::shape::{Anchor, Shape};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    UnknownShape(ShapeId),
    /// Container would end up inside its own child
    Cycle { container: ShapeId, child: ShapeId },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::UnknownShape(id) => write!(f, "Unknown shape {:?}", id),
            ShapeError::Cycle { container, child } => {
                write!(f, "{:?} cannot contain its ancestor {:?}", container, child)
            }
        }
    }
}

impl std::error::Error for ShapeError {}

#[derive(Clone, Debug)]
struct Entry {
    shape: Shape,
    parent: Option<ShapeId>,
    children: Vec<ShapeId>,
    clipped: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ShapeTree {
    entries: Vec<Entry>,
}

impl ShapeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a top-level shape
    pub fn add(&mut self, shape: Shape) -> ShapeId {
        let id = ShapeId(self.entries.len());
        self.entries.push(Entry {
            shape,
            parent: None,
            children: Vec::new(),
            clipped: false,
        });
        id
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.entries.get(id.0).map(|e| &e.shape)
    }

    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.entries.get_mut(id.0).map(|e| &mut e.shape)
    }

    pub fn parent(&self, id: ShapeId) -> Option<ShapeId> {
        self.entries.get(id.0)?.parent
    }

    pub fn children(&self, id: ShapeId) -> &[ShapeId] {
        self.entries.get(id.0).map_or(&[], |e| e.children.as_slice())
    }

    fn check(&self, id: ShapeId) -> Result<(), ShapeError> {
        if id.0 < self.entries.len() {
            Ok(())
        } else {
            Err(ShapeError::UnknownShape(id))
        }
    }

    /// Put `child` into `container`, leaving any previous container.
    /// New children start unclipped.
    pub fn add_child(&mut self, container: ShapeId, child: ShapeId) -> Result<(), ShapeError> {
        self.check(container)?;
        self.check(child)?;
        let mut cur = Some(container);
        while let Some(c) = cur {
            if c == child {
                return Err(ShapeError::Cycle { container, child });
            }
            cur = self.parent(c);
        }

        self.remove_from_parent(child);
        self.entries[container.0].children.push(child);
        let entry = &mut self.entries[child.0];
        entry.parent = Some(container);
        entry.clipped = false;
        Ok(())
    }

    /// Detach `child` from its container; it becomes top-level.
    pub fn remove_from_parent(&mut self, child: ShapeId) {
        let Some(old) = self.parent(child) else {
            return;
        };
        self.entries[old.0].children.retain(|c| *c != child);
        self.entries[child.0].parent = None;
    }

    /// Set how `child` follows its container
    pub fn set_clipping(&mut self, child: ShapeId, clipped: bool) {
        if let Some(e) = self.entries.get_mut(child.0) {
            e.clipped = clipped;
        }
    }

    pub fn is_clipped(&self, child: ShapeId) -> bool {
        self.entries.get(child.0).is_some_and(|e| e.clipped)
    }

    // -- Geometry --

    pub fn position(&self, id: ShapeId) -> Option<DVec2> {
        self.get(id).map(|s| s.position)
    }

    pub fn set_position(&mut self, id: ShapeId, position: DVec2) {
        if let Some(s) = self.get_mut(id) {
            s.position = position;
        }
    }

    pub fn resize(&mut self, id: ShapeId, size: DVec2) {
        if let Some(s) = self.get_mut(id) {
            s.size = size;
        }
    }

    pub fn rotation(&self, id: ShapeId) -> Option<f64> {
        self.get(id).map(|s| s.rotation())
    }

    pub fn rotate(&mut self, id: ShapeId, angle: f64) {
        if let Some(s) = self.get_mut(id) {
            s.rotate(angle);
        }
    }

    pub fn rotate_by(&mut self, id: ShapeId, delta: f64) {
        if let Some(s) = self.get_mut(id) {
            s.rotate_by(delta);
        }
    }

    /// Parent coordinates -> document coordinates for `id`
    pub fn parent_transform(&self, id: ShapeId) -> DAffine2 {
        let Some(entry) = self.entries.get(id.0) else {
            return DAffine2::IDENTITY;
        };
        let Some(parent) = entry.parent else {
            return DAffine2::IDENTITY;
        };
        if entry.clipped {
            self.transform(parent)
        } else {
            let position = self.position(parent).unwrap_or(DVec2::ZERO);
            self.parent_transform(parent) * DAffine2::from_translation(position)
        }
    }

    /// Shape -> document coordinates
    pub fn transform(&self, id: ShapeId) -> DAffine2 {
        match self.get(id) {
            Some(shape) => self.parent_transform(id) * shape.local_transform(),
            None => DAffine2::IDENTITY,
        }
    }

    /// Document position of `anchor` on `id`
    pub fn absolute_position(&self, id: ShapeId, anchor: Anchor) -> Option<DVec2> {
        let shape = self.get(id)?;
        Some(self.transform(id).transform_point2(anchor.point(shape.size)))
    }

    /// Move `id` so that `anchor` lands on document point `point`.
    ///
    /// Size and rotation are kept; only the position changes.
    pub fn set_absolute_position(&mut self, id: ShapeId, point: DVec2, anchor: Anchor) {
        let Some(shape) = self.get(id) else {
            return;
        };
        let in_parent = self.parent_transform(id).inverse().transform_point2(point);
        let offset = shape.rotation_transform().transform_point2(anchor.point(shape.size));
        self.set_position(id, in_parent - offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_near(actual: Option<DVec2>, expected: (f64, f64)) {
        let actual = actual.unwrap();
        let expected = DVec2::new(expected.0, expected.1);
        assert!(
            actual.abs_diff_eq(expected, EPS),
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    struct Scene {
        tree: ShapeTree,
        shape1: ShapeId,
        shape2: ShapeId,
        child1: ShapeId,
        container: ShapeId,
        child2: ShapeId,
        container2: ShapeId,
    }

    fn scene() -> Scene {
        let mut tree = ShapeTree::new();
        let shape1 = tree.add(Shape::new("shape1", DVec2::new(50.0, 50.0), DVec2::splat(50.0)));
        let shape2 = tree.add(Shape::new("shape2", DVec2::new(20.0, 20.0), DVec2::splat(50.0)));

        let child1 = tree.add(Shape::new("child1", DVec2::new(20.0, 20.0), DVec2::splat(50.0)));
        let container = tree.add(Shape::new("container", DVec2::new(100.0, 100.0), DVec2::ZERO));
        tree.add_child(container, child1).unwrap();
        tree.set_clipping(child1, false);

        let child2 = tree.add(Shape::new("child2", DVec2::new(25.0, 25.0), DVec2::new(10.0, 15.0)));
        let container2 = tree.add(Shape::new("container2", DVec2::new(100.0, 200.0), DVec2::splat(100.0)));
        tree.rotate(container2, 90.0);
        tree.add_child(container2, child2).unwrap();

        Scene {
            tree,
            shape1,
            shape2,
            child1,
            container,
            child2,
            container2,
        }
    }

    #[test]
    fn test_base_position() {
        let s = scene();
        assert_near(s.tree.position(s.shape1), (50.0, 50.0));
        assert_near(s.tree.position(s.shape2), (20.0, 20.0));
        assert_near(s.tree.position(s.child1), (20.0, 20.0));
        assert_near(s.tree.position(s.container), (100.0, 100.0));
        assert!(!s.tree.is_clipped(s.child2));
    }

    #[test]
    fn test_absolute_position() {
        let mut s = scene();
        let t = &mut s.tree;
        assert_near(t.absolute_position(s.shape1, Anchor::Center), (75.0, 75.0));
        assert_near(t.absolute_position(s.shape2, Anchor::Center), (45.0, 45.0));

        // translated
        assert_near(t.absolute_position(s.child1, Anchor::Center), (145.0, 145.0));

        // rotated container
        t.set_clipping(s.child2, false);
        assert_near(t.absolute_position(s.container2, Anchor::Center), (150.0, 250.0));
        assert_near(t.absolute_position(s.child2, Anchor::Center), (130.0, 232.5));
        t.set_clipping(s.child2, true);
        assert_near(t.absolute_position(s.child2, Anchor::Center), (167.5, 230.0));

        t.rotate(s.shape1, 90.0);
        t.set_position(s.shape1, DVec2::new(10.0, 10.0));
        assert_near(t.absolute_position(s.shape1, Anchor::Center), (35.0, 35.0));
        assert_near(t.absolute_position(s.shape1, Anchor::TopLeft), (60.0, 10.0));
        assert_near(t.absolute_position(s.shape1, Anchor::BottomRight), (10.0, 60.0));

        assert_near(t.absolute_position(s.container2, Anchor::TopLeft), (200.0, 200.0));
    }

    #[test]
    fn test_set_absolute_position() {
        let mut s = scene();
        let t = &mut s.tree;

        t.set_position(s.shape1, DVec2::new(10.0, 10.0));
        assert_near(t.absolute_position(s.shape1, Anchor::Center), (35.0, 35.0));
        t.set_absolute_position(s.shape1, DVec2::new(10.0, 10.0), Anchor::Center);
        assert_near(t.absolute_position(s.shape1, Anchor::Center), (10.0, 10.0));
        // rotation is about the center
        t.rotate(s.shape1, 45.0);
        assert_near(t.absolute_position(s.shape1, Anchor::Center), (10.0, 10.0));

        t.set_absolute_position(s.child1, DVec2::ZERO, Anchor::Center);
        assert_near(t.position(s.child1), (-125.0, -125.0));
        assert_near(t.absolute_position(s.child1, Anchor::Center), (0.0, 0.0));

        assert_near(t.position(s.container2), (100.0, 200.0));
        t.set_clipping(s.child2, false);
        t.set_absolute_position(s.child2, DVec2::ZERO, Anchor::Center);
        assert_near(t.position(s.child2), (-105.0, -207.5));
        assert_near(t.absolute_position(s.child2, Anchor::Center), (0.0, 0.0));

        t.set_clipping(s.child2, true);
        t.set_absolute_position(s.child2, DVec2::ZERO, Anchor::Center);
        assert_near(t.absolute_position(s.child2, Anchor::Center), (0.0, 0.0));
        assert_near(t.position(s.child2), (-205.0, 192.5));
    }

    #[test]
    fn test_set_absolute_position_corners() {
        let mut s = scene();
        let t = &mut s.tree;

        t.rotate(s.shape1, 90.0);
        t.set_absolute_position(s.shape1, DVec2::new(100.0, 100.0), Anchor::Center);
        assert_near(t.absolute_position(s.shape1, Anchor::Center), (100.0, 100.0));
        t.set_absolute_position(s.shape1, DVec2::new(100.0, 100.0), Anchor::TopLeft);
        assert_near(t.absolute_position(s.shape1, Anchor::TopLeft), (100.0, 100.0));

        t.set_absolute_position(s.child1, DVec2::ZERO, Anchor::BottomRight);
        assert_near(t.position(s.child1), (-150.0, -150.0));
        t.set_absolute_position(s.child1, DVec2::ZERO, Anchor::BottomLeft);
        assert_near(t.position(s.child1), (-100.0, -150.0));
        t.set_absolute_position(s.child1, DVec2::ZERO, Anchor::TopRight);
        assert_near(t.position(s.child1), (-150.0, -100.0));

        t.set_clipping(s.child2, true);
        t.set_absolute_position(s.child2, DVec2::ZERO, Anchor::TopLeft);
        assert_near(t.position(s.child2), (-200.0, 200.0));
    }

    #[test]
    fn test_round_trip_every_anchor() {
        let target = DVec2::new(-33.25, 71.5);
        for clipped in [false, true] {
            for parent_rotation in [0.0, 30.0, 90.0, 217.0] {
                for child_rotation in [0.0, 45.0, 300.0] {
                    for anchor in Anchor::ALL {
                        let mut s = scene();
                        s.tree.rotate(s.container2, parent_rotation);
                        s.tree.rotate(s.child2, child_rotation);
                        s.tree.set_clipping(s.child2, clipped);
                        s.tree.set_absolute_position(s.child2, target, anchor);
                        assert_near(s.tree.absolute_position(s.child2, anchor), (target.x, target.y));
                    }
                }
            }
        }
    }

    #[test]
    fn test_nested_containers() {
        let mut tree = ShapeTree::new();
        let outer = tree.add(Shape::new("outer", DVec2::new(10.0, 0.0), DVec2::splat(40.0)));
        let inner = tree.add(Shape::new("inner", DVec2::new(5.0, 5.0), DVec2::splat(20.0)));
        let leaf = tree.add(Shape::new("leaf", DVec2::new(1.0, 2.0), DVec2::splat(2.0)));
        tree.add_child(outer, inner).unwrap();
        tree.add_child(inner, leaf).unwrap();
        // unclipped all the way: plain offsets
        assert_near(tree.absolute_position(leaf, Anchor::TopLeft), (16.0, 7.0));

        tree.rotate(outer, 180.0);
        tree.set_clipping(inner, true);
        // inner's top-left rotates half a turn about outer's center (30, 20)
        assert_near(tree.absolute_position(inner, Anchor::TopLeft), (45.0, 35.0));
        assert_near(tree.absolute_position(leaf, Anchor::TopLeft), (44.0, 33.0));
    }

    #[test]
    fn test_set_and_get_rotation() {
        let mut s = scene();
        for angle in [180.0, 2.0, 4.0, 358.0] {
            s.tree.rotate(s.shape1, angle);
            assert_eq!(s.tree.rotation(s.shape1), Some(angle));
        }
        s.tree.rotate(s.shape1, 0.0);
        for _ in 0..4 {
            s.tree.rotate_by(s.shape1, 100.0);
        }
        assert_eq!(s.tree.rotation(s.shape1), Some(40.0));
    }

    #[test]
    fn test_add_child_refuses_cycles() {
        let mut s = scene();
        assert_eq!(
            s.tree.add_child(s.child1, s.container),
            Err(ShapeError::Cycle {
                container: s.child1,
                child: s.container
            })
        );
        assert!(s.tree.add_child(s.shape1, s.shape1).is_err());

        // reparenting leaves the old container
        s.tree.add_child(s.container2, s.child1).unwrap();
        assert!(s.tree.children(s.container).is_empty());
        assert_eq!(s.tree.parent(s.child1), Some(s.container2));
        s.tree.remove_from_parent(s.child1);
        assert_eq!(s.tree.parent(s.child1), None);
    }
}
