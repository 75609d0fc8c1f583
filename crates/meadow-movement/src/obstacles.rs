//! Collision volumes of static and placed world objects.

use crate::aabb::Aabb;

/// Read-only view of the obstacles the controller collides against.
pub trait ObstacleProvider {
    /// Every obstacle's tight bounding volume.
    fn obstacles(&self) -> &[Aabb];
}

impl ObstacleProvider for [Aabb] {
    fn obstacles(&self) -> &[Aabb] {
        self
    }
}

impl ObstacleProvider for Vec<Aabb> {
    fn obstacles(&self) -> &[Aabb] {
        self
    }
}

/// Append-only obstacle list: populated at world build, extended by
/// structure placement, never edited during a tick.
#[derive(Clone, Debug, Default)]
pub struct ObstacleSet {
    boxes: Vec<Aabb>,
}

impl ObstacleSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one obstacle.
    pub fn push(&mut self, bounds: Aabb) {
        self.boxes.push(bounds);
    }

    /// Returns the number of obstacles.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns `true` if there are no obstacles.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

impl Extend<Aabb> for ObstacleSet {
    fn extend<T: IntoIterator<Item = Aabb>>(&mut self, iter: T) {
        self.boxes.extend(iter);
    }
}

impl FromIterator<Aabb> for ObstacleSet {
    fn from_iter<T: IntoIterator<Item = Aabb>>(iter: T) -> Self {
        Self {
            boxes: iter.into_iter().collect(),
        }
    }
}

impl ObstacleProvider for ObstacleSet {
    fn obstacles(&self) -> &[Aabb] {
        &self.boxes
    }
}
