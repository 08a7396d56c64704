use bevy::prelude::*;

/// An ordered row of gathering poses a robot can traverse.
///
/// The first pose is the row's entry point; plan requests measure distance to
/// it when picking the row nearest to a start pose. A row with no poses is
/// never offered to callers.
#[derive(Component, Clone, Debug, Default)]
pub struct GatheringRow {
    /// Traversal poses in row order.
    pub poses: Vec<Transform>,
}

impl GatheringRow {
    /// A row from a list of poses.
    pub fn new(poses: Vec<Transform>) -> Self {
        Self { poses }
    }

    /// A straight row of `count` poses starting at `start`, spaced by `step`.
    pub fn along(start: Vec3, step: Vec3, count: usize) -> Self {
        Self {
            poses: (0..count)
                .map(|i| Transform::from_translation(start + step * i as f32))
                .collect(),
        }
    }

    /// The row's entry pose, if it has any.
    pub fn entry(&self) -> Option<&Transform> {
        self.poses.first()
    }
}
