//! Camera collaborator for focal distance projection.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Smallest clip range used when normalizing depths.
pub const MIN_DEPTH_RANGE: f32 = 1e-5;

/// What the parameter deriver needs from the active camera.
pub trait FocalProjection {
    fn near_clip(&self) -> f32;
    fn far_clip(&self) -> f32;
    fn position(&self) -> Vec3;
    /// Unit view direction.
    fn forward(&self) -> Vec3;

    /// Depth of a world point in normalized [0, 1] clip range.
    fn project_depth01(&self, world: Vec3) -> f32;

    fn depth_range(&self) -> f32 {
        (self.far_clip() - self.near_clip()).max(MIN_DEPTH_RANGE)
    }

    /// Point `distance` world units in front of the camera, measured from
    /// the near plane.
    fn point_at_distance(&self, distance: f32) -> Vec3 {
        self.position() + self.forward() * (distance - self.near_clip())
    }
}

/// Minimal perspective camera description.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DofCamera {
    pub position: Vec3,
    pub forward: Vec3,
    pub near: f32,
    pub far: f32,
}

impl DofCamera {
    pub fn new(position: Vec3, forward: Vec3, near: f32, far: f32) -> Self {
        let forward = forward.try_normalize().unwrap_or(Vec3::NEG_Z);
        Self { position, forward, near, far }
    }

    pub fn looking_at(position: Vec3, target: Vec3, near: f32, far: f32) -> Self {
        Self::new(position, target - position, near, far)
    }
}

impl Default for DofCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            near: 0.3,
            far: 1000.0,
        }
    }
}

impl FocalProjection for DofCamera {
    fn near_clip(&self) -> f32 {
        self.near
    }

    fn far_clip(&self) -> f32 {
        self.far
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn forward(&self) -> Vec3 {
        self.forward.try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    fn project_depth01(&self, world: Vec3) -> f32 {
        (world - self.position).dot(self.forward()) / self.depth_range()
    }
}
