//! Raw collision geometry.
//!
//! [`CollisionData`] is the result of a directional cast, [`ContactPoint`] is
//! one point of a persistent contact reported by the physics engine.

use bevy::prelude::*;

/// Information about a raycast hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionData {
    /// Distance from the cast origin to the hit point.
    pub distance: f32,
    /// Normal of the surface at the hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if known).
    pub entity: Option<Entity>,
}

impl CollisionData {
    /// Create a collision result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }

    /// Angle between the hit normal and `up`, in radians.
    pub fn slope_angle(&self, up: Vec3) -> f32 {
        self.normal.angle_between(up)
    }

    /// Whether the surface is walkable for the given maximum slope (radians).
    pub fn is_walkable(&self, up: Vec3, max_slope_angle: f32) -> bool {
        self.slope_angle(up) <= max_slope_angle
    }
}

/// A single point of a persistent contact.
///
/// The normal points from the other body toward the agent.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct ContactPoint {
    /// World-space contact position.
    pub position: Vec3,
    /// World-space contact normal.
    pub normal: Vec3,
}

impl ContactPoint {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }

    /// Both vectors are finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.normal.is_finite()
    }
}
