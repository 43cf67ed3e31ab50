//! Ground classification.
//!
//! Raw contact normals are noisy on edges and corners, so contacts are only
//! used to find *where* the agent touches something. Each candidate point is
//! re-probed with a short downward cast and the probed normal decides whether
//! that spot is walkable.

use bevy::prelude::*;

use crate::backend::GroundProbe;
use crate::collision::ContactPoint;
use crate::config::{CapsuleGeometry, LocomotionConfig};

/// Ground contact state published by the controller.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct GroundState {
    /// Standing on a walkable surface this tick.
    pub grounded: bool,
    /// Normalized sum of all qualifying probe normals; zero while airborne.
    pub normal: Vec3,
    /// Treated as grounded at the end of the previous tick (fudging included).
    pub grounded_last_frame: bool,
}

impl Default for GroundState {
    fn default() -> Self {
        Self {
            grounded: false,
            normal: Vec3::ZERO,
            grounded_last_frame: false,
        }
    }
}

/// Result of one classification pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundClassification {
    pub grounded: bool,
    /// Averaged walking-plane normal, or zero when not grounded.
    pub normal: Vec3,
    /// Number of contact points that qualified.
    pub qualifying: usize,
}

/// Decide whether the agent at `position` stands on walkable ground.
///
/// A contact point qualifies when it lies at or below the origin of the
/// capsule's lower cap sphere *and* a cast from `probe_lift` above it, down
/// over `probe_distance`, finds a surface no steeper than `max_slope_angle`.
pub fn classify_ground<'a>(
    points: impl IntoIterator<Item = &'a ContactPoint>,
    position: Vec3,
    geometry: &CapsuleGeometry,
    config: &LocomotionConfig,
    probe: &(impl GroundProbe + ?Sized),
) -> GroundClassification {
    let foot_level = position.y - geometry.bottom_sphere_offset;

    let mut qualifying = 0;
    let mut normal_sum = Vec3::ZERO;

    for contact in points {
        if contact.position.y > foot_level {
            continue;
        }

        let origin = contact.position + Vec3::Y * config.probe_lift;
        let Some(hit) = probe.cast(origin, Vec3::NEG_Y, config.probe_distance) else {
            continue;
        };

        if hit.is_walkable(Vec3::Y, config.max_slope_angle) {
            qualifying += 1;
            normal_sum += hit.normal;
        }
    }

    let grounded = qualifying > 0;
    let normal = if grounded {
        let normalized = normal_sum.normalize_or_zero();
        if normalized == Vec3::ZERO {
            Vec3::Y
        } else {
            normalized
        }
    } else {
        Vec3::ZERO
    };

    trace!(qualifying, ?normal, "ground classified");

    GroundClassification {
        grounded,
        normal,
        qualifying,
    }
}
