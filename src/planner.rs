//! Velocity planning.
//!
//! Both branches return a velocity change (mass-independent) for the current
//! tick; nothing here touches the rigid body directly.

use bevy::prelude::*;

use crate::config::LocomotionConfig;
use crate::jump::JumpState;

/// Magnitudes at or below this are treated as zero.
pub const NEAR_ZERO: f32 = 1e-5;

/// Horizontal facing of the agent in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Facing {
    pub forward: Vec3,
    pub right: Vec3,
}

impl Default for Facing {
    fn default() -> Self {
        Self {
            forward: Vec3::NEG_Z,
            right: Vec3::X,
        }
    }
}

impl Facing {
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            forward: rotation * Vec3::NEG_Z,
            right: rotation * Vec3::X,
        }
    }
}

/// Clamp a stick/keyboard axis pair to the unit disc.
pub fn normalize_axis(axis: Vec2) -> Vec2 {
    let length = axis.length();
    if length > 1.0 {
        axis / length
    } else {
        axis
    }
}

/// Whether the (normalized) input is effectively released.
#[inline]
pub fn input_is_idle(axis: Vec2) -> bool {
    axis.length() <= NEAR_ZERO
}

/// `forward` projected onto the plane with normal `normal`, unit length.
pub fn ground_forward(normal: Vec3, forward: Vec3) -> Vec3 {
    let projected = forward - normal * forward.dot(normal);
    let projected = projected.normalize_or_zero();
    if projected == Vec3::ZERO {
        normal.any_orthonormal_vector()
    } else {
        projected
    }
}

/// Velocity change that sets the vertical speed to `jump_speed`.
pub fn jump_change(jump_speed: f32, velocity: Vec3) -> Vec3 {
    Vec3::new(0.0, jump_speed - velocity.y, 0.0)
}

/// Everything the grounded branch reads for one tick.
#[derive(Debug, Clone, Copy)]
pub struct GroundedInput {
    /// Averaged ground normal (unit).
    pub normal: Vec3,
    /// Agent facing.
    pub facing: Facing,
    /// Normalized input axes (x = strafe, y = forward).
    pub axis: Vec2,
    /// Current rigid body velocity.
    pub velocity: Vec3,
    /// Fixed tick duration.
    pub dt: f32,
    /// Touching a non-static body.
    pub touching_dynamic: bool,
    /// World gravity acceleration.
    pub gravity: Vec3,
}

/// Plan the velocity change for a grounded tick.
///
/// Steers the velocity toward the slope-aligned target at a bounded rate,
/// applies a pending jump, and otherwise cancels one tick of gravity while
/// idle so the agent does not creep down slopes.
pub fn plan_grounded(config: &LocomotionConfig, input: &GroundedInput, jump: &mut JumpState) -> Vec3 {
    let normal = input.normal;
    let forward = ground_forward(normal, input.facing.forward);
    let right = forward.cross(normal);

    let target = right * input.axis.x * config.speed + forward * input.axis.y * config.speed;

    let difference = target.length() - input.velocity.length();
    let mut change = if difference.abs() <= NEAR_ZERO {
        Vec3::ZERO
    } else {
        let accel = if difference > 0.0 {
            (config.accel_rate * input.dt).min(difference)
        } else {
            (-config.decel_rate * input.dt).max(difference)
        };
        (target - input.velocity) * (accel / difference)
    };

    if jump.consume_request() {
        change.y = config.jump_speed - input.velocity.y;
        debug!(vertical = change.y, "jump applied");
    } else if !input.touching_dynamic && input_is_idle(input.axis) && *jump != JumpState::Applied {
        change -= input.gravity * input.dt;
    }

    change
}

/// Plan the air-strafe velocity change for an airborne tick.
///
/// Adding speed along the current direction of travel is damped once the
/// horizontal speed would exceed `config.speed`; turning and braking stay
/// available at full strength.
pub fn plan_air_strafe(config: &LocomotionConfig, facing: &Facing, axis: Vec2, velocity: Vec3, dt: f32) -> Vec3 {
    if input_is_idle(axis) {
        return Vec3::ZERO;
    }

    let step = config.air_accel * dt;
    let mut added = (facing.right * axis.x + facing.forward * axis.y) * step;
    added.y = 0.0;

    let horizontal = Vec3::new(velocity.x, 0.0, velocity.z);
    let resulting_speed = (added + horizontal).length();
    if resulting_speed <= NEAR_ZERO {
        return Vec3::ZERO;
    }

    if resulting_speed > config.speed {
        let added_dir = added.normalize_or_zero();
        let travel_dir = horizontal.normalize_or_zero();
        let scale = (1.0 - added_dir.dot(travel_dir).max(0.0)) * step;
        added = added_dir * scale;
    }

    added
}
