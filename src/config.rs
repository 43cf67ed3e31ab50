//! Controller configuration.
//!
//! [`LocomotionConfig`] holds the tuning values for movement, jumping, slope
//! limits and the ground probes. [`CapsuleGeometry`] holds the constants
//! derived once from the agent's capsule when the controller is initialized.

use bevy::prelude::*;

use crate::error::LocomotionError;

/// Tuning parameters for the locomotion controller.
///
/// Distances are in world units, speeds in units/second and rates in
/// units/second².
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct LocomotionConfig {
    // === Movement ===
    /// Target ground speed at full input.
    pub speed: f32,

    /// How fast ground speed ramps up toward the target.
    pub accel_rate: f32,

    /// How fast ground speed ramps down toward the target.
    pub decel_rate: f32,

    /// Strafing acceleration available in mid-air.
    pub air_accel: f32,

    // === Jump ===
    /// Vertical speed the agent has right after a jump.
    pub jump_speed: f32,

    // === Ground ===
    /// Extra distance below the capsule the fudge probe reaches.
    ///
    /// Raise it if the agent rockets off ramps or feels loosely attached to
    /// the ground. Lower it if the agent gets yanked down onto surfaces far
    /// beneath it. Only read when the controller is initialized.
    pub fudge_extra: f32,

    /// Steepest slope the agent can stand on (radians).
    pub max_slope_angle: f32,

    /// How far above a contact point the re-probe starts.
    pub probe_lift: f32,

    /// Length of the downward re-probe cast from each contact point.
    pub probe_distance: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            // Movement
            speed: 7.0,
            accel_rate: 20.0,
            decel_rate: 20.0,
            air_accel: 5.0,

            // Jump
            jump_speed: 14.0,

            // Ground
            fudge_extra: 0.5,
            max_slope_angle: std::f32::consts::FRAC_PI_4, // 45 degrees
            probe_lift: 1.0,
            probe_distance: 1.1,
        }
    }
}

impl LocomotionConfig {
    /// Snappy player movement: quick to reach speed and quick to stop.
    pub fn player() -> Self {
        Self {
            accel_rate: 40.0,
            decel_rate: 60.0,
            air_accel: 8.0,
            ..default()
        }
    }

    /// Slow ramps and lots of air control.
    pub fn floaty() -> Self {
        Self {
            accel_rate: 8.0,
            decel_rate: 4.0,
            air_accel: 12.0,
            jump_speed: 10.0,
            ..default()
        }
    }

    /// Builder: set ground speed.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Builder: set acceleration and deceleration rates.
    pub fn with_rates(mut self, accel: f32, decel: f32) -> Self {
        self.accel_rate = accel;
        self.decel_rate = decel;
        self
    }

    /// Builder: set air acceleration.
    pub fn with_air_accel(mut self, air_accel: f32) -> Self {
        self.air_accel = air_accel;
        self
    }

    /// Builder: set jump speed.
    pub fn with_jump_speed(mut self, jump_speed: f32) -> Self {
        self.jump_speed = jump_speed;
        self
    }

    /// Builder: set fudge extra distance.
    pub fn with_fudge_extra(mut self, fudge_extra: f32) -> Self {
        self.fudge_extra = fudge_extra;
        self
    }

    /// Builder: set max slope angle in radians.
    pub fn with_max_slope_angle(mut self, angle: f32) -> Self {
        self.max_slope_angle = angle;
        self
    }

    /// Builder: set max slope angle in degrees.
    pub fn with_max_slope_degrees(self, degrees: f32) -> Self {
        self.with_max_slope_angle(degrees.to_radians())
    }

    /// Builder: set the contact re-probe lift and length.
    pub fn with_probe(mut self, lift: f32, distance: f32) -> Self {
        self.probe_lift = lift;
        self.probe_distance = distance;
        self
    }
}

/// Capsule dimensions as reported by the physics backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapsuleShape {
    /// Total height, caps included.
    pub height: f32,
    /// Cap radius.
    pub radius: f32,
}

impl CapsuleShape {
    pub fn new(height: f32, radius: f32) -> Self {
        Self { height, radius }
    }
}

/// Constants derived from the agent capsule.
///
/// Computed once at initialization and never touched again.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CapsuleGeometry {
    /// Half the total capsule height.
    pub half_height: f32,
    /// Cap radius.
    pub radius: f32,
    /// Distance from the capsule center down to the origin of its lower cap sphere.
    pub bottom_sphere_offset: f32,
    /// Base reach of the fudge probe below the capsule center.
    pub fudge_check: f32,
}

impl CapsuleGeometry {
    pub fn new(shape: CapsuleShape, fudge_extra: f32) -> Result<Self, LocomotionError> {
        let CapsuleShape { height, radius } = shape;
        let valid = height.is_finite()
            && radius.is_finite()
            && radius > 0.0
            && height >= 2.0 * radius
            && fudge_extra.is_finite();
        if !valid {
            return Err(LocomotionError::DegenerateCapsule { height, radius });
        }

        let half_height = height * 0.5;
        Ok(Self {
            half_height,
            radius,
            bottom_sphere_offset: half_height - radius,
            fudge_check: half_height + fudge_extra,
        })
    }
}
