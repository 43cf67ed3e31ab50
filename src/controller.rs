//! The locomotion controller component.
//!
//! [`LocomotionController`] owns the per-agent state (contacts, ground, jump,
//! falling) and runs the fixed-tick pipeline:
//!
//! 1. classify ground from the retained contact points,
//! 2. advance the jump state,
//! 3. plan a grounded velocity change, or
//! 4. try the fudge probe, or
//! 5. fall and air-strafe.
//!
//! The pipeline is engine-agnostic: the caller supplies the agent's position,
//! velocity and facing plus a [`GroundProbe`], and gets back a velocity change.

use bevy::prelude::*;

use crate::backend::GroundProbe;
use crate::collision::ContactPoint;
use crate::config::{CapsuleGeometry, CapsuleShape, LocomotionConfig};
use crate::contacts::ContactSet;
use crate::error::LocomotionError;
use crate::fudge::{fudge_eligible, resolve_fudge, FudgeOutcome};
use crate::ground::{classify_ground, GroundState};
use crate::jump::JumpState;
use crate::planner::{normalize_axis, plan_air_strafe, plan_grounded, Facing, GroundedInput};

/// Per-tick inputs sampled from the rigid body and the intent.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub position: Vec3,
    pub velocity: Vec3,
    pub facing: Facing,
    /// Raw input axes; renormalized before use.
    pub axis: Vec2,
    pub dt: f32,
}

/// Which branch of the pipeline ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickBranch {
    Grounded,
    /// A pending jump was applied by the fudge probe.
    JumpCaught,
    /// Pulled back onto nearby ground by the fudge probe.
    Snapped,
    Airborne,
}

/// Outcome of one fixed tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub velocity_change: Vec3,
    pub branch: TickBranch,
}

/// Rigidbody locomotion controller.
///
/// Add this together with a [`LocomotionConfig`] and a
/// [`MovementIntent`](crate::MovementIntent) to a dynamic rigid body with a
/// capsule collider. The capsule dimensions are captured on the first fixed
/// tick.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct LocomotionController {
    #[reflect(ignore)]
    contacts: ContactSet,
    ground: GroundState,
    jump: JumpState,
    falling: bool,
    fall_speed: f32,
    geometry: Option<CapsuleGeometry>,
    gravity: Vec3,
    /// Velocity change produced by the last tick, not yet written to the body.
    pending_change: Vec3,
    /// Fall speed of a landing that happened this tick.
    landed: Option<f32>,
}

impl Default for LocomotionController {
    fn default() -> Self {
        Self {
            contacts: ContactSet::default(),
            ground: GroundState::default(),
            jump: JumpState::default(),
            falling: false,
            fall_speed: 0.0,
            geometry: None,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            pending_change: Vec3::ZERO,
            landed: None,
        }
    }
}

impl LocomotionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the capsule geometry. Errors are fatal configuration problems.
    pub fn initialize(&mut self, shape: CapsuleShape, config: &LocomotionConfig) -> Result<(), LocomotionError> {
        let geometry = CapsuleGeometry::new(shape, config.fudge_extra)?;
        debug!(
            half_height = geometry.half_height,
            radius = geometry.radius,
            fudge_check = geometry.fudge_check,
            "locomotion controller initialized"
        );
        self.geometry = Some(geometry);
        Ok(())
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn geometry(&self) -> Option<&CapsuleGeometry> {
        self.geometry.as_ref()
    }

    /// World gravity used for the idle counter-force.
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    // === Observables ===

    /// Grounded by contact classification this tick.
    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.ground.grounded
    }

    /// Treated as grounded at the end of the last tick, fudged ticks included.
    #[inline]
    pub fn grounded_last_frame(&self) -> bool {
        self.ground.grounded_last_frame
    }

    #[inline]
    pub fn is_falling(&self) -> bool {
        self.falling
    }

    /// Vertical velocity on the most recent airborne tick.
    #[inline]
    pub fn fall_speed(&self) -> f32 {
        self.fall_speed
    }

    /// Averaged ground normal; zero while airborne.
    #[inline]
    pub fn ground_normal(&self) -> Vec3 {
        self.ground.normal
    }

    #[inline]
    pub fn jump_state(&self) -> JumpState {
        self.jump
    }

    #[inline]
    pub fn touching_dynamic(&self) -> bool {
        self.contacts.touching_dynamic()
    }

    pub fn ground_state(&self) -> &GroundState {
        &self.ground
    }

    pub fn contacts(&self) -> &ContactSet {
        &self.contacts
    }

    // === Contacts ===

    /// A collision with `body` began.
    pub fn collision_begin(
        &mut self,
        body: Entity,
        is_static: bool,
        points: Vec<ContactPoint>,
    ) -> Result<(), LocomotionError> {
        self.contacts.begin(body, is_static, points)?;
        if self.jump == JumpState::Airborne {
            debug!("contact with {body} ends jump lockout");
        }
        self.jump.on_collision_begin();
        Ok(())
    }

    /// The collision with `body` persists with new contact points.
    pub fn collision_stay(&mut self, body: Entity, points: Vec<ContactPoint>) -> Result<(), LocomotionError> {
        if !self.contacts.stay(body, points)? {
            trace!("contact stay for untracked body {body}");
        }
        Ok(())
    }

    /// The collision with `body` ended.
    pub fn collision_end(&mut self, body: Entity) {
        self.contacts.end(body);
    }

    // === Jump ===

    /// Register a jump button edge. Returns whether a jump was requested.
    pub fn request_jump(&mut self) -> bool {
        let accepted = self.jump.request(self.ground.grounded_last_frame);
        if accepted {
            debug!("jump requested");
        }
        accepted
    }

    // === Tick ===

    /// Run the pipeline for one fixed tick.
    ///
    /// Returns `None` until the controller has been initialized. The change is
    /// also kept until [`take_velocity_change`](Self::take_velocity_change).
    pub fn tick(
        &mut self,
        config: &LocomotionConfig,
        input: &TickInput,
        probe: &(impl GroundProbe + ?Sized),
    ) -> Option<TickReport> {
        let geometry = self.geometry?;
        let axis = normalize_axis(input.axis);

        let classification = classify_ground(self.contacts.points(), input.position, &geometry, config, probe);
        self.ground.grounded = classification.grounded;
        self.ground.normal = classification.normal;
        self.jump.on_ground_classified(classification.grounded);

        if classification.grounded {
            if self.falling {
                debug!(fall_speed = self.fall_speed, "landed");
                self.landed = Some(self.fall_speed);
            }
            self.falling = false;

            let grounded_input = GroundedInput {
                normal: classification.normal,
                facing: input.facing,
                axis,
                velocity: input.velocity,
                dt: input.dt,
                touching_dynamic: self.contacts.touching_dynamic(),
                gravity: self.gravity,
            };
            let change = plan_grounded(config, &grounded_input, &mut self.jump);
            self.ground.grounded_last_frame = true;
            return Some(self.finish(change, TickBranch::Grounded));
        }

        if fudge_eligible(self.ground.grounded_last_frame, self.jump, self.falling) {
            let outcome = resolve_fudge(
                input.position,
                input.velocity,
                input.dt,
                &geometry,
                config,
                &mut self.jump,
                probe,
            );
            let caught = match outcome {
                FudgeOutcome::JumpCaught { change } => Some((change, TickBranch::JumpCaught)),
                FudgeOutcome::Snapped { change, .. } => Some((change, TickBranch::Snapped)),
                FudgeOutcome::Missed => None,
            };
            if let Some((change, branch)) = caught {
                self.ground.grounded_last_frame = true;
                return Some(self.finish(change, branch));
            }
        }

        if !self.falling {
            debug!(vertical = input.velocity.y, "started falling");
        }
        self.falling = true;
        self.fall_speed = input.velocity.y;

        let change = plan_air_strafe(config, &input.facing, axis, input.velocity, input.dt);
        self.ground.grounded_last_frame = false;
        Some(self.finish(change, TickBranch::Airborne))
    }

    fn finish(&mut self, change: Vec3, branch: TickBranch) -> TickReport {
        trace!(?branch, ?change, "locomotion tick");
        self.pending_change += change;
        TickReport {
            velocity_change: change,
            branch,
        }
    }

    /// Take the velocity change to write to the rigid body.
    pub fn take_velocity_change(&mut self) -> Vec3 {
        std::mem::take(&mut self.pending_change)
    }

    /// Take the fall speed of a landing that happened since the last call.
    pub fn take_landed(&mut self) -> Option<f32> {
        self.landed.take()
    }
}
