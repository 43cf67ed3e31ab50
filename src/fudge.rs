//! Fudge resolver.
//!
//! Losing every ground contact for a single tick (stair edges, small drops,
//! cresting a ramp) should not make the agent fall. When the agent was
//! grounded last tick and is not jumping, a probe looks for walkable ground
//! just below the capsule and, if found, either applies a pending jump or pulls
//! the agent back onto the surface.

use bevy::prelude::*;

use crate::backend::GroundProbe;
use crate::collision::CollisionData;
use crate::config::{CapsuleGeometry, LocomotionConfig};
use crate::jump::JumpState;
use crate::planner::jump_change;

/// What the fudge resolver decided for this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FudgeOutcome {
    /// A pending jump was applied off the nearby ground.
    JumpCaught { change: Vec3 },
    /// The agent is pulled back onto `surface`.
    Snapped { change: Vec3, surface: CollisionData },
    /// No usable ground close enough; the agent is airborne.
    Missed,
}

impl FudgeOutcome {
    /// The velocity change to apply, if any.
    pub fn change(&self) -> Option<Vec3> {
        match self {
            FudgeOutcome::JumpCaught { change } | FudgeOutcome::Snapped { change, .. } => Some(*change),
            FudgeOutcome::Missed => None,
        }
    }
}

/// Whether the fudge probe may run this tick.
pub fn fudge_eligible(grounded_last_frame: bool, jump: JumpState, falling: bool) -> bool {
    grounded_last_frame && jump.permits_fudge() && !falling
}

/// Probe for ground just below the agent and decide how to stay on it.
///
/// The caller checks [`fudge_eligible`] first. A pending jump is consumed
/// here when the first probe succeeds.
pub fn resolve_fudge(
    position: Vec3,
    velocity: Vec3,
    dt: f32,
    geometry: &CapsuleGeometry,
    config: &LocomotionConfig,
    jump: &mut JumpState,
    probe: &(impl GroundProbe + ?Sized),
) -> FudgeOutcome {
    let reach = geometry.fudge_check + velocity.length() * dt;
    let Some(ground) = probe.cast(position, Vec3::NEG_Y, reach) else {
        return FudgeOutcome::Missed;
    };
    if !ground.is_walkable(Vec3::Y, config.max_slope_angle) {
        return FudgeOutcome::Missed;
    }

    if jump.consume_request() {
        let change = jump_change(config.jump_speed, velocity);
        debug!(vertical = change.y, "jump caught by fudge probe");
        return FudgeOutcome::JumpCaught { change };
    }

    // Cast from the lower cap sphere straight into the surface.
    let foot = position - Vec3::Y * geometry.bottom_sphere_offset;
    let Some(surface) = probe.cast(foot, -ground.normal, ground.distance) else {
        return FudgeOutcome::Missed;
    };

    let change = surface.normal * -surface.distance;
    debug!(distance = surface.distance, "fudge snap");
    FudgeOutcome::Snapped { change, surface }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{FnProbe, NoGround, PlaneProbe};
    use crate::config::CapsuleShape;

    const DT: f32 = 0.02;

    fn geometry() -> CapsuleGeometry {
        CapsuleGeometry::new(CapsuleShape::new(2.0, 0.5), 0.5).unwrap()
    }

    #[test]
    fn eligibility() {
        assert!(fudge_eligible(true, JumpState::Idle, false));
        assert!(fudge_eligible(true, JumpState::Requested, false));
        assert!(!fudge_eligible(false, JumpState::Idle, false));
        assert!(!fudge_eligible(true, JumpState::Idle, true));
        assert!(!fudge_eligible(true, JumpState::Applied, false));
        assert!(!fudge_eligible(true, JumpState::Airborne, false));
    }

    #[test]
    fn snaps_onto_walkable_slope_below() {
        // 30 degree slope passing 1.3 below the capsule center: out of contact
        // but within fudge_check (1.5).
        let position = Vec3::new(0.0, 1.3, 0.0);
        let probe = PlaneProbe::slope(Vec3::ZERO, 30.0);
        let mut jump = JumpState::Idle;

        let outcome = resolve_fudge(
            position,
            Vec3::new(0.0, 0.0, -3.0),
            DT,
            &geometry(),
            &LocomotionConfig::default(),
            &mut jump,
            &probe,
        );

        let FudgeOutcome::Snapped { change, surface } = outcome else {
            panic!("expected a snap, got {outcome:?}");
        };

        // Pulled straight into the slope by the gap between foot sphere and surface.
        assert!((surface.normal - probe.normal).length() < 1e-5);
        assert!(change.dot(probe.normal) < 0.0);
        assert!((change.length() - surface.distance).abs() < 1e-5);
        assert!(change.normalize().cross(probe.normal).length() < 1e-4);
        assert_eq!(jump, JumpState::Idle);
    }

    #[test]
    fn pending_jump_is_caught() {
        let mut jump = JumpState::Requested;

        let outcome = resolve_fudge(
            Vec3::new(0.0, 1.2, 0.0),
            Vec3::new(0.0, -2.0, -4.0),
            DT,
            &geometry(),
            &LocomotionConfig::default(),
            &mut jump,
            &PlaneProbe::flat(0.0),
        );

        assert_eq!(
            outcome,
            FudgeOutcome::JumpCaught {
                change: Vec3::new(0.0, 16.0, 0.0)
            }
        );
        assert_eq!(jump, JumpState::Applied);
    }

    #[test]
    fn misses_when_ground_is_too_far() {
        let mut jump = JumpState::Idle;

        let outcome = resolve_fudge(
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::ZERO,
            DT,
            &geometry(),
            &LocomotionConfig::default(),
            &mut jump,
            &PlaneProbe::flat(0.0),
        );

        assert_eq!(outcome, FudgeOutcome::Missed);
        assert_eq!(outcome.change(), None);
    }

    #[test]
    fn reach_grows_with_speed() {
        let position = Vec3::new(0.0, 1.6, 0.0);
        let config = LocomotionConfig::default();
        let probe = PlaneProbe::flat(0.0);

        let mut jump = JumpState::Idle;
        let slow = resolve_fudge(position, Vec3::ZERO, DT, &geometry(), &config, &mut jump, &probe);
        assert_eq!(slow, FudgeOutcome::Missed);

        let fast = resolve_fudge(
            position,
            Vec3::new(0.0, 0.0, -10.0),
            DT,
            &geometry(),
            &config,
            &mut jump,
            &probe,
        );
        assert!(matches!(fast, FudgeOutcome::Snapped { .. }));
    }

    #[test]
    fn steep_ground_is_not_fudged() {
        let mut jump = JumpState::Requested;

        let outcome = resolve_fudge(
            Vec3::new(0.0, 1.2, 0.0),
            Vec3::ZERO,
            DT,
            &geometry(),
            &LocomotionConfig::default(),
            &mut jump,
            &PlaneProbe::slope(Vec3::ZERO, 60.0),
        );

        assert_eq!(outcome, FudgeOutcome::Missed);
        assert_eq!(jump, JumpState::Requested, "request survives a miss");
    }

    #[test]
    fn no_ground_misses() {
        let mut jump = JumpState::Idle;
        let outcome = resolve_fudge(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::ZERO,
            DT,
            &geometry(),
            &LocomotionConfig::default(),
            &mut jump,
            &NoGround,
        );
        assert_eq!(outcome, FudgeOutcome::Missed);
    }

    #[test]
    fn second_cast_starts_at_foot_sphere() {
        let geometry = geometry();
        let position = Vec3::new(0.0, 1.2, 0.0);
        let probe = FnProbe(move |origin: Vec3, direction: Vec3, max: f32| {
            if origin == position {
                Some(CollisionData::new(1.2, Vec3::Y, Vec3::ZERO, None))
            } else {
                assert!((origin.y - 0.7).abs() < 1e-6);
                assert_eq!(direction, Vec3::NEG_Y);
                assert!((max - 1.2).abs() < 1e-6);
                Some(CollisionData::new(0.7, Vec3::Y, Vec3::ZERO, None))
            }
        });
        let mut jump = JumpState::Idle;

        let outcome = resolve_fudge(
            position,
            Vec3::ZERO,
            DT,
            &geometry,
            &LocomotionConfig::default(),
            &mut jump,
            &probe,
        );

        assert_eq!(outcome.change(), Some(Vec3::new(0.0, -0.7, 0.0)));
    }
}
