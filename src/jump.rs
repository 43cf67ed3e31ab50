//! Jump lifecycle.
//!
//! A jump moves through four states:
//!
//! ```text
//!   Idle ──button edge──▶ Requested ──impulse──▶ Applied ──left ground──▶ Airborne
//!    ▲                                                                      │
//!    └────────────────── landed / new collision ────────────────────────────┘
//! ```
//!
//! `Applied` and `Airborne` both lock out the fudge re-snap, so the agent is
//! not pulled back onto the surface it just jumped from. A request made one
//! tick before walking off a ledge is still honored by the fudge resolver.

use bevy::prelude::*;

/// Where the agent is in its jump lifecycle.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JumpState {
    /// Touched ground since the last jump; a new jump may be requested.
    #[default]
    Idle,
    /// Button pressed while grounded; the impulse goes out next fixed tick.
    Requested,
    /// Impulse applied, still waiting to leave the ground.
    Applied,
    /// Left the ground after a jump and has not landed yet.
    Airborne,
}

impl JumpState {
    /// Register a jump-button-down edge from the frame clock.
    ///
    /// Only an idle agent that was grounded last tick can request a jump.
    /// Returns whether the request was accepted.
    pub fn request(&mut self, grounded_last_frame: bool) -> bool {
        match *self {
            JumpState::Idle if grounded_last_frame => {
                *self = JumpState::Requested;
                true
            }
            JumpState::Idle | JumpState::Requested | JumpState::Applied | JumpState::Airborne => {
                false
            }
        }
    }

    /// Consume a pending request. Returns `true` if the impulse should be applied now.
    pub fn consume_request(&mut self) -> bool {
        match *self {
            JumpState::Requested => {
                *self = JumpState::Applied;
                true
            }
            JumpState::Idle | JumpState::Applied | JumpState::Airborne => false,
        }
    }

    /// Advance after the ground classifier has run for this tick.
    pub fn on_ground_classified(&mut self, grounded: bool) {
        *self = match (*self, grounded) {
            (JumpState::Applied, false) => JumpState::Airborne,
            (JumpState::Airborne, true) => JumpState::Idle,
            (state, _) => state,
        };
    }

    /// A new collision began; landing on anything cancels the airborne lockout.
    pub fn on_collision_begin(&mut self) {
        if *self == JumpState::Airborne {
            *self = JumpState::Idle;
        }
    }

    /// Whether the fudge resolver may re-snap the agent to the ground.
    #[inline]
    pub fn permits_fudge(self) -> bool {
        match self {
            JumpState::Idle | JumpState::Requested => true,
            JumpState::Applied | JumpState::Airborne => false,
        }
    }
}
