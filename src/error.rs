//! Configuration errors surfaced while setting up a controller.
//!
//! The per-tick pipeline never fails. Anything that would make it produce
//! garbage is rejected here instead, before the first simulation tick.

use bevy::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocomotionError {
    #[error("entity {0} has a locomotion controller but no collider")]
    MissingCollider(Entity),

    #[error("entity {0} collider is not a capsule")]
    NotACapsule(Entity),

    #[error("capsule height {height} and radius {radius} do not describe a valid capsule")]
    DegenerateCapsule { height: f32, radius: f32 },

    #[error("contact list reported for body {body} contains non-finite geometry")]
    MalformedContact { body: Entity },
}
