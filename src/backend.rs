//! Physics backend abstraction.
//!
//! The controller needs very little from the physics engine:
//!
//! - a directional cast ([`GroundProbe`]) used by the ground classifier and the
//!   fudge resolver,
//! - the capsule dimensions once at initialization,
//! - the body's position, rotation and velocity every tick,
//! - a way to add a velocity change to the rigid body.
//!
//! [`LocomotionBackend`] bundles the world-level accessors plus the plugin that
//! wires backend-specific systems (contact harvesting, gravity) into the
//! [`LocomotionSet`](crate::LocomotionSet) phases. The per-tick pipeline itself
//! is generic and only reaches the engine through these accessors.

use bevy::prelude::*;

use crate::collision::CollisionData;
use crate::config::CapsuleShape;
use crate::error::LocomotionError;

/// Directional cast primitive.
///
/// Implementations decide which bodies are eligible (self-exclusion, collision
/// groups); the controller only supplies the ray.
pub trait GroundProbe {
    /// Cast from `origin` along `direction` (normalized) up to `max_distance`.
    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData>;
}

/// Trait for physics backend implementations.
///
/// Implement this trait to drive the locomotion controller from a physics
/// engine. See `Rapier3dBackend` for the Rapier3D implementation.
pub trait LocomotionBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Capsule dimensions of the entity's collider.
    ///
    /// Called once when the controller is initialized; errors are fatal.
    fn capsule_shape(world: &World, entity: Entity) -> Result<CapsuleShape, LocomotionError>;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Get the current world position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3;

    /// Get the current world rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat;

    /// Run `f` with a probe that casts against everything except `entity`.
    ///
    /// Returns `None` when the backend has no world to cast against yet.
    fn with_ground_probe<R>(
        world: &mut World,
        entity: Entity,
        f: impl FnOnce(&dyn GroundProbe) -> R,
    ) -> Option<R>;

    /// Add an instantaneous velocity change to an entity.
    ///
    /// Mass-independent: a change of `v` alters the body velocity by exactly `v`.
    fn apply_velocity_change(world: &mut World, entity: Entity, change: Vec3);
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
