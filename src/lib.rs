//! # `msg_locomotion`
//!
//! A 3D rigidbody player locomotion controller with physics backend abstraction.
//!
//! This crate provides a responsive, tuneable controller that:
//! - Classifies ground from raw contact points, re-probed against the surface
//! - Projects movement onto arbitrary slopes up to a maximum angle
//! - Ramps velocity toward the input target at bounded rates
//! - Runs a four-state jump lifecycle (idle, requested, applied, airborne)
//! - "Fudges" single-tick ground gaps (stair edges, small drops) so the agent
//!   stays glued to the ground instead of stuttering
//! - Abstracts the physics backend (Rapier3D included)
//!
//! ## Architecture
//!
//! The agent is a dynamic, rotation-locked rigid body. Every fixed tick:
//! 1. The backend turns narrow-phase contacts into begin / stay / end updates
//! 2. The controller classifies ground and advances the jump state
//! 3. It plans a grounded, fudged or air-strafe velocity change
//! 4. The change is added to the rigid body's velocity
//!
//! The jump button is sampled on the frame clock so presses between fixed
//! ticks are never lost.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use msg_locomotion::prelude::*;
//!
//! // Controller components for a player
//! let controller = LocomotionController::new();
//! let config = LocomotionConfig::player();
//! let intent = MovementIntent::default();
//!
//! // Spawn these together with a rigid body bundle and a capsule collider
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod contacts;
pub mod controller;
pub mod error;
pub mod fudge;
pub mod ground;
pub mod intent;
pub mod jump;
pub mod planner;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub use intent::MovementIntent;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{GroundProbe, LocomotionBackend};
    pub use crate::collision::{CollisionData, ContactPoint};
    pub use crate::config::{CapsuleGeometry, CapsuleShape, LocomotionConfig};
    pub use crate::controller::{LocomotionController, TickBranch, TickInput, TickReport};
    pub use crate::error::LocomotionError;
    pub use crate::ground::GroundState;
    pub use crate::intent::MovementIntent;
    pub use crate::jump::JumpState;
    pub use crate::planner::Facing;
    pub use crate::state::{Airborne, Falling, Grounded, Landed};
    pub use crate::{LocomotionPlugin, LocomotionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle};
}

/// Fixed-tick phases of the controller, run in this order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    /// Initialization and gravity sync.
    Preparation,
    /// Contact begin / stay / end.
    Contacts,
    /// Ground classification, jump state and velocity planning.
    Pipeline,
    /// Velocity changes written to the rigid bodies.
    FinalApplication,
    /// Marker components and events.
    StateSync,
}

/// Main plugin for the locomotion controller.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (casts, contacts, velocity changes).
///
/// The pipeline runs once per `FixedUpdate`, so the physics engine has to
/// step on the fixed schedule as well.
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_locomotion::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default().in_fixed_schedule())
///     .add_plugins(LocomotionPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct LocomotionPlugin<B: backend::LocomotionBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::LocomotionBackend> Default for LocomotionPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::LocomotionBackend> Plugin for LocomotionPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<controller::LocomotionController>();
        app.register_type::<config::LocomotionConfig>();
        app.register_type::<config::CapsuleGeometry>();
        app.register_type::<ground::GroundState>();
        app.register_type::<jump::JumpState>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::Falling>();

        app.add_event::<state::Landed>();

        app.configure_sets(
            FixedUpdate,
            (
                LocomotionSet::Preparation,
                LocomotionSet::Contacts,
                LocomotionSet::Pipeline,
                LocomotionSet::FinalApplication,
                LocomotionSet::StateSync,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        // Jump edges on the frame clock
        app.add_systems(Update, systems::sample_jump_input);

        app.add_systems(
            FixedUpdate,
            systems::initialize_controllers::<B>.in_set(LocomotionSet::Preparation),
        );
        app.add_systems(
            FixedUpdate,
            systems::run_pipeline::<B>.in_set(LocomotionSet::Pipeline),
        );
        app.add_systems(
            FixedUpdate,
            systems::apply_velocity_changes::<B>.in_set(LocomotionSet::FinalApplication),
        );
        app.add_systems(
            FixedUpdate,
            systems::sync_state_markers.in_set(LocomotionSet::StateSync),
        );
    }
}
