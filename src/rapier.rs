//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature (on by default).

use std::collections::HashMap;

use bevy::ecs::schedule::ScheduleLabel;
use bevy::ecs::system::SystemState;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::backend::{GroundProbe, LocomotionBackend};
use crate::collision::{CollisionData, ContactPoint};
use crate::config::CapsuleShape;
use crate::controller::LocomotionController;
use crate::error::LocomotionError;

/// Rapier3D physics backend for the locomotion controller.
///
/// World accessors read and write Rapier components directly. Contact
/// harvesting runs in a dedicated Rapier system; ground casts go through a
/// [`RapierGroundProbe`] built from the world's single `RapierContext`.
///
/// Rapier must step on the fixed schedule
/// (`RapierPhysicsPlugin::default().in_fixed_schedule()`) so that each
/// controller tick matches one simulation step.
pub struct Rapier3dBackend;

impl LocomotionBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn capsule_shape(world: &World, entity: Entity) -> Result<CapsuleShape, LocomotionError> {
        let collider = world
            .get::<Collider>(entity)
            .ok_or(LocomotionError::MissingCollider(entity))?;
        capsule_shape(collider).ok_or(LocomotionError::NotACapsule(entity))
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.rotation()))
            .unwrap_or(Quat::IDENTITY)
    }

    fn with_ground_probe<R>(
        world: &mut World,
        entity: Entity,
        f: impl FnOnce(&dyn GroundProbe) -> R,
    ) -> Option<R> {
        let groups = world.get::<CollisionGroups>(entity).copied();
        let mut state = SystemState::<ReadRapierContext>::new(world);
        let rapier_context = state.get(world);
        let context = rapier_context.single().ok()?;
        let probe = RapierGroundProbe::new(&context, entity, groups);
        Some(f(&probe))
    }

    fn apply_velocity_change(world: &mut World, entity: Entity, change: Vec3) {
        if let Some(mut velocity) = world.get_mut::<Velocity>(entity) {
            velocity.linvel += change;
        }
    }
}

/// Plugin that sets up Rapier3D-specific systems for the locomotion controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        use crate::LocomotionSet;

        app.add_systems(
            FixedUpdate,
            sync_rapier_gravity.in_set(LocomotionSet::Preparation),
        );

        app.add_systems(
            FixedUpdate,
            rapier_harvest_contacts.in_set(LocomotionSet::Contacts),
        );
    }

    fn finish(&self, app: &mut App) {
        if !steps_on_fixed_schedule(app) {
            warn!(
                "Rapier is not stepping on the fixed schedule; use \
                 `RapierPhysicsPlugin::default().in_fixed_schedule()` so each \
                 locomotion tick matches one simulation step"
            );
        }
    }
}

/// Whether Rapier's simulation step is configured in `FixedPostUpdate`.
pub fn steps_on_fixed_schedule(app: &App) -> bool {
    schedule_has_set(app, FixedPostUpdate, PhysicsSet::StepSimulation)
}

fn schedule_has_set(app: &App, label: impl ScheduleLabel, set: impl SystemSet) -> bool {
    let Some(schedule) = app.get_schedule(label) else {
        return false;
    };
    let set: &dyn SystemSet = &set;
    schedule
        .graph()
        .system_sets()
        .any(|(_, existing, _)| existing == set)
}

/// Capsule dimensions of a collider, or `None` for other shapes.
pub fn capsule_shape(collider: &Collider) -> Option<CapsuleShape> {
    let capsule = collider.as_capsule()?;
    let segment = capsule.segment();
    let segment_length = (segment.a() - segment.b()).length();
    let radius = capsule.radius();
    Some(CapsuleShape::new(segment_length + 2.0 * radius, radius))
}

/// [`GroundProbe`] backed by Rapier ray casts.
pub struct RapierGroundProbe<'a, 'w> {
    context: &'a RapierContext<'w>,
    filter: QueryFilter<'a>,
}

impl<'a, 'w> RapierGroundProbe<'a, 'w> {
    /// Probe that ignores `entity`'s own rigid body and all sensors, and
    /// honors the entity's collision groups when present.
    pub fn new(context: &'a RapierContext<'w>, entity: Entity, groups: Option<CollisionGroups>) -> Self {
        let mut filter = QueryFilter::default()
            .exclude_rigid_body(entity)
            .exclude_sensors();
        if let Some(groups) = groups {
            filter = filter.groups(groups);
        }
        Self { context, filter }
    }
}

impl GroundProbe for RapierGroundProbe<'_, '_> {
    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData> {
        self.context
            .cast_ray_and_get_normal(origin, direction, max_distance, true, self.filter)
            .map(|(hit_entity, hit)| {
                CollisionData::new(hit.time_of_impact, hit.normal, hit.point, Some(hit_entity))
            })
    }
}

/// Copy world gravity from the Rapier configuration into every controller.
fn sync_rapier_gravity(
    q_config: Query<&RapierConfiguration>,
    mut q_controllers: Query<&mut LocomotionController>,
) {
    let Ok(config) = q_config.single() else {
        return;
    };

    for mut controller in &mut q_controllers {
        if controller.gravity() != config.gravity {
            controller.set_gravity(config.gravity);
        }
    }
}

/// Whether the body owning `collider` never moves.
///
/// Colliders without a rigid body (on themselves or their parent) are static,
/// as are fixed bodies.
fn is_static_body(collider: Entity, q_bodies: &Query<&RigidBody>, q_parents: &Query<&ChildOf>) -> bool {
    let body = q_bodies.get(collider).ok().or_else(|| {
        q_parents
            .get(collider)
            .ok()
            .and_then(|child_of| q_bodies.get(child_of.parent()).ok())
    });

    match body {
        None | Some(RigidBody::Fixed) => true,
        Some(_) => false,
    }
}

/// Turn Rapier's narrow-phase contact pairs into begin / stay / end updates.
///
/// Only pairs with at least one active contact count as touching. Normals are
/// flipped where needed so they point from the other body toward the agent.
fn rapier_harvest_contacts(
    rapier_context: ReadRapierContext,
    q_bodies: Query<&RigidBody>,
    q_parents: Query<&ChildOf>,
    mut q_controllers: Query<(Entity, &mut LocomotionController)>,
) -> Result {
    let Ok(context) = rapier_context.single() else {
        return Ok(());
    };

    for (entity, mut controller) in &mut q_controllers {
        let mut touching: HashMap<Entity, Vec<ContactPoint>> = HashMap::new();

        for pair in context.contact_pairs_with(entity) {
            if !pair.has_any_active_contact() {
                continue;
            }
            let (Some(collider1), Some(collider2)) = (pair.collider1(), pair.collider2()) else {
                continue;
            };
            // Manifold normals point from collider1 toward collider2.
            let (other, sign): (Entity, f32) = if collider1 == entity {
                (collider2, -1.0)
            } else {
                (collider1, 1.0)
            };

            let points = touching.entry(other).or_default();
            for manifold in pair.manifolds() {
                let normal = manifold.normal() * sign;
                for contact in manifold.solver_contacts() {
                    points.push(ContactPoint::new(contact.point(), normal));
                }
            }
        }

        let ended: Vec<Entity> = controller
            .contacts()
            .bodies()
            .filter(|body| !touching.contains_key(body))
            .collect();
        for body in ended {
            debug!("contact ended between {entity} and {body}");
            controller.collision_end(body);
        }

        for (other, points) in touching {
            if controller.contacts().contains(other) {
                controller.collision_stay(other, points)?;
            } else {
                let is_static = is_static_body(other, &q_bodies, &q_parents);
                debug!(is_static, "contact began between {entity} and {other}");
                controller.collision_begin(other, is_static, points)?;
            }
        }
    }

    Ok(())
}

/// Bundle for creating a locomotion agent with Rapier3D physics.
///
/// Provides a dynamic rigid body that cannot tip over, with a frictionless,
/// non-bouncy material. Friction and restitution combine with `Min` so the
/// agent does not stick to walls or bounce off floors regardless of the other
/// body's material; all ground response comes from the controller.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_locomotion::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default().in_fixed_schedule())
///     .add_plugins(LocomotionPlugin::<Rapier3dBackend>::default())
///     .add_systems(Startup, spawn_player);
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 2.0, 0.0),
///         LocomotionController::new(),
///         LocomotionConfig::player(),
///         MovementIntent::default(),
///         Rapier3dCharacterBundle::new(),
///         // Total height 2.0, radius 0.5
///         Collider::capsule_y(0.5, 0.5),
///     ));
/// }
/// ```
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    /// Should stay [`RigidBody::Dynamic`].
    pub rigid_body: RigidBody,
    /// Linear velocity is where the controller writes its changes.
    pub velocity: Velocity,
    /// Rotation is locked by default.
    pub locked_axes: LockedAxes,
    pub friction: Friction,
    pub restitution: Restitution,
}

impl Default for Rapier3dCharacterBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Rapier3dCharacterBundle {
    /// Dynamic, rotation-locked, frictionless and non-bouncy.
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            friction: Friction {
                coefficient: 0.0,
                combine_rule: CoefficientCombineRule::Min,
            },
            restitution: Restitution {
                coefficient: 0.0,
                combine_rule: CoefficientCombineRule::Min,
            },
        }
    }

    /// Set the rigid body type.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set which axes are locked.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}
