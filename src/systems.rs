//! Core controller systems.
//!
//! These systems are generic over the physics backend. The backend plugin adds
//! the engine-specific ones (contact harvesting and gravity).

use bevy::prelude::*;

use crate::backend::LocomotionBackend;
use crate::config::LocomotionConfig;
use crate::controller::{LocomotionController, TickInput};
use crate::intent::MovementIntent;
use crate::planner::Facing;
use crate::state::{Airborne, Falling, Grounded, Landed};

/// Capture capsule geometry for controllers that have not been initialized.
///
/// A missing or non-capsule collider is a configuration error and is returned
/// to Bevy's error handler.
pub fn initialize_controllers<B: LocomotionBackend>(world: &mut World) -> Result {
    let pending: Vec<(Entity, LocomotionConfig)> = world
        .query::<(Entity, &LocomotionConfig, &LocomotionController)>()
        .iter(world)
        .filter(|(_, _, controller)| !controller.is_initialized())
        .map(|(entity, config, _)| (entity, *config))
        .collect();

    for (entity, config) in pending {
        let shape = B::capsule_shape(world, entity)?;
        if let Some(mut controller) = world.get_mut::<LocomotionController>(entity) {
            controller.initialize(shape, &config)?;
        }
    }

    Ok(())
}

/// Turn jump button presses into jump requests.
///
/// Runs on the frame clock so a press is never missed between fixed ticks.
pub fn sample_jump_input(mut q: Query<(&mut MovementIntent, &mut LocomotionController)>) {
    for (mut intent, mut controller) in &mut q {
        if intent.take_jump_edge() {
            controller.request_jump();
        }
    }
}

/// Run the controller pipeline once for every initialized agent.
///
/// Body state is read through the backend; casts go through the backend's
/// ground probe. Each controller is moved out of the world for the duration of
/// its tick so the probe can borrow the world.
pub fn run_pipeline<B: LocomotionBackend>(world: &mut World) {
    let dt = world.resource::<Time>().delta_secs();
    if dt <= 0.0 {
        return;
    }

    let agents: Vec<(Entity, LocomotionConfig, Vec2)> = world
        .query::<(Entity, &LocomotionConfig, &LocomotionController, Option<&MovementIntent>)>()
        .iter(world)
        .filter(|(_, _, controller, _)| controller.is_initialized())
        .map(|(entity, config, _, intent)| (entity, *config, intent.map(|i| i.axis).unwrap_or(Vec2::ZERO)))
        .collect();

    for (entity, config, axis) in agents {
        let input = TickInput {
            position: B::get_position(world, entity),
            velocity: B::get_velocity(world, entity),
            facing: Facing::from_rotation(B::get_rotation(world, entity)),
            axis,
            dt,
        };

        let Some(mut slot) = world.get_mut::<LocomotionController>(entity) else {
            continue;
        };
        let mut controller = std::mem::take(&mut *slot);

        B::with_ground_probe(world, entity, |probe| controller.tick(&config, &input, probe));

        if let Some(mut slot) = world.get_mut::<LocomotionController>(entity) {
            *slot = controller;
        }
    }
}

/// Write each controller's velocity change to its rigid body.
pub fn apply_velocity_changes<B: LocomotionBackend>(world: &mut World) {
    let changes: Vec<(Entity, Vec3)> = world
        .query::<(Entity, &mut LocomotionController)>()
        .iter_mut(world)
        .map(|(entity, mut controller)| (entity, controller.take_velocity_change()))
        .filter(|(_, change)| *change != Vec3::ZERO)
        .collect();

    for (entity, change) in changes {
        B::apply_velocity_change(world, entity, change);
    }
}

/// Sync state marker components and send landing events.
pub fn sync_state_markers(
    mut commands: Commands,
    mut q_controllers: Query<(
        Entity,
        &mut LocomotionController,
        Has<Grounded>,
        Has<Airborne>,
        Has<Falling>,
    )>,
    mut landed: EventWriter<Landed>,
) {
    for (entity, mut controller, has_grounded, has_airborne, has_falling) in &mut q_controllers {
        if !controller.is_initialized() {
            continue;
        }

        let grounded = controller.grounded_last_frame();
        if grounded && !has_grounded {
            commands.entity(entity).insert(Grounded);
            commands.entity(entity).remove::<Airborne>();
        } else if !grounded && !has_airborne {
            commands.entity(entity).remove::<Grounded>();
            commands.entity(entity).insert(Airborne);
        }

        let falling = controller.is_falling();
        if falling && !has_falling {
            commands.entity(entity).insert(Falling);
        } else if !falling && has_falling {
            commands.entity(entity).remove::<Falling>();
        }

        if let Some(fall_speed) = controller.take_landed() {
            landed.write(Landed { entity, fall_speed });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{NoGround, PlaneProbe};
    use crate::backend::{GroundProbe, NoOpBackendPlugin};
    use crate::collision::ContactPoint;
    use crate::config::CapsuleShape;
    use crate::controller::{TickBranch, TickInput};
    use crate::error::LocomotionError;
    use crate::jump::JumpState;
    use crate::planner::Facing;
    use crate::LocomotionPlugin;

    /// Flat floor height the test backend casts against, if any.
    #[derive(Resource)]
    struct TestFloor(f32);

    /// Stand-in rigid body for a backend without a physics engine.
    #[derive(Component, Default)]
    struct TestBody {
        velocity: Vec3,
        capsule: Option<CapsuleShape>,
    }

    struct TestBackend;

    impl LocomotionBackend for TestBackend {
        fn plugin() -> impl Plugin {
            NoOpBackendPlugin
        }

        fn capsule_shape(world: &World, entity: Entity) -> Result<CapsuleShape, LocomotionError> {
            world
                .get::<TestBody>(entity)
                .and_then(|body| body.capsule)
                .ok_or(LocomotionError::MissingCollider(entity))
        }

        fn get_velocity(world: &World, entity: Entity) -> Vec3 {
            world
                .get::<TestBody>(entity)
                .map(|body| body.velocity)
                .unwrap_or(Vec3::ZERO)
        }

        fn get_position(world: &World, entity: Entity) -> Vec3 {
            world
                .get::<Transform>(entity)
                .map(|t| t.translation)
                .unwrap_or(Vec3::ZERO)
        }

        fn get_rotation(world: &World, entity: Entity) -> Quat {
            world
                .get::<Transform>(entity)
                .map(|t| t.rotation)
                .unwrap_or(Quat::IDENTITY)
        }

        fn with_ground_probe<R>(
            world: &mut World,
            _entity: Entity,
            f: impl FnOnce(&dyn GroundProbe) -> R,
        ) -> Option<R> {
            let floor = world.get_resource::<TestFloor>()?;
            Some(f(&PlaneProbe::flat(floor.0)))
        }

        fn apply_velocity_change(world: &mut World, entity: Entity, change: Vec3) {
            if let Some(mut body) = world.get_mut::<TestBody>(entity) {
                body.velocity += change;
            }
        }
    }

    fn create_test_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(LocomotionPlugin::<TestBackend>::default());
        app
    }

    fn spawn_agent(app: &mut App) -> Entity {
        app.world_mut()
            .spawn((
                Transform::from_xyz(0.0, 1.0, 0.0),
                LocomotionController::new(),
                LocomotionConfig::default(),
                MovementIntent::default(),
                TestBody {
                    velocity: Vec3::ZERO,
                    capsule: Some(CapsuleShape::new(2.0, 0.5)),
                },
            ))
            .id()
    }

    fn run_fixed(app: &mut App) {
        app.world_mut().run_schedule(FixedUpdate);
    }

    fn set_delta(app: &mut App, seconds: f32) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(std::time::Duration::from_secs_f32(seconds));
    }

    fn controller_mut(app: &mut App, entity: Entity) -> Mut<'_, LocomotionController> {
        app.world_mut()
            .get_mut::<LocomotionController>(entity)
            .unwrap()
    }

    fn tick_input(y: f32, vertical: f32) -> TickInput {
        TickInput {
            position: Vec3::new(0.0, y, 0.0),
            velocity: Vec3::new(0.0, vertical, 0.0),
            facing: Facing::default(),
            axis: Vec2::ZERO,
            dt: 1.0 / 60.0,
        }
    }

    /// Put the controller on flat ground at y = 0.
    fn stand_on_floor(app: &mut App, entity: Entity, floor: Entity) {
        let mut controller = controller_mut(app, entity);
        controller
            .collision_begin(floor, true, vec![ContactPoint::new(Vec3::ZERO, Vec3::Y)])
            .unwrap();
        let report = controller
            .tick(&LocomotionConfig::default(), &tick_input(1.0, 0.0), &PlaneProbe::flat(0.0))
            .unwrap();
        assert_eq!(report.branch, TickBranch::Grounded);
    }

    #[test]
    fn controllers_are_initialized_from_backend() {
        let mut app = create_test_app();
        let entity = spawn_agent(&mut app);

        run_fixed(&mut app);

        let controller = app.world().get::<LocomotionController>(entity).unwrap();
        let geometry = controller.geometry().unwrap();
        assert_eq!(geometry.half_height, 1.0);
        assert_eq!(geometry.fudge_check, 1.5);
        assert!(app.world().get::<Airborne>(entity).is_some());
        assert!(app.world().get::<Grounded>(entity).is_none());
    }

    #[test]
    #[should_panic]
    fn missing_capsule_is_fatal() {
        let mut app = create_test_app();
        app.world_mut().spawn((
            LocomotionController::new(),
            LocomotionConfig::default(),
            TestBody::default(),
        ));

        run_fixed(&mut app);
    }

    #[test]
    fn velocity_change_is_written_once() {
        let mut app = create_test_app();
        let entity = spawn_agent(&mut app);
        let floor = app.world_mut().spawn_empty().id();
        run_fixed(&mut app);

        stand_on_floor(&mut app, entity, floor);
        run_fixed(&mut app);

        // Idle on flat ground: one tick of gravity cancelled.
        let velocity = TestBackend::get_velocity(app.world(), entity);
        assert!((velocity.y - 9.81 / 60.0).abs() < 1e-5);

        run_fixed(&mut app);
        let again = TestBackend::get_velocity(app.world(), entity);
        assert_eq!(velocity, again);
    }

    #[test]
    fn markers_follow_ground_and_fall_state() {
        let mut app = create_test_app();
        let entity = spawn_agent(&mut app);
        let floor = app.world_mut().spawn_empty().id();
        run_fixed(&mut app);

        stand_on_floor(&mut app, entity, floor);
        run_fixed(&mut app);
        assert!(app.world().get::<Grounded>(entity).is_some());
        assert!(app.world().get::<Airborne>(entity).is_none());

        {
            let mut controller = controller_mut(&mut app, entity);
            controller.collision_end(floor);
            controller.tick(&LocomotionConfig::default(), &tick_input(3.0, -6.0), &NoGround);
        }
        run_fixed(&mut app);
        assert!(app.world().get::<Airborne>(entity).is_some());
        assert!(app.world().get::<Falling>(entity).is_some());

        stand_on_floor(&mut app, entity, floor);
        run_fixed(&mut app);
        assert!(app.world().get::<Grounded>(entity).is_some());
        assert!(app.world().get::<Falling>(entity).is_none());

        let events = app.world().resource::<Events<Landed>>();
        let landed: Vec<Landed> = events.iter_current_update_events().copied().collect();
        assert_eq!(
            landed,
            vec![Landed {
                entity,
                fall_speed: -6.0
            }]
        );
    }

    #[test]
    fn jump_press_is_sampled_once() {
        let mut app = create_test_app();
        let entity = spawn_agent(&mut app);
        let floor = app.world_mut().spawn_empty().id();
        run_fixed(&mut app);
        stand_on_floor(&mut app, entity, floor);

        app.world_mut()
            .get_mut::<MovementIntent>(entity)
            .unwrap()
            .set_jump_pressed(true);
        app.world_mut().run_schedule(Update);

        let controller = app.world().get::<LocomotionController>(entity).unwrap();
        assert_eq!(controller.jump_state(), JumpState::Requested);

        // Held across frames: the edge is not seen again.
        app.world_mut().run_schedule(Update);
        let controller = app.world().get::<LocomotionController>(entity).unwrap();
        assert_eq!(controller.jump_state(), JumpState::Requested);
        assert!(app.world().get::<MovementIntent>(entity).unwrap().jump_pressed_prev);
    }

    #[test]
    fn pipeline_reads_body_through_backend() {
        let mut app = create_test_app();
        app.insert_resource(TestFloor(0.0));
        let entity = spawn_agent(&mut app);
        let floor = app.world_mut().spawn_empty().id();
        run_fixed(&mut app);

        controller_mut(&mut app, entity)
            .collision_begin(floor, true, vec![ContactPoint::new(Vec3::ZERO, Vec3::Y)])
            .unwrap();
        app.world_mut()
            .get_mut::<MovementIntent>(entity)
            .unwrap()
            .set_forward(1.0);
        set_delta(&mut app, 1.0 / 60.0);
        run_fixed(&mut app);

        let controller = app.world().get::<LocomotionController>(entity).unwrap();
        assert!(controller.is_grounded());
        assert!(controller.grounded_last_frame());

        // Forward is -Z for an unrotated body; gravity is cancelled while grounded.
        let velocity = TestBackend::get_velocity(app.world(), entity);
        assert!(velocity.z < 0.0);
        assert!(velocity.x.abs() < 1e-5);
        assert!(app.world().get::<Grounded>(entity).is_some());
    }

    #[test]
    fn pipeline_skips_without_ground_probe() {
        let mut app = create_test_app();
        let entity = spawn_agent(&mut app);
        run_fixed(&mut app);

        set_delta(&mut app, 1.0 / 60.0);
        run_fixed(&mut app);

        let controller = app.world().get::<LocomotionController>(entity).unwrap();
        assert!(!controller.is_falling());
        assert_eq!(TestBackend::get_velocity(app.world(), entity), Vec3::ZERO);
    }

    #[test]
    fn pipeline_waits_for_time_to_advance() {
        let mut app = create_test_app();
        app.insert_resource(TestFloor(-10.0));
        let entity = spawn_agent(&mut app);
        run_fixed(&mut app);
        run_fixed(&mut app);

        let controller = app.world().get::<LocomotionController>(entity).unwrap();
        assert!(!controller.is_falling());
    }
}
