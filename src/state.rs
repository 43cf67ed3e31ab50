//! State marker components and events.
//!
//! The markers mirror the controller's observables so gameplay code can filter
//! queries with `With<Grounded>` instead of reading the controller. They are
//! added and removed by the controller systems at the end of each fixed tick.

use bevy::prelude::*;

/// Marker component indicating the agent is grounded.
///
/// Mutually exclusive with [`Airborne`].
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_locomotion::prelude::*;
///
/// fn count_grounded(agents: Query<(), With<Grounded>>) -> usize {
///     agents.iter().count()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the agent is not grounded.
///
/// Ticks held on the ground by the fudge probe still count as grounded.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker component indicating the agent is falling.
///
/// Present from the first genuinely airborne tick until the agent lands.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Falling;

/// Sent on the tick a falling agent touches walkable ground again.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct Landed {
    pub entity: Entity,
    /// Vertical velocity on the last airborne tick (negative when moving down).
    pub fall_speed: f32,
}
