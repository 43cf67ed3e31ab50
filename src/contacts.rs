//! Contact aggregation.
//!
//! The physics engine reports contacts as begin / stay / end notifications per
//! colliding body. [`ContactSet`] keeps the latest contact points for every
//! body that is still touching the agent so the ground classifier can look at
//! all of them each tick.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::collision::ContactPoint;
use crate::error::LocomotionError;

/// Contact points retained for one colliding body.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedBody {
    /// Whether the body never moves (no rigid body, or a fixed one).
    pub is_static: bool,
    /// Latest contact points for this body, in engine order.
    pub points: Vec<ContactPoint>,
}

/// Every body currently in contact with the agent, with its contact points.
///
/// Invariant: every key corresponds to a collision that was active this tick
/// or the previous one.
#[derive(Debug, Clone, Default)]
pub struct ContactSet {
    bodies: HashMap<Entity, TrackedBody>,
    touching_dynamic: bool,
}

impl ContactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `body`.
    ///
    /// Re-beginning a body that is already tracked replaces its entry.
    pub fn begin(
        &mut self,
        body: Entity,
        is_static: bool,
        points: Vec<ContactPoint>,
    ) -> Result<(), LocomotionError> {
        validate(body, &points)?;

        if self.bodies.contains_key(&body) {
            debug!("contact begin for already tracked body {body}, replacing");
        }

        self.bodies.insert(body, TrackedBody { is_static, points });
        if !is_static {
            self.touching_dynamic = true;
        }
        Ok(())
    }

    /// Replace the contact points of a tracked body.
    ///
    /// Returns `false` if `body` was not tracked; nothing is stored then.
    pub fn stay(&mut self, body: Entity, points: Vec<ContactPoint>) -> Result<bool, LocomotionError> {
        validate(body, &points)?;

        match self.bodies.get_mut(&body) {
            Some(tracked) => {
                tracked.points = points;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop tracking `body`. Returns whether it was tracked.
    pub fn end(&mut self, body: Entity) -> bool {
        let removed = self.bodies.remove(&body).is_some();

        self.touching_dynamic = self.bodies.values().any(|tracked| !tracked.is_static);
        if self.bodies.is_empty() {
            self.touching_dynamic = false;
        }

        removed
    }

    /// Whether any tracked body is non-static.
    #[inline]
    pub fn touching_dynamic(&self) -> bool {
        self.touching_dynamic
    }

    pub fn contains(&self, body: Entity) -> bool {
        self.bodies.contains_key(&body)
    }

    pub fn get(&self, body: Entity) -> Option<&TrackedBody> {
        self.bodies.get(&body)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Entities of every tracked body.
    pub fn bodies(&self) -> impl Iterator<Item = Entity> + '_ {
        self.bodies.keys().copied()
    }

    /// Every retained contact point across all tracked bodies.
    pub fn points(&self) -> impl Iterator<Item = &ContactPoint> + '_ {
        self.bodies.values().flat_map(|tracked| tracked.points.iter())
    }
}

fn validate(body: Entity, points: &[ContactPoint]) -> Result<(), LocomotionError> {
    if points.iter().all(ContactPoint::is_finite) {
        Ok(())
    } else {
        Err(LocomotionError::MalformedContact { body })
    }
}
