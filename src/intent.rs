//! Movement intent component.
//!
//! The intent is the only input the controller reads: two axes and the jump
//! button. Your code fills it from keyboard, gamepad, AI or replay; the
//! controller systems do the rest.

use bevy::prelude::*;

use crate::planner::normalize_axis;

/// Desired movement for one agent.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_locomotion::prelude::*;
///
/// let mut intent = MovementIntent::new();
/// intent.set_axis(Vec2::new(1.0, 1.0));
/// assert!(intent.is_moving());
/// assert!((intent.normalized_axis().length() - 1.0).abs() < 1e-6);
///
/// intent.clear();
/// assert!(!intent.is_moving());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Strafe (x, +right) and forward (y, +forward) input, each in [-1, 1].
    pub axis: Vec2,
    /// Whether the jump button is currently held.
    ///
    /// Set this every frame; a jump is requested on the rising edge only.
    ///
    /// ```rust,ignore
    /// intent.set_jump_pressed(keyboard.pressed(KeyCode::Space));
    /// ```
    pub jump_pressed: bool,
    /// Previous frame's `jump_pressed`, managed by the controller.
    pub(crate) jump_pressed_prev: bool,
}

impl MovementIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both axes. Each component is clamped to [-1, 1].
    pub fn set_axis(&mut self, axis: Vec2) {
        self.axis = axis.clamp(Vec2::NEG_ONE, Vec2::ONE);
    }

    /// Set the strafe axis (-1.0 = left, 1.0 = right).
    pub fn set_strafe(&mut self, value: f32) {
        self.axis.x = value.clamp(-1.0, 1.0);
    }

    /// Set the forward axis (-1.0 = back, 1.0 = forward).
    pub fn set_forward(&mut self, value: f32) {
        self.axis.y = value.clamp(-1.0, 1.0);
    }

    /// Clear both axes. The jump button state is left alone.
    pub fn clear(&mut self) {
        self.axis = Vec2::ZERO;
    }

    /// Axes clamped to the unit disc, as the planner consumes them.
    pub fn normalized_axis(&self) -> Vec2 {
        normalize_axis(self.axis)
    }

    /// Check if there is any directional input.
    pub fn is_moving(&self) -> bool {
        self.axis.length_squared() > 0.0
    }

    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.jump_pressed = pressed;
    }

    pub fn is_jump_pressed(&self) -> bool {
        self.jump_pressed
    }

    /// Advance the edge detector. Returns `true` on the frame the button went down.
    pub(crate) fn take_jump_edge(&mut self) -> bool {
        let edge = self.jump_pressed && !self.jump_pressed_prev;
        self.jump_pressed_prev = self.jump_pressed;
        edge
    }
}
