//! Movement command component.
//!
//! A movement command is the per-tick intent written by the player input
//! adapter or an AI. The locomotion systems read it; nothing in this crate
//! polls input devices.

use bevy::prelude::*;

use crate::math;

/// Per-tick movement intent for a character.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use harness_character_controller::prelude::*;
///
/// // Character faces -Z, the stick points to the right.
/// let command = MovementCommand::from_direction(Vec3::NEG_Z, Vec3::X, false, false);
/// assert!((command.turn - 90.0).abs() < 1e-3);
/// assert_eq!(command.forward, 1.0);
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Default)]
#[reflect(Component)]
pub struct MovementCommand {
    /// Requested turn in degrees. Positive turns right.
    pub turn: f32,
    /// Forward throttle in `[0, 1]`.
    pub forward: f32,
    /// Run instead of walk.
    pub run: bool,
    /// Jump this tick (only acted on while grounded).
    pub jump: bool,
    /// Edge event: flip the run latch.
    ///
    /// Cleared at the end of every fixed tick.
    pub toggle_run: bool,
    /// Edge event: attach to the reachable harness, or detach from the current one.
    ///
    /// Cleared at the end of every fixed tick.
    pub toggle_harness: bool,
}

impl MovementCommand {
    /// Create an idle command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a command that steers toward a world-space movement direction.
    ///
    /// The length of `desired` (clamped to 1) becomes the forward throttle.
    /// A zero direction produces no turn and no throttle.
    pub fn from_direction(facing: Vec3, desired: Vec3, run: bool, jump: bool) -> Self {
        let desired = desired.clamp_length_max(1.0);
        let magnitude = desired.length();
        if magnitude <= f32::EPSILON {
            return Self {
                run,
                jump,
                ..default()
            };
        }

        Self {
            turn: math::bearing(facing, desired),
            forward: magnitude,
            run,
            jump,
            ..default()
        }
    }

    /// Set turn and forward throttle. Throttle is clamped to `[0, 1]`.
    pub fn set_motion(&mut self, turn: f32, forward: f32) {
        self.turn = turn;
        self.forward = forward.clamp(0.0, 1.0);
    }

    /// Request a harness toggle this tick.
    pub fn request_harness_toggle(&mut self) {
        self.toggle_harness = true;
    }

    /// Request a run latch toggle this tick.
    pub fn request_run_toggle(&mut self) {
        self.toggle_run = true;
    }

    /// Forward throttle restricted to `[0, 1]`.
    #[inline]
    pub fn throttle(&self) -> f32 {
        if self.forward.is_nan() {
            0.0
        } else {
            self.forward.clamp(0.0, 1.0)
        }
    }

    /// Drop run and jump. Used while towing a load.
    pub fn suppress_run_and_jump(&mut self) {
        self.run = false;
        self.jump = false;
    }

    /// Clear the edge events.
    pub fn clear_edges(&mut self) {
        self.toggle_run = false;
        self.toggle_harness = false;
    }

    /// Reset everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
