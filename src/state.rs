//! Locomotion state and state marker components.
//!
//! [`LocomotionState`] carries the smoothed velocities the controller
//! integrates tick to tick. The marker components indicate the current
//! physical regime and are added/removed automatically from the ground sensor.

use bevy::prelude::*;

use crate::config::LocomotionConfig;
use crate::math::move_towards;

/// Integrated locomotion state of a character.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Default)]
#[reflect(Component)]
pub struct LocomotionState {
    /// Current forward speed along the character's facing.
    pub forward_velocity: f32,
    /// Current turn in degrees per tick. Positive turns right.
    pub angular_velocity: f32,
    /// Whether the character is towing a load through a harness.
    pub is_pulling_load: bool,
    /// Latched run mode, flipped by the run toggle edge.
    pub run_latched: bool,
}

impl LocomotionState {
    /// Create a resting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current forward speed.
    #[inline]
    pub fn forward_speed(&self) -> f32 {
        self.forward_velocity
    }

    /// Effective run flag: the held run input inverts the latch.
    #[inline]
    pub fn effective_run(&self, run_held: bool) -> bool {
        run_held != self.run_latched
    }

    /// Accelerate forward speed toward `target` by at most `acceleration * dt`.
    pub fn step_forward(&mut self, target: f32, acceleration: f32, dt: f32) -> f32 {
        self.forward_velocity = move_towards(self.forward_velocity, target, acceleration * dt);
        self.forward_velocity
    }

    /// Shape the requested turn into this tick's rotation in degrees.
    ///
    /// The turn target is capped by `rot_speed * dt`. Small requests are scaled
    /// down, and a request smaller than the current angular velocity snaps to
    /// the target so the character never turns past what was asked.
    pub fn step_turn(&mut self, turn: f32, config: &LocomotionConfig, dt: f32) -> f32 {
        let max_step = config.rot_speed * dt;
        let target = turn.clamp(-max_step, max_step);
        let scale =
            ((turn.abs() + config.turn_scale_offset) / config.turn_scale_range).clamp(0.0, 1.0);

        self.angular_velocity =
            move_towards(self.angular_velocity, target, config.turn_response * dt) * scale;

        if turn.abs() < self.angular_velocity.abs() {
            self.angular_velocity = target;
        }
        self.angular_velocity
    }
}

/// Marker component indicating the character is grounded.
///
/// Added automatically when the ground sensor's probe touches walkable
/// ground. Removed when the character becomes airborne.
///
/// This is a marker component - it has no data, just indicates state.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use harness_character_controller::prelude::*;
///
/// // Grounded is a marker component - just use it in queries
/// fn check_grounded(grounded: Option<&Grounded>) -> bool {
///     grounded.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker component on a character that is towing a load.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Towing;
