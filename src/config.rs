//! Locomotion configuration components.
//!
//! This module defines the tuning for character locomotion: speeds,
//! acceleration, turn rate, ground sensing and orientation alignment.

use bevy::prelude::*;

/// How the vertical component of a character's velocity is produced.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub enum VerticalMotion {
    /// The physics engine owns gravity and ground contact.
    ///
    /// The controller only overwrites vertical velocity when jumping.
    #[default]
    PhysicsEngine,
    /// The controller scripts vertical velocity itself.
    ///
    /// While grounded and not jumping a small downward velocity, scaled by the
    /// slope, keeps the character pressed onto the ground. While airborne
    /// `gravity * gravity_fraction` is integrated every tick. Bodies using this
    /// mode should disable engine gravity (for example `GravityScale(0.0)`).
    Scripted {
        /// Gravity acceleration applied while airborne.
        gravity: Vec3,
        /// Multiplier on `gravity`.
        gravity_fraction: f32,
    },
}

impl VerticalMotion {
    /// Scripted vertical motion with standard earth gravity.
    pub fn scripted(gravity_fraction: f32) -> Self {
        Self::Scripted {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            gravity_fraction,
        }
    }
}

/// Locomotion tuning for a character.
///
/// Every value has a supported range; see [`LocomotionConfig::clamped`].
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct LocomotionConfig {
    // === Speeds ===
    /// Walking speed in units per second.
    pub walk_speed: f32,
    /// Running speed in units per second.
    pub run_speed: f32,
    /// Forward acceleration in units per second squared.
    pub acceleration: f32,
    /// Maximum turn rate in degrees per second.
    pub rot_speed: f32,
    /// Vertical velocity set when jumping.
    pub jump_speed: f32,

    // === Ground Sensing ===
    /// Collision groups the grounded probe can stand on.
    pub walkable_groups: u32,
    /// Collision groups whose normals count toward ground alignment.
    pub ground_groups: u32,
    /// Number of segment casts used to sample the ground normal.
    pub normal_samples: usize,
    /// Radius of the circle the normal samples are spread over.
    pub ground_smooth_radius: f32,
    /// Length of the downward sphere probe.
    pub grounded_probe_distance: f32,
    /// Sphere probe radius as a fraction of the capsule radius.
    pub grounded_probe_radius_scale: f32,
    /// How far below the capsule bottom the normal samples reach.
    pub normal_sample_depth: f32,
    /// Minimum world-up component for a sampled normal to count.
    pub min_ground_normal_y: f32,

    // === Orientation ===
    /// Rate of alignment toward the ground normal while grounded.
    pub ground_align_speed: f32,
    /// Rate of alignment toward world up while airborne.
    pub air_align_speed: f32,

    // === Turn Shaping ===
    /// Rate (per second) at which angular velocity approaches its target.
    pub turn_response: f32,
    /// Offset added to the requested turn before the turn scaling ramp.
    pub turn_scale_offset: f32,
    /// Width of the turn scaling ramp in degrees.
    pub turn_scale_range: f32,

    // === Vertical ===
    /// Policy for the vertical velocity component.
    pub vertical_motion: VerticalMotion,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            walk_speed: 1.0,
            run_speed: 2.0,
            acceleration: 5.0,
            rot_speed: 120.0,
            jump_speed: 1.0,

            walkable_groups: u32::MAX,
            ground_groups: u32::MAX,
            normal_samples: 4,
            ground_smooth_radius: 0.1,
            grounded_probe_distance: 0.01,
            grounded_probe_radius_scale: 0.95,
            normal_sample_depth: 0.05,
            min_ground_normal_y: 0.75,

            ground_align_speed: 10.0,
            air_align_speed: 1.5,

            turn_response: 20.0,
            turn_scale_offset: 25.0,
            turn_scale_range: 45.0,

            vertical_motion: VerticalMotion::PhysicsEngine,
        }
    }
}

impl LocomotionConfig {
    /// Preset for a player-driven pony.
    pub fn player() -> Self {
        Self::default()
    }

    /// Preset for AI-driven characters. Slower turning keeps paths smooth.
    pub fn ai() -> Self {
        Self {
            rot_speed: 90.0,
            ..default()
        }
    }

    /// Copy of this config with every tuning value restricted to its supported range.
    ///
    /// NaN values fall back to the default.
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        let clamp = |value: f32, min: f32, max: f32, fallback: f32| {
            if value.is_nan() {
                fallback
            } else {
                value.clamp(min, max)
            }
        };

        let vertical_motion = match self.vertical_motion {
            VerticalMotion::PhysicsEngine => VerticalMotion::PhysicsEngine,
            VerticalMotion::Scripted {
                gravity,
                gravity_fraction,
            } => VerticalMotion::Scripted {
                gravity,
                gravity_fraction: clamp(gravity_fraction, 0.25, 2.5, 1.0),
            },
        };

        Self {
            walk_speed: clamp(self.walk_speed, 0.5, 2.0, defaults.walk_speed),
            run_speed: clamp(self.run_speed, 1.0, 4.0, defaults.run_speed),
            acceleration: clamp(self.acceleration, 1.0, 10.0, defaults.acceleration),
            rot_speed: clamp(self.rot_speed, 60.0, 720.0, defaults.rot_speed),
            jump_speed: clamp(self.jump_speed, 0.5, 3.0, defaults.jump_speed),
            normal_samples: self.normal_samples.min(21),
            ground_smooth_radius: clamp(
                self.ground_smooth_radius,
                0.0,
                1.0,
                defaults.ground_smooth_radius,
            ),
            ground_align_speed: clamp(
                self.ground_align_speed,
                1.0,
                24.0,
                defaults.ground_align_speed,
            ),
            air_align_speed: clamp(self.air_align_speed, 0.25, 24.0, defaults.air_align_speed),
            vertical_motion,
            ..*self
        }
    }

    /// Target forward speed for a command.
    pub fn target_speed(&self, forward: f32, run: bool) -> f32 {
        forward * if run { self.run_speed } else { self.walk_speed }
    }

    /// Set walking and running speeds.
    pub fn with_speeds(mut self, walk: f32, run: f32) -> Self {
        self.walk_speed = walk;
        self.run_speed = run;
        self
    }

    /// Set forward acceleration.
    pub fn with_acceleration(mut self, acceleration: f32) -> Self {
        self.acceleration = acceleration;
        self
    }

    /// Set maximum turn rate in degrees per second.
    pub fn with_rot_speed(mut self, rot_speed: f32) -> Self {
        self.rot_speed = rot_speed;
        self
    }

    /// Set jump speed.
    pub fn with_jump_speed(mut self, speed: f32) -> Self {
        self.jump_speed = speed;
        self
    }

    /// Set the walkable and ground-normal collision groups.
    pub fn with_ground_groups(mut self, walkable: u32, ground: u32) -> Self {
        self.walkable_groups = walkable;
        self.ground_groups = ground;
        self
    }

    /// Set the ground normal sampling pattern.
    pub fn with_normal_sampling(mut self, samples: usize, radius: f32) -> Self {
        self.normal_samples = samples;
        self.ground_smooth_radius = radius;
        self
    }

    /// Set ground and air alignment rates.
    pub fn with_align_speeds(mut self, ground: f32, air: f32) -> Self {
        self.ground_align_speed = ground;
        self.air_align_speed = air;
        self
    }

    /// Set the vertical motion policy.
    pub fn with_vertical_motion(mut self, vertical_motion: VerticalMotion) -> Self {
        self.vertical_motion = vertical_motion;
        self
    }
}
