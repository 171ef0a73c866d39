//! # `harness_character_controller`
//!
//! A 3D rigidbody character controller with a harness for towing loads,
//! built on a physics backend abstraction.
//!
//! This crate provides a character controller that:
//! - Detects ground with a sphere probe and smooths the ground normal with
//!   a ring of segment casts
//! - Accelerates toward a walk or run speed and shapes turning so it never
//!   overshoots the requested heading
//! - Aligns the character to the ground while grounded and rights it while airborne
//! - Attaches towable objects with a runtime-created joint whose anchor tracks
//!   a reference point on the towing character
//! - Abstracts the physics backend (Rapier3D included)
//!
//! ## Architecture
//!
//! Each fixed tick runs, in order:
//! 1. **Sensors**: the backend's ground detection fills [`detection::GroundSensor`]
//! 2. **Commands**: run and harness toggle edges are resolved
//! 3. **Movement**: velocity and orientation are integrated and written back
//! 4. **Markers**: [`state::Grounded`] / [`state::Airborne`] are synced
//!
//! Harness anchors are refreshed in `FixedPostUpdate`, after every towing
//! character has moved.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use harness_character_controller::prelude::*;
//!
//! // Components for a player character
//! let config = LocomotionConfig::player();
//! let state = LocomotionState::default();
//! let command = MovementCommand::default();
//!
//! // A towable cart whose harness point sits half a unit in front of it
//! let harness = Harness::new(Vec3::new(0.0, 0.2, -0.5));
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod detection;
pub mod harness;
pub mod intent;
pub mod math;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::CharacterPhysicsBackend;
    pub use crate::config::{LocomotionConfig, VerticalMotion};
    pub use crate::detection::GroundSensor;
    pub use crate::harness::{
        AttachOutcome, Harness, HarnessAccess, HarnessLimits, HarnessReferencePoint,
    };
    pub use crate::intent::MovementCommand;
    pub use crate::state::{Airborne, Grounded, LocomotionState, Towing};
    pub use crate::{LocomotionPlugin, LocomotionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::Rapier3dBackend;
}

/// System sets of a locomotion tick, chained in this order in `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    /// Backend ground detection.
    Sensors,
    /// Movement command edge events (run latch, harness toggle).
    Commands,
    /// Velocity and orientation integration.
    Movement,
    /// State marker sync.
    Markers,
}

/// Main plugin for the locomotion and harness systems.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (velocity, joints) and adds its own sensor systems.
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
/// use harness_character_controller::prelude::*;
///
/// App::new()
///     .add_plugins(MinimalPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(LocomotionPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct LocomotionPlugin<B: backend::CharacterPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for LocomotionPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for LocomotionPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::LocomotionConfig>();
        app.register_type::<detection::GroundSensor>();
        app.register_type::<intent::MovementCommand>();
        app.register_type::<state::LocomotionState>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::Towing>();
        app.register_type::<harness::Harness>();
        app.register_type::<harness::HarnessReferencePoint>();
        app.register_type::<harness::HarnessAccess>();

        app.configure_sets(
            FixedUpdate,
            (
                LocomotionSet::Sensors,
                LocomotionSet::Commands,
                LocomotionSet::Movement,
                LocomotionSet::Markers,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.add_systems(
            FixedUpdate,
            (
                systems::process_command_edges::<B>.in_set(LocomotionSet::Commands),
                systems::apply_locomotion::<B>.in_set(LocomotionSet::Movement),
                systems::sync_state_markers.in_set(LocomotionSet::Markers),
            ),
        );

        // Late tick: anchors follow the towing bodies, then edge events expire
        app.add_systems(
            FixedPostUpdate,
            (
                harness::refresh_harness_anchors::<B>,
                systems::reset_command_edges,
            )
                .chain(),
        );
    }
}
