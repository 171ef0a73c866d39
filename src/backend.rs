//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement
//! to work with the locomotion and harness systems. Velocity, orientation
//! and joint lifecycle go through this trait; ground casts are performed by
//! backend-specific sensor systems added by the backend's plugin.

use bevy::prelude::*;

use crate::harness::HarnessJointSpec;

/// Trait for physics backend implementations.
///
/// Implement this trait to integrate a physics engine with the controller.
/// All methods are static and take the ECS world, so the generic systems can
/// stay exclusive and collect-then-apply.
///
/// For an example implementation, see the `rapier` module's `Rapier3dBackend`.
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend (sensor systems, etc.).
    fn plugin() -> impl Plugin;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the linear velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Get the current world rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.rotation()))
            .unwrap_or(Quat::IDENTITY)
    }

    /// Set the world rotation of an entity.
    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.rotation = rotation;
        }
    }

    /// Get the current world position of an entity.
    ///
    /// Bodies are root entities, so the local transform is their world pose.
    /// It is read first because global transforms only catch up once per
    /// frame, while rotation changes made during a fixed tick are immediate.
    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }

    /// Whether a harness joint currently exists on the towed entity.
    fn has_harness_joint(world: &World, towed: Entity) -> bool;

    /// Create a harness joint on `towed`, connected to `towing`.
    ///
    /// Callers remove any existing joint first.
    fn insert_harness_joint(
        world: &mut World,
        towed: Entity,
        towing: Entity,
        spec: &HarnessJointSpec,
    );

    /// Remove the harness joint from `towed`. Returns whether one existed.
    fn remove_harness_joint(world: &mut World, towed: Entity) -> bool;

    /// Move the joint's anchor on the towing body, in the towing body's local space.
    fn set_harness_connected_anchor(world: &mut World, towed: Entity, anchor: Vec3);
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
