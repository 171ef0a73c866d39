//! Detection result structures.
//!
//! These structures hold the results of physics queries (sphere and segment
//! casts) used for ground detection and ground-normal sampling.

use bevy::prelude::*;

/// Information about a ray/shape cast collision.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionData {
    /// Distance to the hit point (if hit).
    pub distance: f32,
    /// Normal of the surface at hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if any).
    pub entity: Option<Entity>,
    /// Collision-group memberships of the hit collider, as raw bits.
    ///
    /// `u32::MAX` when the collider has no explicit groups.
    pub memberships: u32,
}

impl CollisionData {
    /// Create a collision result for a collider that belongs to every group.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
            memberships: u32::MAX,
        }
    }

    /// Set the collision-group memberships of the hit collider.
    pub fn with_memberships(mut self, memberships: u32) -> Self {
        self.memberships = memberships;
        self
    }

    /// Whether the hit collider belongs to any of the given groups.
    pub fn in_groups(&self, groups: u32) -> bool {
        self.memberships & groups != 0
    }
}
