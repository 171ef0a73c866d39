//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;
use bevy_rapier3d::rapier::dynamics::{JointAxesMask, JointAxis};

use crate::backend::CharacterPhysicsBackend;
use crate::collision::CollisionData;
use crate::config::LocomotionConfig;
use crate::detection::{
    accumulate_ground_normal, normal_samples, CapsuleShape, GroundSensor, GroundedProbe,
};
use crate::harness::HarnessJointSpec;
use crate::LocomotionSet;

/// Rapier3D physics backend for the locomotion controller.
///
/// Velocity goes through Rapier's [`Velocity`] component and harness joints
/// are [`ImpulseJoint`]s holding a generic joint. Ground sensing is handled
/// by a dedicated Rapier system that receives the Rapier context as a system
/// parameter.
pub struct Rapier3dBackend;

impl CharacterPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn has_harness_joint(world: &World, towed: Entity) -> bool {
        world.get::<ImpulseJoint>(towed).is_some()
    }

    fn insert_harness_joint(
        world: &mut World,
        towed: Entity,
        towing: Entity,
        spec: &HarnessJointSpec,
    ) {
        let Ok(mut entity) = world.get_entity_mut(towed) else {
            return;
        };
        let joint = harness_joint(spec);
        entity.insert(ImpulseJoint::new(towing, TypedJoint::GenericJoint(joint)));
    }

    fn remove_harness_joint(world: &mut World, towed: Entity) -> bool {
        world
            .get_entity_mut(towed)
            .ok()
            .and_then(|mut entity| entity.take::<ImpulseJoint>())
            .is_some()
    }

    fn set_harness_connected_anchor(world: &mut World, towed: Entity, anchor: Vec3) {
        if let Some(mut joint) = world.get_mut::<ImpulseJoint>(towed) {
            if let TypedJoint::GenericJoint(generic) = &mut joint.data {
                generic.set_local_anchor1(anchor);
            }
        }
    }
}

/// Build the generic joint for a harness.
///
/// Body 1 is the towing body, body 2 the towed one. Translation and twist
/// around the joint's Z axis are locked; the other two angular axes are
/// limited. Rapier joints never break, so no break thresholds are needed.
pub fn harness_joint(spec: &HarnessJointSpec) -> GenericJoint {
    let sway = spec.limits.sway;
    let swing = spec.limits.swing.to_radians();

    let mut joint = GenericJointBuilder::new(JointAxesMask::LIN_AXES | JointAxesMask::ANG_Z)
        .local_axis1(spec.axis)
        .local_axis2(spec.axis)
        .local_anchor1(spec.connected_anchor)
        .local_anchor2(spec.anchor)
        .limits(JointAxis::AngX, [sway[0].to_radians(), sway[1].to_radians()])
        .limits(JointAxis::AngY, [-swing, swing])
        .build();
    joint.set_contacts_enabled(spec.contacts_enabled);
    joint
}

/// Plugin that sets up Rapier3D-specific systems for the locomotion controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            rapier_ground_detection.in_set(LocomotionSet::Sensors),
        );
    }
}

/// Capsule dimensions of a collider, if it is a capsule.
///
/// The capsule is assumed to run along the collider's local Y axis.
pub fn capsule_shape(collider: &Collider) -> Option<CapsuleShape> {
    let capsule = collider.as_capsule()?;
    let segment = capsule.segment();
    let (a, b) = (segment.a(), segment.b());
    Some(CapsuleShape {
        center: (a + b) * 0.5,
        half_height: (a - b).length() * 0.5,
        radius: capsule.radius(),
    })
}

/// Sweep a sphere using the Rapier context.
fn rapier_sphere_cast(
    context: &RapierContext,
    probe: &GroundedProbe,
    filter: QueryFilter,
) -> Option<CollisionData> {
    let shape = Collider::ball(probe.radius);
    context
        .cast_shape(
            probe.origin,
            Quat::IDENTITY,
            probe.direction,
            &shape,
            ShapeCastOptions {
                max_time_of_impact: probe.max_distance,
                stop_at_penetration: true,
                ..default()
            },
            filter,
        )
        .map(|(hit_entity, hit)| {
            let normal = hit.details.map(|d| d.normal1).unwrap_or(-probe.direction);
            let hit_point = probe.origin + probe.direction * hit.time_of_impact;
            CollisionData::new(hit.time_of_impact, normal, hit_point, Some(hit_entity))
        })
}

/// Cast a segment using the Rapier context, returning the surface normal.
fn rapier_segment_cast(
    context: &RapierContext,
    start: Vec3,
    end: Vec3,
    filter: QueryFilter,
) -> Option<CollisionData> {
    let direction = (end - start).try_normalize()?;
    let length = start.distance(end);
    context
        .cast_ray_and_get_normal(start, direction, length, true, filter)
        .map(|(hit_entity, hit)| {
            CollisionData::new(hit.time_of_impact, hit.normal, hit.point, Some(hit_entity))
        })
}

/// Rapier-specific ground detection.
///
/// The grounded probe sweeps a slightly shrunken sphere from the capsule's
/// lower hemisphere along the character's local down, restricted to the
/// walkable groups. Only when grounded, the ground normal is sampled with
/// segment casts spread around the capsule.
fn rapier_ground_detection(
    rapier_context: ReadRapierContext,
    mut q_characters: Query<(
        Entity,
        &GlobalTransform,
        &LocomotionConfig,
        &Collider,
        &mut GroundSensor,
    )>,
    q_groups: Query<&CollisionGroups>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, config, collider, mut sensor) in &mut q_characters {
        let Some(capsule) = capsule_shape(collider) else {
            sensor.set_airborne();
            continue;
        };

        let base_filter = QueryFilter::default()
            .exclude_rigid_body(entity)
            .exclude_sensors();

        let probe = GroundedProbe::new(
            transform,
            &capsule,
            config.grounded_probe_radius_scale,
            config.grounded_probe_distance,
        );
        let walkable = base_filter.groups(CollisionGroups::new(
            Group::ALL,
            Group::from_bits_truncate(config.walkable_groups),
        ));

        let Some(ground_hit) = rapier_sphere_cast(&context, &probe, walkable) else {
            sensor.set_airborne();
            continue;
        };

        let hits: Vec<CollisionData> = normal_samples(
            transform,
            &capsule,
            config.normal_samples,
            config.ground_smooth_radius,
            config.normal_sample_depth,
        )
        .into_iter()
        .filter_map(|sample| rapier_segment_cast(&context, sample.start, sample.end, base_filter))
        .map(|hit| {
            let memberships = hit
                .entity
                .and_then(|e| q_groups.get(e).ok())
                .map(|g| g.memberships.bits())
                .unwrap_or(u32::MAX);
            hit.with_memberships(memberships)
        })
        .collect();

        let normal =
            accumulate_ground_normal(&hits, config.ground_groups, config.min_ground_normal_y);
        sensor.set_grounded(ground_hit.entity, normal);
    }
}

/// Bundle for creating a character with Rapier3D physics.
///
/// Provides the Rapier components a locomotion character needs. Rotation is
/// locked by default: the controller sets orientation itself and Rapier
/// should not tip the character over.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use harness_character_controller::prelude::*;
/// use harness_character_controller::rapier::Rapier3dCharacterBundle;
///
/// fn spawn_pony(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 1.0, 0.0),
///         LocomotionConfig::player(),
///         LocomotionState::default(),
///         GroundSensor::default(),
///         MovementCommand::default(),
///         Rapier3dCharacterBundle::rotation_locked(),
///         Collider::capsule_y(0.15, 0.1),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `velocity`: Zero velocity
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED`]
/// - `damping`: Linear 0.0, Angular 1.0 (the controller owns horizontal speed)
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    /// The rigid body type. Should typically be [`RigidBody::Dynamic`] for characters.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity. Written by the controller every tick.
    pub velocity: Velocity,
    /// Which axes are locked.
    pub locked_axes: LockedAxes,
    /// Damping coefficients for velocity reduction.
    pub damping: Damping,
}

impl Default for Rapier3dCharacterBundle {
    fn default() -> Self {
        Self::rotation_locked()
    }
}

impl Rapier3dCharacterBundle {
    /// Create a character bundle with rotation locked.
    pub fn rotation_locked() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 1.0,
            },
        }
    }

    /// Set the rigid body type for the character.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set the damping coefficients.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set which axes should be locked.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}
