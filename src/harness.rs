//! Harness attachment between a towed object and a towing character.
//!
//! A towed entity carries a [`Harness`]. Attaching creates a joint on the
//! towed entity whose parent is the towing body: translation locked, rotation
//! limited around two axes and locked around the third. The joint's anchor on
//! the towing body follows a [`HarnessReferencePoint`] (the "waist") every
//! late tick, so the load hangs off a moving point rather than a fixed one.
//!
//! All operations are exclusive-world functions generic over the physics
//! backend, matching the locomotion systems.

use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::math::{look_rotation, project_on_plane};
use crate::state::{LocomotionState, Towing};

/// Rotation limits of a harness joint, in degrees.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct HarnessLimits {
    /// Side-to-side sway range around the joint's primary axis.
    pub sway: [f32; 2],
    /// Symmetric swing limit around the joint's secondary axis.
    pub swing: f32,
}

impl Default for HarnessLimits {
    fn default() -> Self {
        Self {
            sway: [-15.0, 15.0],
            swing: 35.0,
        }
    }
}

/// Everything a backend needs to build a harness joint.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct HarnessJointSpec {
    /// Anchor on the towed body, in its local space.
    pub anchor: Vec3,
    /// Anchor on the towing body, in its local space.
    pub connected_anchor: Vec3,
    /// Primary joint axis, in both bodies' local space.
    pub axis: Vec3,
    /// Rotation limits.
    pub limits: HarnessLimits,
    /// Whether the two bodies keep colliding with each other.
    pub contacts_enabled: bool,
}

/// Live attachment of a harness.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct HarnessLink {
    /// The towing body.
    pub towing: Entity,
    /// The towing body's reference point, once found.
    pub reference_point: Option<Entity>,
}

/// A towable object with a harness point.
///
/// While linked, the towed entity carries exactly one harness joint.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct Harness {
    /// Harness point in the towed object's local space. Also the joint anchor.
    pub harness_point: Vec3,
    /// A towing candidate must be strictly closer than this to the harness point.
    pub attach_distance: f32,
    /// Offset from the towing body's position that the towed object faces on attach.
    pub facing_offset: Vec3,
    /// Joint rotation limits.
    pub limits: HarnessLimits,
    link: Option<HarnessLink>,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            harness_point: Vec3::ZERO,
            attach_distance: 0.4,
            facing_offset: Vec3::new(0.0, 0.2, -0.014),
            limits: HarnessLimits::default(),
            link: None,
        }
    }
}

impl Harness {
    /// Create a harness with its point at a local offset.
    pub fn new(harness_point: Vec3) -> Self {
        Self {
            harness_point,
            ..default()
        }
    }

    /// Set the attach distance.
    pub fn with_attach_distance(mut self, distance: f32) -> Self {
        self.attach_distance = distance;
        self
    }

    /// Set the facing offset used when orienting on attach.
    pub fn with_facing_offset(mut self, offset: Vec3) -> Self {
        self.facing_offset = offset;
        self
    }

    /// Set joint rotation limits.
    pub fn with_limits(mut self, limits: HarnessLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Current link, if attached.
    pub fn link(&self) -> Option<&HarnessLink> {
        self.link.as_ref()
    }

    /// Whether the harness is attached to anything.
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// The towing body, if attached.
    pub fn towing(&self) -> Option<Entity> {
        self.link.map(|link| link.towing)
    }

    /// Harness point in world space for a given towed pose.
    pub fn world_point(&self, position: Vec3, rotation: Quat) -> Vec3 {
        position + rotation * self.harness_point
    }

    fn joint_spec(&self, connected_anchor: Vec3) -> HarnessJointSpec {
        HarnessJointSpec {
            anchor: self.harness_point,
            connected_anchor,
            axis: Vec3::Y,
            limits: self.limits,
            contacts_enabled: false,
        }
    }
}

/// Marks the frame on a towing body that the harness joint tracks.
///
/// Usually a child of the towing body placed at its waist.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct HarnessReferencePoint {
    /// The body this point belongs to.
    pub body: Entity,
}

/// Gives a character access to a harness through its `toggle_harness` edge.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct HarnessAccess(pub Entity);

/// Result of an attach request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttachOutcome {
    /// The candidate is now towing.
    Attached,
    /// The candidate was too far from the harness point; nothing changed.
    OutOfRange {
        /// Distance between candidate and harness point.
        distance: f32,
    },
    /// The target has no harness.
    Unavailable,
}

impl AttachOutcome {
    /// Whether the request attached.
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached)
    }
}

/// Attach `candidate` to the harness on `towed` if it stands close enough.
///
/// On success the candidate is turned to face away from the towed object
/// before the joint is created. Out of range requests leave everything as is.
pub fn request_attach<B: CharacterPhysicsBackend>(
    world: &mut World,
    towed: Entity,
    candidate: Entity,
) -> AttachOutcome {
    let Some(harness) = world.get::<Harness>(towed) else {
        warn!("attach requested on {towed:?}, which has no Harness");
        return AttachOutcome::Unavailable;
    };

    let towed_position = B::get_position(world, towed);
    let point = harness.world_point(towed_position, B::get_rotation(world, towed));
    let candidate_position = B::get_position(world, candidate);
    let distance = candidate_position.distance(point);

    if !(distance < harness.attach_distance) {
        debug!(
            "{candidate:?} too far from harness on {towed:?} ({distance:.3} >= {:.3})",
            harness.attach_distance
        );
        return AttachOutcome::OutOfRange { distance };
    }

    let away = project_on_plane(candidate_position - towed_position, Vec3::Y);
    if away.length_squared() > f32::EPSILON {
        let up = B::get_rotation(world, candidate) * Vec3::Y;
        B::set_rotation(world, candidate, look_rotation(away, up));
    }

    attach::<B>(world, towed, candidate);
    AttachOutcome::Attached
}

/// Attach the harness on `towed` to `towing`.
///
/// Any previous joint is destroyed first, so re-attaching never leaves more
/// than one joint. A missing reference point is tolerated; the late refresh
/// keeps looking for it. Returns false if `towed` has no harness.
pub fn attach<B: CharacterPhysicsBackend>(world: &mut World, towed: Entity, towing: Entity) -> bool {
    let Some(harness) = world.get::<Harness>(towed).cloned() else {
        warn!("cannot attach {towed:?}: no Harness");
        return false;
    };

    if let Some(previous) = harness.towing().filter(|&previous| previous != towing) {
        set_towing_state(world, previous, false);
    }

    let reference_point = find_reference_point(world, towing);
    if reference_point.is_none() {
        debug!("{towing:?} has no HarnessReferencePoint; harness anchor stays fixed");
    }

    let towing_position = B::get_position(world, towing);
    let towing_rotation = B::get_rotation(world, towing);
    let towed_position = B::get_position(world, towed);
    let towed_rotation = look_rotation(
        towing_position + harness.facing_offset - towed_position,
        towing_rotation * Vec3::Y,
    );
    B::set_rotation(world, towed, towed_rotation);

    B::remove_harness_joint(world, towed);

    let connected_anchor = reference_point
        .and_then(|point| reference_offset(world, point, towing))
        .unwrap_or_else(|| {
            towing_rotation.inverse()
                * (harness.world_point(towed_position, towed_rotation) - towing_position)
        });
    B::insert_harness_joint(world, towed, towing, &harness.joint_spec(connected_anchor));

    if let Some(mut harness) = world.get_mut::<Harness>(towed) {
        harness.link = Some(HarnessLink {
            towing,
            reference_point,
        });
    }
    set_towing_state(world, towing, true);

    info!("harness on {towed:?} attached to {towing:?}");
    true
}

/// Detach the harness on `towed`. Detaching an unlinked harness does nothing;
/// joints the harness did not create are left alone.
///
/// Returns whether anything was detached.
pub fn detach<B: CharacterPhysicsBackend>(world: &mut World, towed: Entity) -> bool {
    let Some(link) = world
        .get_mut::<Harness>(towed)
        .and_then(|mut harness| harness.link.take())
    else {
        return false;
    };

    B::remove_harness_joint(world, towed);
    set_towing_state(world, link.towing, false);
    info!("harness on {towed:?} detached from {:?}", link.towing);
    true
}

/// Stop `towing` from towing anything.
///
/// Detaches every harness linked to it. The towing state is cleared even when
/// no linked harness is left, e.g. after the load was despawned.
///
/// Returns whether a harness was detached.
pub fn release<B: CharacterPhysicsBackend>(world: &mut World, towing: Entity) -> bool {
    let linked: Vec<Entity> = world
        .query::<(Entity, &Harness)>()
        .iter(world)
        .filter(|(_, harness)| harness.towing() == Some(towing))
        .map(|(entity, _)| entity)
        .collect();

    for &towed in &linked {
        detach::<B>(world, towed);
    }
    if linked.is_empty() {
        debug!("{towing:?} has no linked harness left; leaving towing mode");
        set_towing_state(world, towing, false);
    }
    !linked.is_empty()
}

/// Find the reference point that belongs to `body`.
pub fn find_reference_point(world: &mut World, body: Entity) -> Option<Entity> {
    world
        .query::<(Entity, &HarnessReferencePoint)>()
        .iter(world)
        .find(|(_, point)| point.body == body)
        .map(|(entity, _)| entity)
}

/// Position of a reference point in its body's local space.
///
/// Points parented under the body resolve through local transforms, which
/// are current within a fixed tick. Other points compare global transforms of
/// both entities, so the two poses always come from the same frame.
fn reference_offset(world: &World, point: Entity, body: Entity) -> Option<Vec3> {
    if let Some(offset) = hierarchy_offset(world, point, body) {
        return Some(offset);
    }
    let body = world.get::<GlobalTransform>(body)?;
    let point = world.get::<GlobalTransform>(point)?;
    Some(body.affine().inverse().transform_point3(point.translation()))
}

fn hierarchy_offset(world: &World, point: Entity, body: Entity) -> Option<Vec3> {
    let mut offset = Transform::IDENTITY;
    let mut current = point;
    while current != body {
        offset = world.get::<Transform>(current)?.mul_transform(offset);
        current = world.get::<ChildOf>(current)?.parent();
    }
    Some(offset.translation)
}

fn set_towing_state(world: &mut World, character: Entity, towing: bool) {
    let Ok(mut entity) = world.get_entity_mut(character) else {
        return;
    };
    if let Some(mut state) = entity.get_mut::<LocomotionState>() {
        state.is_pulling_load = towing;
    }
    if towing {
        entity.insert(Towing);
    } else {
        entity.remove::<Towing>();
    }
}

/// Keep every harness joint anchored to its towing body's reference point.
///
/// Runs after the towing bodies have moved for the tick. Links whose towing
/// body no longer exists are detached, and characters left in towing mode
/// without a linked harness are released.
pub fn refresh_harness_anchors<B: CharacterPhysicsBackend>(world: &mut World) {
    let links: Vec<(Entity, HarnessLink)> = world
        .query::<(Entity, &Harness)>()
        .iter(world)
        .filter_map(|(entity, harness)| harness.link.map(|link| (entity, link)))
        .collect();

    for (towed, link) in links {
        if world.get_entity(link.towing).is_err() {
            debug!("towing body {:?} is gone; detaching {towed:?}", link.towing);
            detach::<B>(world, towed);
            continue;
        }

        let reference_point = match link
            .reference_point
            .filter(|&point| world.get::<HarnessReferencePoint>(point).is_some())
        {
            Some(point) => Some(point),
            None => {
                let found = find_reference_point(world, link.towing);
                if let Some(mut harness) = world.get_mut::<Harness>(towed) {
                    if let Some(current) = harness.link.as_mut() {
                        current.reference_point = found;
                    }
                }
                found
            }
        };

        if let Some(anchor) =
            reference_point.and_then(|point| reference_offset(world, point, link.towing))
        {
            B::set_harness_connected_anchor(world, towed, anchor);
        }
    }

    let towing_bodies: Vec<Entity> = world
        .query::<&Harness>()
        .iter(world)
        .filter_map(Harness::towing)
        .collect();
    let stranded: Vec<Entity> = world
        .query_filtered::<Entity, With<Towing>>()
        .iter(world)
        .filter(|character| !towing_bodies.contains(character))
        .collect();
    for character in stranded {
        release::<B>(world, character);
    }
}
