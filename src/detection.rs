//! Ground sensing.
//!
//! The [`GroundSensor`] component holds the result of the per-tick ground
//! probe and normal sampling. The geometry of both queries (where the probe
//! starts, where each normal sample runs) is computed here so that any
//! physics backend casts exactly the same shapes.

use bevy::prelude::*;

use crate::collision::CollisionData;

/// Ground detection result for a character.
///
/// Written once per tick by the backend's sensor system and read by the
/// locomotion controller.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct GroundSensor {
    /// Whether the downward probe touched walkable ground this tick.
    pub grounded: bool,
    /// Smoothed ground normal. World up while airborne or when no sample counted.
    pub normal: Vec3,
    /// Whether at least one normal sample contributed to `normal`.
    pub normal_valid: bool,
    /// Entity under the probe, if grounded.
    pub ground_entity: Option<Entity>,
}

impl Default for GroundSensor {
    fn default() -> Self {
        Self {
            grounded: false,
            normal: Vec3::Y,
            normal_valid: false,
            ground_entity: None,
        }
    }
}

impl GroundSensor {
    /// Whether the character stands on walkable ground.
    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// Ground normal to align to. World up when airborne.
    #[inline]
    pub fn ground_normal(&self) -> Vec3 {
        self.normal
    }

    /// Record an airborne tick.
    pub fn set_airborne(&mut self) {
        *self = Self::default();
    }

    /// Record a grounded tick with the sampled normal.
    pub fn set_grounded(&mut self, ground_entity: Option<Entity>, normal: GroundNormal) {
        self.grounded = true;
        self.ground_entity = ground_entity;
        self.normal = normal.normal;
        self.normal_valid = normal.valid;
    }
}

/// Result of ground normal sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundNormal {
    /// Unit normal.
    pub normal: Vec3,
    /// False when nothing contributed and `normal` is the world-up fallback.
    pub valid: bool,
}

impl GroundNormal {
    /// Fallback result: world up, not backed by any sample.
    pub const UP: Self = Self {
        normal: Vec3::Y,
        valid: false,
    };
}

/// Capsule dimensions of a character collider, along its local Y axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapsuleShape {
    /// Collider center in the character's local space.
    pub center: Vec3,
    /// Half the length of the capsule's inner segment.
    pub half_height: f32,
    /// Capsule radius.
    pub radius: f32,
}

impl CapsuleShape {
    /// Capsule centered on the character origin.
    pub fn new(half_height: f32, radius: f32) -> Self {
        Self {
            center: Vec3::ZERO,
            half_height,
            radius,
        }
    }

    /// Center of the lower hemisphere, in local space.
    pub fn lower_sphere_center(&self) -> Vec3 {
        self.center - Vec3::Y * self.half_height
    }

    /// Lowest point of the capsule, in local space.
    pub fn bottom(&self) -> Vec3 {
        self.center - Vec3::Y * (self.half_height + self.radius)
    }
}

/// Sphere probe used to decide whether a character is grounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundedProbe {
    /// World-space start of the sweep.
    pub origin: Vec3,
    /// Sphere radius.
    pub radius: f32,
    /// Sweep direction (the character's local down).
    pub direction: Vec3,
    /// Sweep length.
    pub max_distance: f32,
}

impl GroundedProbe {
    /// Probe from the center of the capsule's lower hemisphere along local down.
    pub fn new(
        transform: &GlobalTransform,
        capsule: &CapsuleShape,
        radius_scale: f32,
        max_distance: f32,
    ) -> Self {
        Self {
            origin: transform.transform_point(capsule.lower_sphere_center()),
            radius: capsule.radius * radius_scale,
            direction: transform.rotation() * Vec3::NEG_Y,
            max_distance,
        }
    }
}

/// One segment cast of the ground normal sampling pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalSample {
    /// World-space start (capsule center level).
    pub start: Vec3,
    /// World-space end (below the capsule bottom).
    pub end: Vec3,
}

impl NormalSample {
    /// Unit direction of the segment, or `None` for a zero-length segment.
    pub fn direction(&self) -> Option<Vec3> {
        (self.end - self.start).try_normalize()
    }

    /// Segment length.
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Local-space offsets of `count` points evenly spread on a horizontal circle.
///
/// The first point lies straight ahead (-Z); subsequent points step around +Y.
pub fn sample_offsets(count: usize, radius: f32) -> impl Iterator<Item = Vec3> {
    let step = if count == 0 {
        0.0
    } else {
        std::f32::consts::TAU / count as f32
    };
    (0..count).map(move |i| Quat::from_rotation_y(step * i as f32) * Vec3::NEG_Z * radius)
}

/// World-space segments for ground normal sampling.
pub fn normal_samples(
    transform: &GlobalTransform,
    capsule: &CapsuleShape,
    count: usize,
    radius: f32,
    depth: f32,
) -> Vec<NormalSample> {
    sample_offsets(count, radius)
        .map(|offset| NormalSample {
            start: transform.transform_point(capsule.center + offset),
            end: transform.transform_point(capsule.bottom() + offset - Vec3::Y * depth),
        })
        .collect()
}

/// Average the normals of the hits that count as ground.
///
/// A hit counts when its collider is in `ground_groups` and its normal's world
/// up component exceeds `min_normal_y`. No counting hit yields [`GroundNormal::UP`].
pub fn accumulate_ground_normal<'a>(
    hits: impl IntoIterator<Item = &'a CollisionData>,
    ground_groups: u32,
    min_normal_y: f32,
) -> GroundNormal {
    let sum: Vec3 = hits
        .into_iter()
        .filter(|hit| hit.in_groups(ground_groups) && hit.normal.dot(Vec3::Y) > min_normal_y)
        .map(|hit| hit.normal)
        .sum();

    match sum.try_normalize() {
        Some(normal) => GroundNormal {
            normal,
            valid: true,
        },
        None => GroundNormal::UP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn sensor_defaults_to_airborne_up() {
        let sensor = GroundSensor::default();
        assert!(!sensor.is_grounded());
        assert_eq!(sensor.ground_normal(), Vec3::Y);
    }

    #[test]
    fn sensor_airborne_resets_normal() {
        let mut sensor = GroundSensor::default();
        sensor.set_grounded(
            None,
            GroundNormal {
                normal: Vec3::new(0.0, 0.9, 0.1).normalize(),
                valid: true,
            },
        );
        assert!(sensor.is_grounded());

        sensor.set_airborne();
        assert!(!sensor.is_grounded());
        assert_eq!(sensor.ground_normal(), Vec3::Y);
        assert!(!sensor.normal_valid);
    }

    #[test]
    fn zero_samples_produce_no_offsets() {
        assert_eq!(sample_offsets(0, 0.1).count(), 0);
    }

    #[test]
    fn sample_offsets_lie_on_circle() {
        let offsets: Vec<Vec3> = sample_offsets(4, 0.5).collect();
        assert_eq!(offsets.len(), 4);
        for offset in &offsets {
            assert!((offset.length() - 0.5).abs() < EPS);
            assert!(offset.y.abs() < EPS);
        }
        assert!((offsets[0] - Vec3::new(0.0, 0.0, -0.5)).length() < EPS);
        // Evenly spaced: opposite samples cancel.
        assert!((offsets[0] + offsets[2]).length() < EPS);
        assert!((offsets[1] + offsets[3]).length() < EPS);
    }

    #[test]
    fn probe_starts_at_lower_hemisphere() {
        let transform = GlobalTransform::from(Transform::from_xyz(1.0, 2.0, 3.0));
        let capsule = CapsuleShape::new(0.15, 0.1);
        let probe = GroundedProbe::new(&transform, &capsule, 0.95, 0.01);

        assert!((probe.origin - Vec3::new(1.0, 1.85, 3.0)).length() < EPS);
        assert!((probe.radius - 0.095).abs() < EPS);
        assert!((probe.direction - Vec3::NEG_Y).length() < EPS);
        assert_eq!(probe.max_distance, 0.01);
    }

    #[test]
    fn probe_follows_character_tilt() {
        let transform = GlobalTransform::from(Transform::from_rotation(Quat::from_rotation_x(0.3)));
        let probe = GroundedProbe::new(&transform, &CapsuleShape::new(0.15, 0.1), 0.95, 0.01);
        let expected = Quat::from_rotation_x(0.3) * Vec3::NEG_Y;
        assert!((probe.direction - expected).length() < EPS);
    }

    #[test]
    fn normal_samples_span_center_to_below_bottom() {
        let transform = GlobalTransform::from(Transform::from_xyz(0.0, 1.0, 0.0));
        let capsule = CapsuleShape::new(0.15, 0.1);
        let samples = normal_samples(&transform, &capsule, 3, 0.1, 0.05);

        assert_eq!(samples.len(), 3);
        for sample in &samples {
            assert!((sample.start.y - 1.0).abs() < EPS);
            assert!((sample.end.y - 0.7).abs() < EPS);
            assert!((sample.length() - 0.3).abs() < EPS);
            assert!((sample.direction().unwrap() - Vec3::NEG_Y).length() < EPS);
        }
    }

    #[test]
    fn no_hits_yield_up() {
        let hits: Vec<CollisionData> = Vec::new();
        assert_eq!(accumulate_ground_normal(&hits, u32::MAX, 0.75), GroundNormal::UP);
    }

    #[test]
    fn steep_hits_are_ignored() {
        let wall = CollisionData::new(0.1, Vec3::new(1.0, 0.5, 0.0).normalize(), Vec3::ZERO, None);
        let result = accumulate_ground_normal([&wall], u32::MAX, 0.75);
        assert_eq!(result, GroundNormal::UP);
    }

    #[test]
    fn hits_outside_ground_groups_are_ignored() {
        let hit = CollisionData::new(0.1, Vec3::Y, Vec3::ZERO, None).with_memberships(0b10);
        let result = accumulate_ground_normal([&hit], 0b01, 0.75);
        assert_eq!(result, GroundNormal::UP);
    }

    #[test]
    fn contributing_normals_are_averaged() {
        let a = CollisionData::new(0.1, Vec3::new(0.3, 1.0, 0.0).normalize(), Vec3::ZERO, None);
        let b = CollisionData::new(0.1, Vec3::new(-0.3, 1.0, 0.0).normalize(), Vec3::ZERO, None);
        let c = CollisionData::new(0.1, Vec3::new(0.0, 1.0, 0.4).normalize(), Vec3::ZERO, None);
        let result = accumulate_ground_normal([&a, &b, &c], u32::MAX, 0.75);

        assert!(result.valid);
        assert!((result.normal.length() - 1.0).abs() < EPS);
        for hit in [&a, &b, &c] {
            assert!(result.normal.dot(hit.normal) > 0.0);
        }
        assert!(result.normal.x.abs() < EPS);
        assert!(result.normal.z > 0.0);
    }
}
