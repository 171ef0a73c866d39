//! Angle and orientation helpers shared by the locomotion and harness systems.
//!
//! Headings are measured in degrees around world +Y, with 0 looking down -Z
//! (Bevy's forward) and positive values turning toward +X (to the right).

use bevy::prelude::*;

/// Move `current` toward `target` by at most `max_delta`, without overshooting.
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Shortest signed difference `target - current` between two angles, in degrees.
///
/// The result lies in `[-180, 180]`.
pub fn delta_angle(current: f32, target: f32) -> f32 {
    let mut delta = (target - current).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    delta
}

/// Heading of a direction in degrees, ignoring its vertical component.
///
/// A direction with no horizontal extent has heading 0.
pub fn heading(direction: Vec3) -> f32 {
    let flat = project_on_plane(direction, Vec3::Y);
    if flat.length_squared() <= f32::EPSILON {
        return 0.0;
    }
    flat.x.atan2(-flat.z).to_degrees()
}

/// Signed turn in degrees that brings `from` onto `to` in the horizontal plane.
///
/// Positive means the target lies to the right.
pub fn bearing(from: Vec3, to: Vec3) -> f32 {
    delta_angle(heading(from), heading(to))
}

/// Remove the component of `vector` along `normal`.
pub fn project_on_plane(vector: Vec3, normal: Vec3) -> Vec3 {
    let n = normal.normalize_or_zero();
    vector - n * vector.dot(n)
}

/// Rotation whose forward (-Z) is `forward` and whose up is as close to `up` as possible.
///
/// Degenerate inputs fall back to a rotation that keeps `up` (or identity).
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let up = up.try_normalize().unwrap_or(Vec3::Y);
    let Some(back) = (-forward).try_normalize() else {
        return Quat::from_rotation_arc(Vec3::Y, up);
    };
    let Some(right) = up.cross(back).try_normalize() else {
        // Forward parallel to up: pick any frame that looks along `forward`.
        return Quat::from_rotation_arc(Vec3::NEG_Z, -back);
    };
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back)).normalize()
}
