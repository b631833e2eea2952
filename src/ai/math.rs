//! Prediction math shared by the pipeline layers
//!
//! Pure functions: linear extrapolation of two moving points, the tag weight
//! applied to avoidance reactions, and the small vector helpers the decision
//! layer needs.

use glam::{Quat, Vec3};

use super::contracts::{AgentFrame, PerceivedAgent};

/// Approach times at or above this are not considered a threat.
pub const MIN_TIME_TO_COLLISION: f32 = 5.0;

/// Predicted separation below which an approach counts as a collision.
pub const COLLISION_DANGER_THRESHOLD: f32 = 4.0;

const SMALL_THRESHOLD: f32 = 1e-6;

/// Positions of two agents at a predicted approach time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    /// Where this agent will be
    pub self_position: Vec3,
    /// Where the other agent will be
    pub other_position: Vec3,
    /// Separation between the two
    pub distance: f32,
}

/// Weight multiplier for a perceived agent.
///
/// A group proxy is wider than a single pedestrian, so the reaction scales with
/// its collider radius.
#[must_use]
pub fn tag_weight(target: &PerceivedAgent) -> f32 {
    if target.tag.is_group() {
        target.collider_radius + 2.0
    } else {
        1.0
    }
}

/// Reflect `target` about the `base` axis: `2·cosθ·base − target`.
///
/// Both inputs are normalised first.
#[must_use]
pub fn reflection_vector(target: Vec3, base: Vec3) -> Vec3 {
    let target = target.normalize_or_zero();
    let base = base.normalize_or_zero();
    let cos_theta = target.dot(base);
    2.0 * cos_theta * base - target
}

/// Time of nearest approach between two linearly moving agents.
///
/// Negative when the agents are diverging. Zero relative velocity yields 0.
#[must_use]
pub fn nearest_approach_time(me: &AgentFrame, other: &AgentFrame) -> f32 {
    let rel_velocity = other.velocity() - me.velocity();
    let rel_speed = rel_velocity.length();

    if rel_speed == 0.0 {
        return 0.0;
    }

    let rel_tangent = rel_velocity / rel_speed;
    let rel_position = me.position - other.position;
    rel_tangent.dot(rel_position) / rel_speed
}

/// Extrapolate both agents to `time` and measure their separation.
#[must_use]
pub fn nearest_approach(time: f32, me: &AgentFrame, other: &AgentFrame) -> Approach {
    let self_position = me.extrapolate(time);
    let other_position = other.extrapolate(time);
    Approach {
        self_position,
        other_position,
        distance: self_position.distance(other_position),
    }
}

/// Drop the vertical component.
#[inline]
#[must_use]
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Spherical interpolation between two vectors.
///
/// The direction rotates along the great circle while the magnitude is
/// interpolated linearly. Falls back to a linear blend when either end is
/// zero-length.
#[must_use]
pub fn slerp_vector(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    let t = t.clamp(0.0, 1.0);
    let from_len = from.length();
    let to_len = to.length();

    if from_len < SMALL_THRESHOLD || to_len < SMALL_THRESHOLD {
        return from.lerp(to, t);
    }

    let a = from / from_len;
    let b = to / to_len;
    let length = from_len + (to_len - from_len) * t;
    let cos_angle = a.dot(b).clamp(-1.0, 1.0);
    let angle = cos_angle.acos();

    if angle < 1e-4 {
        return a.lerp(b, t).normalize_or_zero() * length;
    }

    let axis = if cos_angle < -0.9999 {
        a.any_orthonormal_vector()
    } else {
        a.cross(b).normalize()
    };

    Quat::from_axis_angle(axis, angle * t) * a * length
}
