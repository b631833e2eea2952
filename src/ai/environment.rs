//! Static environment bodies that push agents away
//!
//! Normals are measured on the horizontal plane and point from the surface
//! toward the query position.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::math::horizontal;
use super::sources::Surface;

/// A straight wall between two points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: Vec3,
    pub end: Vec3,
}

impl WallSegment {
    #[must_use]
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    /// Closest point on the segment to `query`, ignoring height
    #[must_use]
    pub fn closest_point(&self, query: Vec3) -> Vec3 {
        let start = horizontal(self.start);
        let span = horizontal(self.end) - start;
        let length_sq = span.length_squared();
        if length_sq <= f32::EPSILON {
            return start;
        }
        let t = ((horizontal(query) - start).dot(span) / length_sq).clamp(0.0, 1.0);
        start + span * t
    }

    /// Horizontal distance from `query` to the wall
    #[must_use]
    pub fn distance_to(&self, query: Vec3) -> f32 {
        self.closest_point(query).distance(horizontal(query))
    }
}

impl Surface for WallSegment {
    fn position(&self) -> Vec3 {
        (self.start + self.end) * 0.5
    }

    fn normal_at(&self, query: Vec3) -> Option<Vec3> {
        let away = horizontal(query) - self.closest_point(query);
        if away.length_squared() <= f32::EPSILON {
            return None;
        }
        Some(away.normalize())
    }
}

/// A round pillar or similar obstacle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundObstacle {
    pub center: Vec3,
    pub radius: f32,
}

impl RoundObstacle {
    #[must_use]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl Surface for RoundObstacle {
    fn position(&self) -> Vec3 {
        self.center
    }

    fn normal_at(&self, query: Vec3) -> Option<Vec3> {
        let away = horizontal(query - self.center);
        if away.length_squared() <= f32::EPSILON {
            return None;
        }
        Some(away.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_normal_points_to_agent() {
        let wall = WallSegment::new(Vec3::new(-5.0, 0.0, 2.0), Vec3::new(5.0, 0.0, 2.0));
        let normal = wall.normal_at(Vec3::new(1.0, 1.7, 0.5)).unwrap();
        assert!((normal - Vec3::NEG_Z).length() < 1e-6);
        assert!((wall.distance_to(Vec3::new(1.0, 0.0, 0.5)) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_wall_normal_past_endpoint() {
        let wall = WallSegment::new(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0));
        let normal = wall.normal_at(Vec3::new(6.0, 0.0, 0.0)).unwrap();
        assert!((normal - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_obstacle_normal_undefined_at_center() {
        let pillar = RoundObstacle::new(Vec3::new(1.0, 0.0, 1.0), 0.5);
        assert!(pillar.normal_at(Vec3::new(1.0, 2.0, 1.0)).is_none());
        let normal = pillar.normal_at(Vec3::new(1.0, 0.0, 3.0)).unwrap();
        assert!((normal - Vec3::Z).length() < 1e-6);
    }
}
