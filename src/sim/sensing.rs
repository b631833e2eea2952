//! Geometric sensing used by the driver
//!
//! Stands in for the trigger volumes of a game engine: a view cone, a box
//! ahead of the agent for immediate avoidance, and a short wall probe.
//! Obstacles are sensed all around the agent, not only inside the cone, so
//! a pillar being passed keeps pushing until it is out of range.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ai::{AgentFrame, DEFAULT_AGENT_RADIUS, RoundObstacle, WallSegment, horizontal};

/// Sensor geometry shared by every agent of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensingConfig {
    pub view_distance: f32,
    /// Half of the view cone's opening angle, in degrees
    pub fov_half_angle_deg: f32,
    /// Width (x), height (y) and depth (z) of the avoidance box
    pub avoidance_zone_size: Vec3,
    pub wall_range: f32,
    pub agent_radius: f32,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            view_distance: 8.0,
            fov_half_angle_deg: 60.0,
            avoidance_zone_size: Vec3::new(1.5, 1.0, 2.0),
            wall_range: 1.5,
            agent_radius: DEFAULT_AGENT_RADIUS,
        }
    }
}

impl SensingConfig {
    pub fn with_view(mut self, distance: f32, half_angle_deg: f32) -> Self {
        self.view_distance = distance;
        self.fov_half_angle_deg = half_angle_deg;
        self
    }

    pub fn with_avoidance_zone(mut self, size: Vec3) -> Self {
        self.avoidance_zone_size = size;
        self
    }

    /// Whether `point` lies inside the view cone
    #[must_use]
    pub fn in_view(&self, me: &AgentFrame, point: Vec3) -> bool {
        let offset = horizontal(point - me.position);
        let distance = offset.length();
        if distance > self.view_distance {
            return false;
        }
        let forward = horizontal(me.direction).normalize_or_zero();
        if forward == Vec3::ZERO || distance <= f32::EPSILON {
            return true;
        }
        let cos_half = self.fov_half_angle_deg.to_radians().cos();
        forward.dot(offset / distance) >= cos_half
    }

    /// Whether a body of `radius` at `point` touches the avoidance box
    /// placed directly ahead of the agent.
    #[must_use]
    pub fn in_avoidance_area(&self, me: &AgentFrame, point: Vec3, radius: f32) -> bool {
        let forward = horizontal(me.direction).normalize_or_zero();
        if forward == Vec3::ZERO {
            return false;
        }
        let right = forward.cross(Vec3::Y);
        let offset = horizontal(point - me.position);

        let ahead = offset.dot(forward);
        let side = offset.dot(right).abs();
        ahead >= -radius
            && ahead <= self.avoidance_zone_size.z + radius
            && side <= self.avoidance_zone_size.x / 2.0 + radius
    }

    /// Whether an obstacle is close enough to steer around. Direction does
    /// not matter, only the view distance.
    #[must_use]
    pub fn senses_obstacle(&self, me: &AgentFrame, obstacle: &RoundObstacle) -> bool {
        horizontal(obstacle.center - me.position).length() <= self.view_distance
    }

    /// Index of the nearest wall within range
    #[must_use]
    pub fn nearest_wall(&self, walls: &[WallSegment], position: Vec3) -> Option<usize> {
        walls
            .iter()
            .enumerate()
            .map(|(index, wall)| (index, wall.distance_to(position)))
            .filter(|(_, distance)| *distance <= self.wall_range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walker() -> AgentFrame {
        AgentFrame::new(Vec3::ZERO, Vec3::Z, 1.0)
    }

    #[test]
    fn test_view_cone() {
        let sensing = SensingConfig::default();
        let me = walker();
        assert!(sensing.in_view(&me, Vec3::new(0.0, 0.0, 7.0)));
        // 45 degrees off-axis
        assert!(sensing.in_view(&me, Vec3::new(3.0, 0.0, 3.0)));
        // 90 degrees off-axis
        assert!(!sensing.in_view(&me, Vec3::new(3.0, 0.0, 0.0)));
        assert!(!sensing.in_view(&me, Vec3::new(0.0, 0.0, 9.0)));
    }

    #[test]
    fn test_avoidance_box_ahead_only() {
        let sensing = SensingConfig::default();
        let me = walker();
        assert!(sensing.in_avoidance_area(&me, Vec3::new(0.5, 0.0, 1.5), 0.3));
        assert!(!sensing.in_avoidance_area(&me, Vec3::new(0.0, 0.0, -1.0), 0.3));
        assert!(!sensing.in_avoidance_area(&me, Vec3::new(1.5, 0.0, 1.0), 0.3));
        assert!(!sensing.in_avoidance_area(&me, Vec3::new(0.0, 0.0, 2.5), 0.3));
    }

    #[test]
    fn test_obstacles_sensed_all_around() {
        let sensing = SensingConfig::default();
        let me = walker();
        let behind = RoundObstacle::new(Vec3::new(0.0, 0.0, -2.0), 0.5);
        let beside = RoundObstacle::new(Vec3::new(3.0, 0.0, 0.0), 0.5);
        let far = RoundObstacle::new(Vec3::new(0.0, 0.0, 9.0), 0.5);

        // Outside the view cone but still sensed
        assert!(!sensing.in_view(&me, behind.center));
        assert!(sensing.senses_obstacle(&me, &behind));
        assert!(sensing.senses_obstacle(&me, &beside));
        assert!(!sensing.senses_obstacle(&me, &far));
    }

    #[test]
    fn test_nearest_wall_in_range() {
        let sensing = SensingConfig::default();
        let walls = [
            WallSegment::new(Vec3::new(-5.0, 0.0, 1.0), Vec3::new(5.0, 0.0, 1.0)),
            WallSegment::new(Vec3::new(-5.0, 0.0, -0.5), Vec3::new(5.0, 0.0, -0.5)),
            WallSegment::new(Vec3::new(-5.0, 0.0, 9.0), Vec3::new(5.0, 0.0, 9.0)),
        ];
        assert_eq!(sensing.nearest_wall(&walls, Vec3::ZERO), Some(1));
        assert_eq!(sensing.nearest_wall(&walls[2..], Vec3::ZERO), None);
    }
}
