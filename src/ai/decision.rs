//! Decision (social force model)
//!
//! Six independently clocked forces are combined with the caller's weights
//! into one desired direction:
//!
//! | Force | Cadence | Blend |
//! |---|---|---|
//! | to goal | 0.1s | snap |
//! | avoidance | 0.1s | lerp 0.3s |
//! | anticipated collision | 0.1s | slerp 0.3s |
//! | group | 0.1s | slerp 0.1s |
//! | wall | 0.2s | slerp 0.5s |
//! | obstacle | 0.1s | slerp 0.3s |

use glam::Vec3;

use super::contracts::{
    AgentFrame, AgentId, DecisionInput, DecisionOutput, ForceBreakdown, ForceWeights,
    GroupContext, GroupForceWeights, GroupMember, PredictionOutput,
};
use super::math::{horizontal, reflection_vector, tag_weight};
use super::timed_force::{BlendMode, TimedForce};

/// Below this alignment between heading and escape direction the opponent's
/// own reaction is checked for a mutual (parallel) dodge.
pub const MUTUAL_AVOIDANCE_DOT_THRESHOLD: f32 = 0.5;

/// cos(~13°): a target this close to straight ahead uses world up as the
/// escape axis.
const STRAIGHT_AHEAD_DOT: f32 = 0.9748;

/// cos(45°): splits head-on, same-direction and crossing encounters.
const HEADING_CLASS_DOT: f32 = 0.707;

/// Slack added to group distance thresholds.
const GROUP_SAFETY_DISTANCE: f32 = 0.05;

/// Decision stage of the steering pipeline.
pub trait DecisionLayer {
    fn tick(
        &mut self,
        input: &DecisionInput<'_>,
        frame: &AgentFrame,
        weights: &ForceWeights,
        group: &GroupContext<'_>,
        dt: f32,
    ) -> DecisionOutput;
}

/// Social force decision layer.
///
/// Owns the per-force timers and blends; nothing else in the pipeline touches
/// them.
#[derive(Debug, Clone)]
pub struct SocialForceLayer {
    group_weights: GroupForceWeights,
    to_goal: TimedForce,
    avoidance: TimedForce,
    anticipated: TimedForce,
    group: TimedForce,
    wall: TimedForce,
    obstacle: TimedForce,
    mutual_target: Option<AgentId>,
}

impl Default for SocialForceLayer {
    fn default() -> Self {
        Self::new(GroupForceWeights::default())
    }
}

impl SocialForceLayer {
    #[must_use]
    pub fn new(group_weights: GroupForceWeights) -> Self {
        Self {
            group_weights,
            to_goal: TimedForce::new(0.1, 0.0, BlendMode::Lerp),
            avoidance: TimedForce::new(0.1, 0.3, BlendMode::Lerp),
            anticipated: TimedForce::new(0.1, 0.3, BlendMode::Slerp),
            group: TimedForce::new(0.1, 0.1, BlendMode::Slerp),
            wall: TimedForce::new(0.2, 0.5, BlendMode::Slerp),
            obstacle: TimedForce::new(0.1, 0.3, BlendMode::Slerp),
            mutual_target: None,
        }
    }

    pub fn group_weights(&self) -> GroupForceWeights {
        self.group_weights
    }

    pub fn set_group_weights(&mut self, group_weights: GroupForceWeights) {
        self.group_weights = group_weights;
    }

    /// Current value of every force
    #[must_use]
    pub fn forces(&self) -> ForceBreakdown {
        ForceBreakdown {
            to_goal: self.to_goal.current(),
            avoidance: self.avoidance.current(),
            anticipated_collision: self.anticipated.current(),
            group: self.group.current(),
            wall: self.wall.current(),
            obstacle: self.obstacle.current(),
        }
    }

    fn update_to_goal(&mut self, dt: f32, position: Vec3, goal: Vec3) {
        if !self.to_goal.should_update(dt) {
            return;
        }
        self.to_goal
            .set_immediate((goal - position).normalize_or_zero());
    }

    fn update_avoidance(&mut self, dt: f32, input: &DecisionInput<'_>, frame: &AgentFrame) {
        if !self.avoidance.should_update(dt) {
            return;
        }

        self.mutual_target = None;

        let Some(target) = input.urgent_target else {
            if self.avoidance.current() != Vec3::ZERO {
                self.avoidance.set_target(Vec3::ZERO);
            }
            return;
        };

        let mut escape =
            compute_avoidance_vector(target.position(), frame.direction, frame.position);

        if target.avoidance_vector != Vec3::ZERO
            && frame.direction.dot(escape) < MUTUAL_AVOIDANCE_DOT_THRESHOLD
        {
            let (reacted, is_parallel) = check_opponent_direction(
                escape,
                frame.position,
                target.avoidance_vector,
                target.position(),
            );
            escape = reacted;
            if is_parallel {
                log::debug!("mutual avoidance with agent {}", target.id.0);
                self.mutual_target = Some(target.id);
            }
        }

        let half_width = input.avoidance_zone_size.x / 2.0;
        let depth = input.avoidance_zone_size.z;
        let max_distance =
            (half_width * half_width + depth * depth).sqrt() + input.agent_radius * 2.0;
        let distance = target.position().distance(frame.position);
        let falloff = (1.0 - distance / max_distance).max(0.0);

        self.avoidance
            .set_immediate(escape * falloff * input.urgent_target_weight);
    }

    fn update_anticipated(
        &mut self,
        dt: f32,
        input: &DecisionInput<'_>,
        frame: &AgentFrame,
        group: &GroupContext<'_>,
    ) {
        if !self.anticipated.should_update(dt) {
            return;
        }

        if input.urgent_target.is_some() {
            self.anticipated.set_immediate(Vec3::ZERO);
            return;
        }

        let me = if group.uses_group_frame() {
            group.frame
        } else {
            *frame
        };
        let mut force = anticipated_collision_force(&me, &input.prediction);

        if let Some(potential) = input.potential_target {
            force *= tag_weight(potential);
        }

        self.anticipated.set_target(force);
    }

    fn update_group(&mut self, dt: f32, frame: &AgentFrame, group: &GroupContext<'_>, radius: f32) {
        if !group.is_in_group {
            self.group.set_immediate(Vec3::ZERO);
            return;
        }

        if !self.group.should_update(dt) {
            return;
        }

        if group.members.is_empty() {
            self.group.set_immediate(Vec3::ZERO);
            return;
        }

        let weights = self.group_weights;
        let cohesion = cohesion_force(group, weights.cohesion, frame.position);
        let repulsion = repulsion_force(group.members, weights.repulsion, frame.position, radius);
        let alignment = alignment_force(group.members, weights.alignment);

        self.group
            .set_target((cohesion + repulsion + alignment).normalize_or_zero());
    }

    fn update_wall(&mut self, dt: f32, input: &DecisionInput<'_>) {
        if !self.wall.should_update(dt) {
            return;
        }
        match input.wall_normal {
            Some(normal) => self.wall.set_immediate(normal),
            None => self.wall.set_target(Vec3::ZERO),
        }
    }

    fn update_obstacle(&mut self, dt: f32, input: &DecisionInput<'_>) {
        if !self.obstacle.should_update(dt) {
            return;
        }
        let normal = input
            .obstacle_normal
            .map_or(Vec3::ZERO, Vec3::normalize_or_zero);
        self.obstacle.set_target(normal);
    }
}

impl DecisionLayer for SocialForceLayer {
    fn tick(
        &mut self,
        input: &DecisionInput<'_>,
        frame: &AgentFrame,
        weights: &ForceWeights,
        group: &GroupContext<'_>,
        dt: f32,
    ) -> DecisionOutput {
        self.update_to_goal(dt, frame.position, input.goal_position);
        self.update_avoidance(dt, input, frame);
        self.update_anticipated(dt, input, frame, group);
        self.update_group(dt, frame, group, input.agent_radius);
        self.update_wall(dt, input);
        self.update_obstacle(dt, input);

        let forces = self.forces();
        let mut direction = forces.weighted_sum(weights).normalize_or_zero();
        direction.y = 0.0;

        DecisionOutput {
            desired_direction: direction,
            desired_speed: frame.speed,
            mutual_avoidance: self.mutual_target,
            forces,
        }
    }
}

/// Horizontal unit vector perpendicular to the line toward the target.
///
/// A target almost straight ahead would make the heading/target cross product
/// vanish, so world up is used as the rotation axis there. Zero when the
/// target sits on the agent or directly behind it.
#[must_use]
pub fn compute_avoidance_vector(target: Vec3, direction: Vec3, position: Vec3) -> Vec3 {
    let to_target = (target - position).normalize_or_zero();
    let up = if to_target.dot(direction) >= STRAIGHT_AHEAD_DOT {
        Vec3::Y
    } else {
        to_target.cross(direction)
    };
    horizontal(up.cross(to_target)).normalize_or_zero()
}

/// Check whether both agents dodge to the same side of the line between them.
///
/// Returns the (possibly reflected) escape vector and whether the approach is
/// parallel. A parallel dodge is mirrored about the line toward the other
/// agent.
#[must_use]
pub fn check_opponent_direction(
    my_escape: Vec3,
    my_position: Vec3,
    other_avoidance: Vec3,
    other_position: Vec3,
) -> (Vec3, bool) {
    let offset = (other_position - my_position).normalize_or_zero();
    let right = Vec3::Y.cross(offset).normalize_or_zero();
    let mine = right.dot(my_escape);
    let theirs = right.dot(other_avoidance);

    if (mine > 0.0 && theirs > 0.0) || (mine < 0.0 && theirs < 0.0) {
        (reflection_vector(my_escape, offset), true)
    } else {
        (my_escape, false)
    }
}

/// Lateral steer away from the most urgent predicted collision.
#[must_use]
pub fn anticipated_collision_force(me: &AgentFrame, prediction: &PredictionOutput<'_>) -> Vec3 {
    let Some(target) = prediction.most_urgent else {
        return Vec3::ZERO;
    };
    let agent = &target.agent;
    let right = me.direction.cross(Vec3::Y);
    let away_from = |offset: Vec3| if offset.dot(right) > 0.0 { -1.0 } else { 1.0 };

    let parallelness = me.direction.dot(agent.direction);
    let steer = if parallelness < -HEADING_CLASS_DOT {
        away_from(target.predicted_position - me.position)
    } else if parallelness > HEADING_CLASS_DOT {
        away_from(agent.position - me.position)
    } else if me.speed <= agent.speed {
        // crossing: yield to the faster walker
        away_from(agent.direction)
    } else {
        0.0
    };

    right * steer
}

/// Unit pull toward the centre of mass once the agent strays too far from it.
#[must_use]
pub fn cohesion_force(group: &GroupContext<'_>, weight: f32, position: Vec3) -> Vec3 {
    let threshold = group.members.len() as f32 * 0.3 + GROUP_SAFETY_DISTANCE;
    if position.distance(group.center_of_mass) <= threshold {
        return Vec3::ZERO;
    }
    (group.center_of_mass - position).normalize_or_zero() * weight
}

/// Inverse-distance push away from members closer than two radii.
#[must_use]
pub fn repulsion_force(members: &[GroupMember], weight: f32, position: Vec3, radius: f32) -> Vec3 {
    let min_distance = 2.0 * radius + GROUP_SAFETY_DISTANCE;
    let mut toward = Vec3::ZERO;

    for member in members {
        let offset = member.position - position;
        let distance = offset.length();
        if distance > 0.0 && distance < min_distance {
            toward += weight * (1.0 / distance) * (offset / distance);
        }
    }

    -toward
}

/// Sum of the members' headings
#[must_use]
pub fn alignment_force(members: &[GroupMember], weight: f32) -> Vec3 {
    members.iter().map(|m| m.direction).sum::<Vec3>() * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::contracts::{AgentTag, PerceivedAgent, PredictedNeighbor};

    const DT: f32 = 1.0 / 60.0;

    fn input<'a>(goal: Vec3, urgent: Option<&'a PerceivedAgent>) -> DecisionInput<'a> {
        DecisionInput {
            prediction: PredictionOutput::empty(),
            urgent_target: urgent,
            urgent_target_weight: 1.0,
            potential_target: None,
            wall_normal: None,
            obstacle_normal: None,
            goal_position: goal,
            avoidance_zone_size: Vec3::new(1.5, 1.0, 2.0),
            agent_radius: 0.3,
        }
    }

    fn perceived(id: u32, frame: AgentFrame, avoidance: Vec3) -> PerceivedAgent {
        PerceivedAgent {
            id: AgentId(id),
            frame,
            avoidance_vector: avoidance,
            group_name: None,
            is_same_group: false,
            collider_radius: 0.3,
            tag: AgentTag::Individual,
        }
    }

    fn member(position: Vec3, direction: Vec3) -> GroupMember {
        GroupMember {
            position,
            direction,
            speed: 1.0,
        }
    }

    #[test]
    fn test_goal_only_matches_goal_direction() {
        let mut layer = SocialForceLayer::default();
        let frame = AgentFrame::new(Vec3::new(1.0, 0.5, 2.0), Vec3::X, 0.7);
        let goal = Vec3::new(4.0, 0.5, 6.0);
        let expected = horizontal((goal - frame.position).normalize());

        for _ in 0..30 {
            let output = layer.tick(
                &input(goal, None),
                &frame,
                &ForceWeights::goal_only(),
                &GroupContext::none(),
                DT,
            );
            assert!((output.desired_direction - expected).length() < 1e-6);
            assert_eq!(output.desired_speed, 0.7);
            assert!(output.mutual_avoidance.is_none());
        }
    }

    #[test]
    fn test_mutual_avoidance_flags_both_agents() {
        let a = AgentFrame::new(Vec3::ZERO, Vec3::X, 1.0);
        let b = AgentFrame::new(Vec3::new(2.0, 0.0, 0.0), Vec3::NEG_X, 1.0);
        let a_seen = perceived(1, a, Vec3::Z);
        let b_seen = perceived(2, b, Vec3::NEG_Z);

        let mut layer_a = SocialForceLayer::default();
        let mut layer_b = SocialForceLayer::default();
        let weights = ForceWeights::default();

        let none = GroupContext::none();
        let input_a = input(Vec3::new(10.0, 0.0, 0.0), Some(&b_seen));
        let input_b = input(Vec3::new(-10.0, 0.0, 0.0), Some(&a_seen));
        let out_a = layer_a.tick(&input_a, &a, &weights, &none, DT);
        let out_b = layer_b.tick(&input_b, &b, &weights, &none, DT);

        assert_eq!(out_a.mutual_avoidance, Some(AgentId(2)));
        assert_eq!(out_b.mutual_avoidance, Some(AgentId(1)));

        // Escape for A is -Z; reflected about +X it becomes +Z
        let escape = compute_avoidance_vector(b.position, a.direction, a.position);
        assert!((escape - Vec3::NEG_Z).length() < 1e-6);
        let (reflected, parallel) =
            check_opponent_direction(escape, a.position, Vec3::NEG_Z, b.position);
        assert!(parallel);
        let axis = Vec3::X;
        let expected = 2.0 * escape.dot(axis) * axis - escape;
        assert!((reflected - expected).length() < 1e-6);
        assert!(out_a.forces.avoidance.z > 0.0);
    }

    #[test]
    fn test_avoidance_target_straight_ahead_is_finite() {
        let escape = compute_avoidance_vector(Vec3::new(0.0, 0.0, 3.0), Vec3::Z, Vec3::ZERO);
        assert!(escape.is_finite());
        assert!((escape.length() - 1.0).abs() < 1e-6);
        assert_eq!(escape.y, 0.0);

        let behind = compute_avoidance_vector(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, Vec3::ZERO);
        assert!(behind.is_finite());
        assert!(behind.length() < 1e-6 || (behind.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_avoidance_falls_off_beyond_range() {
        let me = AgentFrame::new(Vec3::ZERO, Vec3::X, 1.0);
        let far = perceived(
            2,
            AgentFrame::new(Vec3::new(5.0, 0.0, 0.5), Vec3::NEG_X, 1.0),
            Vec3::ZERO,
        );
        let mut layer = SocialForceLayer::default();
        let output = layer.tick(
            &input(Vec3::new(10.0, 0.0, 0.0), Some(&far)),
            &me,
            &ForceWeights::default(),
            &GroupContext::none(),
            DT,
        );
        assert_eq!(output.forces.avoidance, Vec3::ZERO);
    }

    #[test]
    fn test_cohesion_threshold() {
        let members = [
            member(Vec3::new(1.0, 0.0, 0.0), Vec3::X),
            member(Vec3::new(-1.0, 0.0, 0.0), Vec3::X),
        ];
        let group = GroupContext {
            is_in_group: true,
            is_collider_active: false,
            name: Some("trio"),
            members: &members,
            frame: AgentFrame::default(),
            center_of_mass: Vec3::ZERO,
        };
        // threshold = 2 * 0.3 + 0.05 = 0.65
        assert_eq!(cohesion_force(&group, 1.0, Vec3::new(0.0, 0.0, 0.64)), Vec3::ZERO);
        let pull = cohesion_force(&group, 1.0, Vec3::new(0.0, 0.0, 0.66));
        assert!((pull - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_repulsion_pushes_apart() {
        let members = [member(Vec3::new(0.5, 0.0, 0.0), Vec3::X)];
        let push = repulsion_force(&members, 1.0, Vec3::ZERO, 0.3);
        assert!((push - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5);

        let coincident = [member(Vec3::ZERO, Vec3::X)];
        assert_eq!(repulsion_force(&coincident, 1.0, Vec3::ZERO, 0.3), Vec3::ZERO);
    }

    #[test]
    fn test_anticipated_head_on_steers_sideways() {
        let me = AgentFrame::new(Vec3::ZERO, Vec3::Z, 1.0);
        let other = AgentFrame::new(Vec3::new(0.5, 0.0, 6.0), Vec3::NEG_Z, 1.0);
        let neighbors = [PredictedNeighbor {
            id: AgentId(7),
            agent: other,
            tag: AgentTag::Individual,
            collider_radius: 0.3,
            predicted_position: Vec3::new(0.5, 0.0, 3.0),
            self_position_at_approach: Vec3::new(0.0, 0.0, 3.0),
            time_to_approach: 3.0,
            distance_at_approach: 0.5,
        }];
        let prediction = PredictionOutput {
            neighbors: &neighbors,
            time_to_nearest_collision: 3.0,
            most_urgent: Some(neighbors[0]),
        };

        let force = anticipated_collision_force(&me, &prediction);
        // The other agent passes on +X, so steer toward -X
        assert!((force - Vec3::NEG_X).length() < 1e-6);
    }

    /// Prediction whose most urgent neighbour is `other`
    fn urgent_prediction(other: AgentFrame) -> PredictionOutput<'static> {
        PredictionOutput {
            neighbors: &[],
            time_to_nearest_collision: 2.0,
            most_urgent: Some(PredictedNeighbor {
                id: AgentId(3),
                agent: other,
                tag: AgentTag::Individual,
                collider_radius: 0.3,
                predicted_position: other.position + other.direction * other.speed * 2.0,
                self_position_at_approach: Vec3::new(0.0, 0.0, 1.0),
                time_to_approach: 2.0,
                distance_at_approach: 0.2,
            }),
        }
    }

    #[test]
    fn test_anticipated_crossing_slower_yields() {
        // Walking +Z, so the right-hand side is -X
        let me = AgentFrame::new(Vec3::ZERO, Vec3::Z, 0.5);

        let heading_pos_x = AgentFrame::new(Vec3::new(-4.0, 0.0, 4.0), Vec3::X, 1.0);
        let force = anticipated_collision_force(&me, &urgent_prediction(heading_pos_x));
        assert!((force - Vec3::NEG_X).length() < 1e-6);

        let heading_neg_x = AgentFrame::new(Vec3::new(4.0, 0.0, 4.0), Vec3::NEG_X, 1.0);
        let force = anticipated_collision_force(&me, &urgent_prediction(heading_neg_x));
        assert!((force - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_anticipated_crossing_faster_keeps_course() {
        let me = AgentFrame::new(Vec3::ZERO, Vec3::Z, 1.5);
        let crosser = AgentFrame::new(Vec3::new(-4.0, 0.0, 4.0), Vec3::X, 1.0);
        let force = anticipated_collision_force(&me, &urgent_prediction(crosser));
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn test_anticipated_same_direction_moves_off_the_line() {
        let me = AgentFrame::new(Vec3::ZERO, Vec3::Z, 1.0);

        // Slower walker ahead, slightly to the -X side
        let ahead_neg_x = AgentFrame::new(Vec3::new(0.3, 0.0, 2.0), Vec3::Z, 0.5);
        let force = anticipated_collision_force(&me, &urgent_prediction(ahead_neg_x));
        assert!((force - Vec3::NEG_X).length() < 1e-6);

        let ahead_pos_x = AgentFrame::new(Vec3::new(-0.3, 0.0, 2.0), Vec3::Z, 0.5);
        let force = anticipated_collision_force(&me, &urgent_prediction(ahead_pos_x));
        assert!((force - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_avoidance_fades_once_target_is_gone() {
        let me = AgentFrame::new(Vec3::ZERO, Vec3::X, 1.0);
        let close = perceived(
            2,
            AgentFrame::new(Vec3::new(1.0, 0.0, 0.3), Vec3::NEG_X, 1.0),
            Vec3::ZERO,
        );
        let mut layer = SocialForceLayer::default();
        let weights = ForceWeights::default();
        let goal = Vec3::new(10.0, 0.0, 0.0);

        let none = GroupContext::none();
        let first = layer.tick(&input(goal, Some(&close)), &me, &weights, &none, DT);
        let start = first.forces.avoidance.length();
        assert!(start > 0.5);

        let mut lengths = Vec::new();
        for _ in 0..120 {
            let output = layer.tick(&input(goal, None), &me, &weights, &none, DT);
            lengths.push(output.forces.avoidance.length());
        }

        let mut previous = start;
        for &length in &lengths {
            assert!(length <= previous + 1e-6);
            previous = length;
        }
        assert!(lengths[15] < start);
        assert!(lengths[119] < 0.1 * start);
    }

    #[test]
    fn test_wall_force_fades_once_wall_is_gone() {
        let me = AgentFrame::new(Vec3::ZERO, Vec3::X, 1.0);
        let mut layer = SocialForceLayer::default();
        let weights = ForceWeights::default();
        let goal = Vec3::new(10.0, 0.0, 0.0);

        let mut near_wall = input(goal, None);
        near_wall.wall_normal = Some(Vec3::Z);
        let none = GroupContext::none();
        let first = layer.tick(&near_wall, &me, &weights, &none, DT);
        assert_eq!(first.forces.wall, Vec3::Z);

        let mut lengths = Vec::new();
        for _ in 0..180 {
            let output = layer.tick(&input(goal, None), &me, &weights, &none, DT);
            assert!(output.forces.wall.x.abs() < 1e-6);
            lengths.push(output.forces.wall.length());
        }

        let mut previous = 1.0;
        for &length in &lengths {
            assert!(length <= previous + 1e-6);
            previous = length;
        }
        assert!(lengths[30] < 1.0);
        assert!(lengths[179] < 0.05);
    }

    #[test]
    fn test_group_force_zero_when_not_grouped() {
        let mut layer = SocialForceLayer::default();
        let frame = AgentFrame::new(Vec3::ZERO, Vec3::X, 1.0);
        let output = layer.tick(
            &input(Vec3::new(5.0, 0.0, 0.0), None),
            &frame,
            &ForceWeights::default(),
            &GroupContext::none(),
            DT,
        );
        assert_eq!(output.forces.group, Vec3::ZERO);
    }

    #[test]
    fn test_wall_normal_snaps_in() {
        let mut layer = SocialForceLayer::default();
        let frame = AgentFrame::new(Vec3::ZERO, Vec3::X, 1.0);
        let mut with_wall = input(Vec3::new(5.0, 0.0, 0.0), None);
        with_wall.wall_normal = Some(Vec3::Z);
        let output = layer.tick(
            &with_wall,
            &frame,
            &ForceWeights::default(),
            &GroupContext::none(),
            DT,
        );
        assert_eq!(output.forces.wall, Vec3::Z);
        assert_eq!(output.desired_direction.y, 0.0);
    }
}
