//! Perception and attention
//!
//! The only stage that reads neighbour handles. Each tick it resolves the raw
//! sensor sets into owned [`PerceivedAgent`] snapshots held in pooled buffers,
//! picks the urgent and potential avoidance targets, and resolves wall and
//! obstacle normals once so later stages never query geometry again.

use glam::Vec3;

use super::contracts::{
    AgentFrame, AgentId, AttentionOutput, GroupContext, INDIVIDUAL_GROUP, PerceivedAgent,
};
use super::math::{
    COLLISION_DANGER_THRESHOLD, MIN_TIME_TO_COLLISION, nearest_approach, nearest_approach_time,
    tag_weight,
};
use super::sources::{AgentHandle, SensorInput};

/// Perception + attention stage of the steering pipeline.
pub trait PerceptionAttentionLayer {
    /// Resolve this tick's sensors. The output borrows the layer's buffers and
    /// is only valid until the next call.
    fn tick<'s>(
        &'s mut self,
        frame: &AgentFrame,
        sensors: &SensorInput<'_>,
        group: &GroupContext<'_>,
    ) -> AttentionOutput<'s>;
}

/// Default perception: nearest-approach attention over FOV sets.
#[derive(Debug, Default)]
pub struct DefaultPerceptionLayer {
    visible: Vec<PerceivedAgent>,
    avoidance_area: Vec<PerceivedAgent>,
    shared_fov: Vec<PerceivedAgent>,
}

impl DefaultPerceptionLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PerceptionAttentionLayer for DefaultPerceptionLayer {
    fn tick<'s>(
        &'s mut self,
        frame: &AgentFrame,
        sensors: &SensorInput<'_>,
        group: &GroupContext<'_>,
    ) -> AttentionOutput<'s> {
        let my_group = group.name;
        resolve_agents_into(sensors.fov_agents, my_group, sensors.self_id, &mut self.visible);
        resolve_agents_into(
            sensors.avoidance_area_agents,
            my_group,
            sensors.self_id,
            &mut self.avoidance_area,
        );

        let use_shared_fov = group.uses_group_frame() && !sensors.shared_fov_agents.is_empty();
        if use_shared_fov {
            resolve_agents_into(
                sensors.shared_fov_agents,
                my_group,
                sensors.self_id,
                &mut self.shared_fov,
            );
        } else {
            self.shared_fov.clear();
        }

        let visible = self.visible.as_slice();
        let avoidance_area = self.avoidance_area.as_slice();

        // The urgent target must also be inside the immediate avoidance area
        let urgent_target = find_most_urgent(frame, visible)
            .filter(|target| avoidance_area.iter().any(|agent| agent.id == target.id));
        let urgent_target_weight = urgent_target.map_or(1.0, tag_weight);

        let potential_target = if group.uses_group_frame() {
            let candidates = if use_shared_fov {
                self.shared_fov.as_slice()
            } else {
                visible
            };
            find_most_urgent(&group.frame, candidates)
        } else {
            find_most_urgent(frame, visible)
        };

        let (wall_normal, obstacle_normal) = resolve_environment(sensors, frame, group);

        if let Some(target) = urgent_target {
            log::trace!(
                "agent {:?}: urgent avoidance target {:?}",
                sensors.self_id,
                target.id
            );
        }

        AttentionOutput {
            visible_agents: visible,
            avoidance_area_agents: avoidance_area,
            urgent_target,
            potential_target,
            urgent_target_weight,
            wall_normal,
            obstacle_normal,
            avoidance_zone_size: sensors.avoidance_zone_size,
            agent_radius: sensors.agent_radius,
        }
    }
}

/// Resolve raw handles into snapshots. Missing handles and self are skipped.
pub fn resolve_agents_into(
    raw: &[AgentHandle<'_>],
    my_group: Option<&str>,
    self_id: AgentId,
    out: &mut Vec<PerceivedAgent>,
) {
    out.clear();

    for handle in raw {
        let Some(source) = handle else {
            continue;
        };
        if source.id() == self_id {
            continue;
        }

        let other_group = source.group_name();
        let is_same_group = my_group
            .is_some_and(|mine| mine != INDIVIDUAL_GROUP && mine == other_group);

        out.push(PerceivedAgent {
            id: source.id(),
            frame: source.frame(),
            avoidance_vector: source.avoidance_vector(),
            group_name: Some(other_group.to_string()),
            is_same_group,
            collider_radius: source.collider_radius(),
            tag: source.tag(),
        });
    }
}

/// Candidate with the smallest non-negative approach time below the ceiling
/// whose predicted separation is dangerous. Earlier candidates win ties.
#[must_use]
pub fn find_most_urgent<'a>(
    me: &AgentFrame,
    candidates: &'a [PerceivedAgent],
) -> Option<&'a PerceivedAgent> {
    let mut best = None;
    let mut min_time = MIN_TIME_TO_COLLISION;

    for agent in candidates {
        let time = nearest_approach_time(me, &agent.frame);
        if time < 0.0 || time >= min_time {
            continue;
        }

        let approach = nearest_approach(time, me, &agent.frame);
        if approach.distance < COLLISION_DANGER_THRESHOLD {
            min_time = time;
            best = Some(agent);
        }
    }

    best
}

fn resolve_environment(
    sensors: &SensorInput<'_>,
    frame: &AgentFrame,
    group: &GroupContext<'_>,
) -> (Option<Vec3>, Option<Vec3>) {
    let wall_normal = sensors
        .wall
        .and_then(|wall| wall.normal_at(frame.position));

    if sensors.obstacles.is_empty() {
        return (wall_normal, None);
    }

    // Grouped agents steer around obstacles as one body
    let reference = if group.is_in_group && !group.members.is_empty() {
        let sum = group
            .members
            .iter()
            .fold(frame.position, |acc, member| acc + member.position);
        sum / (group.members.len() + 1) as f32
    } else {
        frame.position
    };

    let closest = sensors
        .obstacles
        .iter()
        .flatten()
        .map(|obstacle| (obstacle.position().distance(reference), *obstacle))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, obstacle)| obstacle);

    let obstacle_normal = closest.and_then(|obstacle| obstacle.normal_at(reference));

    (wall_normal, obstacle_normal)
}
