//! Crowd components

use glam::Vec3;

use crate::ai::{
    AgentFrame, AgentId, AgentPipeline, INDIVIDUAL_GROUP, RouteFollower, UpperBodyState,
};

/// Identity and static shape of a pedestrian
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    /// Group name, `None` for lone walkers
    pub group: Option<String>,
    pub radius: f32,
}

impl Agent {
    pub fn new(id: AgentId, radius: f32) -> Self {
        Self {
            id,
            group: None,
            radius,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        self.group = (group != INDIVIDUAL_GROUP).then_some(group);
        self
    }

    /// Group name as seen by other agents
    pub fn group_name(&self) -> &str {
        self.group.as_deref().unwrap_or(INDIVIDUAL_GROUP)
    }
}

/// Current motion state, rewritten every step from the motor output
#[derive(Debug, Clone, Copy, Default)]
pub struct Kinematics {
    pub frame: AgentFrame,
    /// The agent's current avoidance reaction, read by its neighbours
    pub avoidance_vector: Vec3,
}

impl Kinematics {
    pub fn new(position: Vec3, direction: Vec3, speed: f32) -> Self {
        Self {
            frame: AgentFrame::new(position, direction, speed),
            avoidance_vector: Vec3::ZERO,
        }
    }
}

/// The agent's steering pipeline
pub struct Steering {
    pub pipeline: AgentPipeline,
    /// Partner of the mutual avoidance reported last, to report each once
    pub last_mutual: Option<AgentId>,
}

impl Steering {
    pub fn new(pipeline: AgentPipeline) -> Self {
        Self {
            pipeline,
            last_mutual: None,
        }
    }
}

/// Where the agent is heading
#[derive(Debug, Clone)]
pub enum Goal {
    /// No goal: the agent holds its position
    Stay,
    Fixed(Vec3),
    Route(RouteFollower),
}

/// Upper-body activity, e.g. looking at a phone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity(pub UpperBodyState);

/// Name component for debugging
#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_individual_group_is_no_group() {
        let agent = Agent::new(AgentId(1), 0.3).with_group(INDIVIDUAL_GROUP);
        assert!(agent.group.is_none());
        assert_eq!(agent.group_name(), INDIVIDUAL_GROUP);

        let agent = Agent::new(AgentId(2), 0.3).with_group("family");
        assert_eq!(agent.group_name(), "family");
    }
}
