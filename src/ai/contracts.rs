//! Data contracts between pipeline stages
//!
//! Every stage consumes the previous stage's output by value (or by borrow of
//! the producing stage's pooled buffers) within a single tick. Nothing here is
//! retained across ticks.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Group name used by agents that walk alone.
pub const INDIVIDUAL_GROUP: &str = "Individual";

/// Stable identity of a simulated agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Classification tag of a perceived body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgentTag {
    /// A single pedestrian
    #[default]
    Individual,
    /// A proxy body standing in for a whole group
    Group,
}

impl AgentTag {
    /// Whether this is a group proxy
    #[inline]
    #[must_use]
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }
}

/// Upper-body activity reported by the animation side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpperBodyState {
    #[default]
    Walk,
    Talk,
    /// Looking at a phone; the agent slows to its minimum speed
    SmartPhone,
}

impl UpperBodyState {
    /// Distracted agents walk at minimum speed
    #[must_use]
    pub fn is_distracted(self) -> bool {
        matches!(self, Self::SmartPhone)
    }
}

/// Instantaneous kinematic snapshot of one pedestrian
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentFrame {
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
}

impl AgentFrame {
    #[must_use]
    pub fn new(position: Vec3, direction: Vec3, speed: f32) -> Self {
        Self {
            position,
            direction,
            speed,
        }
    }

    /// Velocity vector (direction scaled by speed)
    #[inline]
    #[must_use]
    pub fn velocity(&self) -> Vec3 {
        self.direction * self.speed
    }

    /// Position after moving linearly for `time`
    #[inline]
    #[must_use]
    pub fn extrapolate(&self, time: f32) -> Vec3 {
        self.position + self.direction * self.speed * time
    }
}

/// One neighbour as seen this tick.
///
/// Built by the perception layer from a live handle; downstream stages only see
/// this snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceivedAgent {
    pub id: AgentId,
    pub frame: AgentFrame,
    /// The neighbour's own current avoidance reaction
    pub avoidance_vector: Vec3,
    pub group_name: Option<String>,
    /// Whether the neighbour walks in the perceiving agent's group
    pub is_same_group: bool,
    pub collider_radius: f32,
    pub tag: AgentTag,
}

impl PerceivedAgent {
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.frame.position
    }
}

/// Pre-resolved kinematics of a fellow group member
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMember {
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
}

/// Per-tick group aggregate, built by the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct GroupContext<'a> {
    pub is_in_group: bool,
    pub is_collider_active: bool,
    pub name: Option<&'a str>,
    /// Members excluding self
    pub members: &'a [GroupMember],
    /// Group-averaged frame
    pub frame: AgentFrame,
    /// Centre of mass of the members excluding self
    pub center_of_mass: Vec3,
}

impl GroupContext<'_> {
    /// Context for an agent walking alone
    #[must_use]
    pub fn none() -> Self {
        Self {
            is_in_group: false,
            is_collider_active: false,
            name: None,
            members: &[],
            frame: AgentFrame::default(),
            center_of_mass: Vec3::ZERO,
        }
    }

    /// Grouped and moving as one body behind the shared proximity collider
    #[inline]
    #[must_use]
    pub fn uses_group_frame(&self) -> bool {
        self.is_in_group && self.is_collider_active
    }
}

impl Default for GroupContext<'_> {
    fn default() -> Self {
        Self::none()
    }
}

/// Output of the perception/attention stage.
#[derive(Debug, Clone, Copy)]
pub struct AttentionOutput<'a> {
    /// Agents resolved from the FOV set
    pub visible_agents: &'a [PerceivedAgent],
    /// Agents resolved from the immediate-avoidance-area set
    pub avoidance_area_agents: &'a [PerceivedAgent],
    pub urgent_target: Option<&'a PerceivedAgent>,
    pub potential_target: Option<&'a PerceivedAgent>,
    /// Tag weight of the urgent target (1 when absent)
    pub urgent_target_weight: f32,
    pub wall_normal: Option<Vec3>,
    pub obstacle_normal: Option<Vec3>,
    pub avoidance_zone_size: Vec3,
    pub agent_radius: f32,
}

/// A neighbour extrapolated to its time of nearest approach
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedNeighbor {
    pub id: AgentId,
    /// The neighbour's frame at perception time
    pub agent: AgentFrame,
    pub tag: AgentTag,
    pub collider_radius: f32,
    /// Where the neighbour will be at the approach time
    pub predicted_position: Vec3,
    /// Where this agent will be at the approach time
    pub self_position_at_approach: Vec3,
    pub time_to_approach: f32,
    pub distance_at_approach: f32,
}

/// Output of the prediction stage.
#[derive(Debug, Clone, Copy)]
pub struct PredictionOutput<'a> {
    /// All non-diverging neighbours
    pub neighbors: &'a [PredictedNeighbor],
    pub time_to_nearest_collision: f32,
    pub most_urgent: Option<PredictedNeighbor>,
}

impl PredictionOutput<'_> {
    /// Nothing predicted
    #[must_use]
    pub fn empty() -> Self {
        Self {
            neighbors: &[],
            time_to_nearest_collision: super::math::MIN_TIME_TO_COLLISION,
            most_urgent: None,
        }
    }
}

/// Weights of the six social forces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceWeights {
    pub to_goal: f32,
    pub avoidance: f32,
    pub anticipated_collision: f32,
    pub group: f32,
    pub wall: f32,
    pub obstacle: f32,
}

impl Default for ForceWeights {
    fn default() -> Self {
        Self {
            to_goal: 2.0,
            avoidance: 2.0,
            anticipated_collision: 2.0,
            group: 0.5,
            wall: 0.2,
            obstacle: 1.0,
        }
    }
}

impl ForceWeights {
    /// All weights zero
    pub const ZERO: Self = Self {
        to_goal: 0.0,
        avoidance: 0.0,
        anticipated_collision: 0.0,
        group: 0.0,
        wall: 0.0,
        obstacle: 0.0,
    };

    /// Steer toward the goal only
    #[must_use]
    pub fn goal_only() -> Self {
        Self {
            to_goal: 1.0,
            ..Self::ZERO
        }
    }

    pub fn with_to_goal(mut self, weight: f32) -> Self {
        self.to_goal = weight;
        self
    }

    pub fn with_avoidance(mut self, weight: f32) -> Self {
        self.avoidance = weight;
        self
    }

    pub fn with_anticipated_collision(mut self, weight: f32) -> Self {
        self.anticipated_collision = weight;
        self
    }

    pub fn with_group(mut self, weight: f32) -> Self {
        self.group = weight;
        self
    }

    pub fn with_wall(mut self, weight: f32) -> Self {
        self.wall = weight;
        self
    }

    pub fn with_obstacle(mut self, weight: f32) -> Self {
        self.obstacle = weight;
        self
    }
}

/// Sub-weights of the group force
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupForceWeights {
    pub cohesion: f32,
    pub repulsion: f32,
    pub alignment: f32,
}

impl Default for GroupForceWeights {
    fn default() -> Self {
        Self {
            cohesion: 2.0,
            repulsion: 1.5,
            alignment: 1.5,
        }
    }
}

/// Fully resolved input of the decision stage
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub prediction: PredictionOutput<'a>,
    pub urgent_target: Option<&'a PerceivedAgent>,
    pub urgent_target_weight: f32,
    pub potential_target: Option<&'a PerceivedAgent>,
    pub wall_normal: Option<Vec3>,
    pub obstacle_normal: Option<Vec3>,
    pub goal_position: Vec3,
    pub avoidance_zone_size: Vec3,
    pub agent_radius: f32,
}

impl<'a> DecisionInput<'a> {
    /// Combine perception and prediction results with the current goal
    #[must_use]
    pub fn new(
        attention: &AttentionOutput<'a>,
        prediction: PredictionOutput<'a>,
        goal_position: Vec3,
    ) -> Self {
        Self {
            prediction,
            urgent_target: attention.urgent_target,
            urgent_target_weight: attention.urgent_target_weight,
            potential_target: attention.potential_target,
            wall_normal: attention.wall_normal,
            obstacle_normal: attention.obstacle_normal,
            goal_position,
            avoidance_zone_size: attention.avoidance_zone_size,
            agent_radius: attention.agent_radius,
        }
    }
}

/// The six force vectors of one decision, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForceBreakdown {
    pub to_goal: Vec3,
    pub avoidance: Vec3,
    pub anticipated_collision: Vec3,
    pub group: Vec3,
    pub wall: Vec3,
    pub obstacle: Vec3,
}

impl ForceBreakdown {
    /// Weighted sum of all forces
    #[must_use]
    pub fn weighted_sum(&self, weights: &ForceWeights) -> Vec3 {
        weights.to_goal * self.to_goal
            + weights.avoidance * self.avoidance
            + weights.anticipated_collision * self.anticipated_collision
            + weights.group * self.group
            + weights.wall * self.wall
            + weights.obstacle * self.obstacle
    }
}

/// Output of the decision stage
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecisionOutput {
    /// Normalised weighted direction on the horizontal plane
    pub desired_direction: Vec3,
    pub desired_speed: f32,
    /// Other agent of a detected mutual (parallel) avoidance
    pub mutual_avoidance: Option<AgentId>,
    pub forces: ForceBreakdown,
}

/// Speed configuration of the motor stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub initial_speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub slowing_radius: f32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            initial_speed: 0.7,
            min_speed: 0.0,
            max_speed: 1.0,
            slowing_radius: 3.0,
        }
    }
}

impl MotorConfig {
    pub fn with_initial_speed(mut self, speed: f32) -> Self {
        self.initial_speed = speed;
        self
    }

    pub fn with_speed_range(mut self, min: f32, max: f32) -> Self {
        self.min_speed = min;
        self.max_speed = max;
        self
    }

    pub fn with_slowing_radius(mut self, radius: f32) -> Self {
        self.slowing_radius = radius;
        self
    }

    /// Initial speed floored at the minimum speed
    #[must_use]
    pub fn effective_initial_speed(&self) -> f32 {
        self.initial_speed.max(self.min_speed)
    }
}

/// Per-tick input of the motor stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorContext {
    pub goal_position: Vec3,
    pub upper_body: UpperBodyState,
    pub config: MotorConfig,
}

/// Output of the motor stage
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorOutput {
    pub next_position: Vec3,
    pub next_direction: Vec3,
    pub speed: f32,
    pub is_in_slowing_area: bool,
}

impl MotorOutput {
    /// Output that leaves the agent where it is
    #[must_use]
    pub fn pass_through(frame: &AgentFrame) -> Self {
        Self {
            next_position: frame.position,
            next_direction: frame.direction,
            speed: frame.speed,
            is_in_slowing_area: false,
        }
    }

    /// Frame the agent starts its next tick from
    #[must_use]
    pub fn next_frame(&self) -> AgentFrame {
        AgentFrame::new(self.next_position, self.next_direction, self.speed)
    }
}
