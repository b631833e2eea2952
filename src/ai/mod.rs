//! Crowd steering
//!
//! A per-agent pipeline (perception, prediction, decision, motor) that turns
//! what an agent senses into its next position, plus the environment, group
//! and waypoint helpers a driver needs to feed it.

mod contracts;
mod decision;
mod environment;
mod group;
mod math;
mod motor;
mod perception;
mod pipeline;
mod prediction;
mod sources;
mod timed_force;
mod waypoints;

pub use contracts::{
    AgentFrame, AgentId, AgentTag, AttentionOutput, DecisionInput, DecisionOutput,
    ForceBreakdown, ForceWeights, GroupContext, GroupForceWeights, GroupMember,
    INDIVIDUAL_GROUP, MotorConfig, MotorContext, MotorOutput, PerceivedAgent, PredictedNeighbor,
    PredictionOutput, UpperBodyState,
};
pub use decision::{
    DecisionLayer, MUTUAL_AVOIDANCE_DOT_THRESHOLD, SocialForceLayer, alignment_force,
    anticipated_collision_force, check_opponent_direction, cohesion_force,
    compute_avoidance_vector, repulsion_force,
};
pub use environment::{RoundObstacle, WallSegment};
pub use group::{CrowdGroup, MemberHandles};
pub use math::{
    Approach, COLLISION_DANGER_THRESHOLD, MIN_TIME_TO_COLLISION, horizontal, nearest_approach,
    nearest_approach_time, reflection_vector, slerp_vector, tag_weight,
};
pub use motor::{DefaultMotorLayer, MotorLayer};
pub use perception::{
    DefaultPerceptionLayer, PerceptionAttentionLayer, find_most_urgent, resolve_agents_into,
};
pub use pipeline::{AgentPipeline, AvoidanceTargets, PipelineOutput};
pub use prediction::{LinearPredictionLayer, PredictionLayer};
pub use sources::{
    AgentHandle, DEFAULT_AGENT_RADIUS, GroupAccessor, KinematicSource, NeighborSnapshot,
    NeighborSource, SensorInput, SteeringHost, Surface,
};
pub use timed_force::{BlendMode, Cadence, TimedForce};
pub use waypoints::{DEFAULT_GOAL_RADIUS, RouteFollower, Waypoint, WaypointGraph};
