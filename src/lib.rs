//! Crowd steering for pedestrian agents
//!
//! This crate provides:
//! - A per-agent steering pipeline (perception, prediction, decision, motor)
//! - Group, wall, obstacle and waypoint helpers feeding that pipeline
//! - An ECS-backed headless simulation driven by scenario files

pub mod ai;
pub mod core;
pub mod ecs;
pub mod sim;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ai::{
        AgentFrame, AgentId, AgentPipeline, ForceWeights, GroupForceWeights, MotorConfig,
        PipelineOutput, SensorInput, SteeringHost, UpperBodyState,
    };
    pub use crate::core::{AgentSpec, GoalSpec, Scenario, ScenarioError, SteeringEvent};
    pub use crate::ecs::World;
    pub use crate::sim::{CrowdSim, SensingConfig};
    pub use glam::Vec3;
}
