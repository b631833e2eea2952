//! Core simulation services
//!
//! Events, per-step statistics and scenario loading

mod debug;
mod events;
mod scenario;

pub use debug::{DebugInfo, StepSample, StepStats};
pub use events::{EventQueue, SteeringEvent};
pub use scenario::{AgentSpec, GoalSpec, Scenario, ScenarioError};
