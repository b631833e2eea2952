//! Scenario serialization and deserialization
//!
//! A scenario describes a whole crowd run: agents, groups, walls, obstacles,
//! the waypoint graph and the stepping parameters. Saved and loaded as RON
//! (Rusty Object Notation) or JSON.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ai::{
    ForceWeights, GroupForceWeights, MotorConfig, RoundObstacle, UpperBodyState, WallSegment,
    WaypointGraph,
};
use crate::sim::SensingConfig;

/// Where an agent is heading at the start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum GoalSpec {
    /// Hold position
    #[default]
    Stay,
    /// Walk to a fixed point
    Point(Vec3),
    /// Wander the waypoint graph starting from this node
    Route(usize),
}

/// One agent of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub position: Vec3,
    pub direction: Vec3,
    /// Group name. Members of the same group walk together.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub goal: GoalSpec,
    /// Overrides the scenario-wide motor settings
    #[serde(default)]
    pub motor: Option<MotorConfig>,
    #[serde(default)]
    pub upper_body: UpperBodyState,
}

impl AgentSpec {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            name: None,
            position,
            direction,
            group: None,
            goal: GoalSpec::Stay,
            motor: None,
            upper_body: UpperBodyState::Walk,
        }
    }

    pub fn with_goal(mut self, goal: GoalSpec) -> Self {
        self.goal = goal;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

fn default_steps() -> u32 {
    600
}

/// A serializable crowd scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Scenario version for compatibility
    #[serde(default)]
    pub version: u32,
    /// Fixed step length in seconds
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Seed of the route RNGs
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub weights: ForceWeights,
    #[serde(default)]
    pub group_weights: GroupForceWeights,
    #[serde(default)]
    pub motor: MotorConfig,
    #[serde(default)]
    pub sensing: SensingConfig,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
    #[serde(default)]
    pub walls: Vec<WallSegment>,
    #[serde(default)]
    pub obstacles: Vec<RoundObstacle>,
    #[serde(default)]
    pub waypoints: WaypointGraph,
}

impl Scenario {
    /// Create a new empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            dt: default_dt(),
            steps: default_steps(),
            seed: 0,
            weights: ForceWeights::default(),
            group_weights: GroupForceWeights::default(),
            motor: MotorConfig::default(),
            sensing: SensingConfig::default(),
            agents: Vec::new(),
            walls: Vec::new(),
            obstacles: Vec::new(),
            waypoints: WaypointGraph::new(),
        }
    }

    /// Add an agent and return its index, which is also its id
    pub fn add_agent(&mut self, agent: AgentSpec) -> usize {
        self.agents.push(agent);
        self.agents.len() - 1
    }

    /// Two walkers on a head-on course in a corridor, plus a pair walking
    /// across them. Used when no scenario file is given.
    #[must_use]
    pub fn crossing() -> Self {
        let mut scenario = Self::new("crossing");
        scenario.steps = 900;
        scenario.walls = vec![
            WallSegment::new(Vec3::new(-12.0, 0.0, -3.0), Vec3::new(12.0, 0.0, -3.0)),
            WallSegment::new(Vec3::new(-12.0, 0.0, 3.0), Vec3::new(12.0, 0.0, 3.0)),
        ];
        scenario.obstacles = vec![RoundObstacle::new(Vec3::new(0.0, 0.0, 2.0), 0.4)];
        scenario.add_agent(
            AgentSpec::new(Vec3::new(-8.0, 0.0, 0.1), Vec3::X)
                .with_name("east")
                .with_goal(GoalSpec::Point(Vec3::new(10.0, 0.0, 0.0))),
        );
        scenario.add_agent(
            AgentSpec::new(Vec3::new(8.0, 0.0, -0.1), Vec3::NEG_X)
                .with_name("west")
                .with_goal(GoalSpec::Point(Vec3::new(-10.0, 0.0, 0.0))),
        );
        for z in [-0.4, 0.4] {
            scenario.add_agent(
                AgentSpec::new(Vec3::new(-6.0, 0.0, z), Vec3::X)
                    .with_group("pair")
                    .with_goal(GoalSpec::Point(Vec3::new(10.0, 0.0, z))),
            );
        }
        scenario
    }

    /// Check values the simulation cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidScenario`] describing the first problem
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ScenarioError::InvalidScenario(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if !self.waypoints.is_consistent() {
            return Err(ScenarioError::InvalidScenario(
                "waypoint graph links a missing node".to_string(),
            ));
        }
        for (index, agent) in self.agents.iter().enumerate() {
            if !agent.position.is_finite() || !agent.direction.is_finite() {
                return Err(ScenarioError::InvalidScenario(format!(
                    "agent {index} has a non-finite position or direction"
                )));
            }
            if let GoalSpec::Route(start) = agent.goal {
                if start >= self.waypoints.len() {
                    return Err(ScenarioError::InvalidScenario(format!(
                        "agent {index} starts its route at missing waypoint {start}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Parse a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails
    pub fn from_ron_str(content: &str) -> Result<Self, ScenarioError> {
        ron::from_str(content).map_err(|e| ScenarioError::DeserializeError(e.to_string()))
    }

    /// Save the scenario to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ScenarioError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ScenarioError::SerializeError(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| ScenarioError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a scenario from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let content =
            fs::read_to_string(path).map_err(|e| ScenarioError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save the scenario to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ScenarioError> {
        let json_string = serde_json::to_string_pretty(self)
            .map_err(|e| ScenarioError::SerializeError(e.to_string()))?;
        fs::write(path, json_string).map_err(|e| ScenarioError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a scenario from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let content =
            fs::read_to_string(path).map_err(|e| ScenarioError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ScenarioError::DeserializeError(e.to_string()))
    }

    /// Load by file extension (`.json`, anything else is read as RON) and
    /// validate
    ///
    /// # Errors
    ///
    /// Returns an error if loading or validation fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let scenario = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::load_json(path)?,
            _ => Self::load_ron(path)?,
        };
        scenario.validate()?;
        log::info!(
            "Loaded scenario '{}' with {} agents",
            scenario.name,
            scenario.agents.len()
        );
        Ok(scenario)
    }

    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Errors that can occur during scenario operations
#[derive(Debug, Clone)]
pub enum ScenarioError {
    /// IO error
    IoError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error
    DeserializeError(String),
    /// Parsed fine but cannot be simulated
    InvalidScenario(String),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
            Self::InvalidScenario(e) => write!(f, "Invalid scenario: {e}"),
        }
    }
}

impl std::error::Error for ScenarioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_plaza_scenario_parses() {
        let scenario = Scenario::from_ron_str(include_str!("../../scenarios/plaza.ron")).unwrap();
        scenario.validate().unwrap();
        assert_eq!(scenario.agent_count(), 6);
        assert_eq!(scenario.waypoints.len(), 4);
        assert_eq!(scenario.agents[0].goal, GoalSpec::Route(0));
        assert_eq!(scenario.agents[4].motor.unwrap().max_speed, 0.9);
        assert_eq!(scenario.agents[4].motor.unwrap().min_speed, 0.0);
        assert_eq!(scenario.agents[5].upper_body, UpperBodyState::Talk);
        assert_eq!(scenario.group_weights, GroupForceWeights::default());
    }

    #[test]
    fn test_scenario_serialization_ron() {
        let scenario = Scenario::crossing();

        let ron_str =
            ron::ser::to_string_pretty(&scenario, ron::ser::PrettyConfig::default()).unwrap();
        assert!(ron_str.contains("east"));

        let loaded = Scenario::from_ron_str(&ron_str).unwrap();
        assert_eq!(loaded.name, "crossing");
        assert_eq!(loaded.agents.len(), 4);
        assert_eq!(loaded.agents[2].group.as_deref(), Some("pair"));
        assert_eq!(loaded.walls.len(), 2);
    }

    #[test]
    fn test_scenario_serialization_json() {
        let mut scenario = Scenario::new("JSON Test");
        scenario.add_agent(
            AgentSpec::new(Vec3::ZERO, Vec3::Z).with_goal(GoalSpec::Point(Vec3::new(0.0, 0.0, 5.0))),
        );

        let json_str = serde_json::to_string_pretty(&scenario).unwrap();
        let loaded: Scenario = serde_json::from_str(&json_str).unwrap();
        assert_eq!(loaded, scenario);
    }

    #[test]
    fn test_minimal_ron_uses_defaults() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "tiny",
                agents: [
                    (position: (0.0, 0.0, 0.0), direction: (1.0, 0.0, 0.0), goal: Point((5.0, 0.0, 0.0))),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(scenario.steps, 600);
        assert!((scenario.dt - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(scenario.weights, ForceWeights::default());
        assert_eq!(scenario.agents[0].upper_body, UpperBodyState::Walk);
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_route_and_dt() {
        let mut scenario = Scenario::new("bad");
        scenario.add_agent(AgentSpec::new(Vec3::ZERO, Vec3::X).with_goal(GoalSpec::Route(3)));
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::InvalidScenario(_))
        ));

        let mut scenario = Scenario::new("bad dt");
        scenario.dt = 0.0;
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().starts_with("Invalid scenario"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Scenario::load("/nonexistent/crowd.ron");
        assert!(matches!(result, Err(ScenarioError::IoError(_))));
    }
}
