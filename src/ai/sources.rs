//! Read interfaces the pipeline uses to observe the outside world
//!
//! The pipeline never owns or mutates anything behind these traits. Perception
//! turns neighbour handles into owned snapshots; the coordinator reads the group
//! and host accessors to build its per-tick context structs.

use glam::Vec3;

use super::contracts::{AgentFrame, AgentId, AgentTag, INDIVIDUAL_GROUP, UpperBodyState};

/// Collider radius assumed for neighbours that do not report one.
pub const DEFAULT_AGENT_RADIUS: f32 = 0.3;

/// Anything that moves and can be read kinematically.
pub trait KinematicSource {
    fn position(&self) -> Vec3;
    fn direction(&self) -> Vec3;
    fn speed(&self) -> f32;
    /// Current avoidance reaction, zero when not avoiding
    fn avoidance_vector(&self) -> Vec3;

    /// Snapshot the kinematic state
    fn frame(&self) -> AgentFrame {
        AgentFrame::new(self.position(), self.direction(), self.speed())
    }
}

/// A neighbouring agent as exposed by the outside world.
pub trait NeighborSource: KinematicSource {
    fn id(&self) -> AgentId;

    /// Name of the group the neighbour walks in
    fn group_name(&self) -> &str {
        INDIVIDUAL_GROUP
    }

    fn collider_radius(&self) -> f32 {
        DEFAULT_AGENT_RADIUS
    }

    fn tag(&self) -> AgentTag {
        AgentTag::Individual
    }
}

/// Handle to a neighbour. `None` stands for a destroyed or missing body.
pub type AgentHandle<'a> = Option<&'a dyn NeighborSource>;

/// Owned copy of a neighbour's observable state.
///
/// Drivers snapshot every agent before any agent ticks so all pipelines read
/// the same consistent state.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborSnapshot {
    pub id: AgentId,
    pub frame: AgentFrame,
    pub avoidance_vector: Vec3,
    pub group_name: String,
    pub collider_radius: f32,
    pub tag: AgentTag,
}

impl NeighborSnapshot {
    /// Lone pedestrian with the default radius and no avoidance reaction
    #[must_use]
    pub fn individual(id: AgentId, frame: AgentFrame) -> Self {
        Self {
            id,
            frame,
            avoidance_vector: Vec3::ZERO,
            group_name: INDIVIDUAL_GROUP.to_string(),
            collider_radius: DEFAULT_AGENT_RADIUS,
            tag: AgentTag::Individual,
        }
    }

    pub fn with_avoidance_vector(mut self, avoidance_vector: Vec3) -> Self {
        self.avoidance_vector = avoidance_vector;
        self
    }

    pub fn with_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = group_name.into();
        self
    }

    pub fn with_tag(mut self, tag: AgentTag, collider_radius: f32) -> Self {
        self.tag = tag;
        self.collider_radius = collider_radius;
        self
    }

    /// Borrow as a handle
    #[must_use]
    pub fn handle(&self) -> AgentHandle<'_> {
        Some(self)
    }
}

impl KinematicSource for NeighborSnapshot {
    fn position(&self) -> Vec3 {
        self.frame.position
    }

    fn direction(&self) -> Vec3 {
        self.frame.direction
    }

    fn speed(&self) -> f32 {
        self.frame.speed
    }

    fn avoidance_vector(&self) -> Vec3 {
        self.avoidance_vector
    }

    fn frame(&self) -> AgentFrame {
        self.frame
    }
}

impl NeighborSource for NeighborSnapshot {
    fn id(&self) -> AgentId {
        self.id
    }

    fn group_name(&self) -> &str {
        &self.group_name
    }

    fn collider_radius(&self) -> f32 {
        self.collider_radius
    }

    fn tag(&self) -> AgentTag {
        self.tag
    }
}

/// A wall or obstacle that can report a repulsion normal.
pub trait Surface {
    /// Reference position used to pick the nearest obstacle
    fn position(&self) -> Vec3;

    /// Normal pointing away from the surface toward `query`, if defined
    fn normal_at(&self, query: Vec3) -> Option<Vec3>;
}

/// Raw sensor bundle for one agent and tick. Owned by the caller.
#[derive(Clone, Copy)]
pub struct SensorInput<'a> {
    pub self_id: AgentId,
    pub fov_agents: &'a [AgentHandle<'a>],
    pub avoidance_area_agents: &'a [AgentHandle<'a>],
    /// Union of the group members' FOV, when grouped
    pub shared_fov_agents: &'a [AgentHandle<'a>],
    pub wall: Option<&'a dyn Surface>,
    pub obstacles: &'a [Option<&'a dyn Surface>],
    /// Size of the immediate-avoidance zone
    pub avoidance_zone_size: Vec3,
    pub agent_radius: f32,
}

impl<'a> SensorInput<'a> {
    /// Sensors that see nothing
    #[must_use]
    pub fn empty(self_id: AgentId) -> Self {
        Self {
            self_id,
            fov_agents: &[],
            avoidance_area_agents: &[],
            shared_fov_agents: &[],
            wall: None,
            obstacles: &[],
            avoidance_zone_size: Vec3::ONE,
            agent_radius: DEFAULT_AGENT_RADIUS,
        }
    }
}

/// External view of the group an agent walks in.
pub trait GroupAccessor {
    fn name(&self) -> &str;

    /// All members, self included
    fn members(&self) -> &[AgentHandle<'_>];

    /// Group-averaged kinematics, if the group proxy exists
    fn group_frame(&self) -> Option<AgentFrame>;

    /// Whether the group's proximity collider is active
    fn is_collider_active(&self) -> bool;

    /// Agents seen by any member, excluding the members
    fn shared_fov(&self) -> &[AgentHandle<'_>] {
        &[]
    }
}

/// Everything the coordinator reads about its own agent's surroundings.
pub trait SteeringHost {
    /// Sensor bundle for this tick. The shared-FOV set is filled in from the
    /// group accessor by the coordinator.
    fn sensors(&self) -> SensorInput<'_>;

    /// Current goal. `None` keeps the agent where it is.
    fn goal_position(&self) -> Option<Vec3>;

    fn upper_body_state(&self) -> UpperBodyState {
        UpperBodyState::Walk
    }

    fn group(&self) -> Option<&dyn GroupAccessor> {
        None
    }
}
