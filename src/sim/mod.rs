//! Headless crowd simulation
//!
//! [`CrowdSim`] plays the part of the game engine around the steering
//! pipelines. Every step it snapshots all agents, derives the groups and the
//! sensor sets from those snapshots, then ticks each agent's pipeline in id
//! order and writes the motor output back. No agent sees another agent's
//! state from the current step.

mod sensing;

pub use sensing::SensingConfig;

use std::collections::BTreeMap;
use std::time::Instant;

use glam::Vec3;
use hecs::Entity;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::ai::{
    AgentFrame, AgentHandle, AgentId, AgentPipeline, AgentTag, CrowdGroup, DecisionOutput,
    DefaultMotorLayer, DefaultPerceptionLayer, ForceWeights, GroupAccessor, INDIVIDUAL_GROUP,
    LinearPredictionLayer, MotorConfig, NeighborSnapshot, NeighborSource, RouteFollower,
    RoundObstacle, SensorInput, SocialForceLayer, SteeringHost, Surface, UpperBodyState,
    WallSegment, WaypointGraph, horizontal,
};
use crate::core::{
    AgentSpec, DebugInfo, EventQueue, GoalSpec, Scenario, ScenarioError, StepSample,
    SteeringEvent,
};
use crate::ecs::{Activity, Agent, AgentBundle, Goal, Kinematics, Name, Steering, World};

/// Group proxies get ids counting down from here so they never clash with
/// agent ids.
const GROUP_PROXY_ID_BASE: u32 = u32::MAX;

/// What one agent's pipeline reads during its tick
struct SimHost<'a> {
    sensors: SensorInput<'a>,
    goal: Option<Vec3>,
    upper_body: UpperBodyState,
    group: Option<&'a dyn GroupAccessor>,
}

impl SteeringHost for SimHost<'_> {
    fn sensors(&self) -> SensorInput<'_> {
        self.sensors
    }

    fn goal_position(&self) -> Option<Vec3> {
        self.goal
    }

    fn upper_body_state(&self) -> UpperBodyState {
        self.upper_body
    }

    fn group(&self) -> Option<&dyn GroupAccessor> {
        self.group
    }
}

/// Group membership of one step
struct GroupState {
    name: String,
    members: SmallVec<[usize; 8]>,
}

/// Fixed-step crowd simulation
pub struct CrowdSim {
    world: World,
    walls: Vec<WallSegment>,
    obstacles: Vec<RoundObstacle>,
    waypoints: WaypointGraph,
    weights: ForceWeights,
    sensing: SensingConfig,
    dt: f32,
    elapsed: f32,
    events: EventQueue,
    debug: DebugInfo,
    collider_states: FxHashMap<String, bool>,
}

impl CrowdSim {
    /// Empty simulation
    pub fn new(dt: f32, weights: ForceWeights, sensing: SensingConfig) -> Self {
        Self {
            world: World::new(),
            walls: Vec::new(),
            obstacles: Vec::new(),
            waypoints: WaypointGraph::new(),
            weights,
            sensing,
            dt,
            elapsed: 0.0,
            events: EventQueue::new(),
            debug: DebugInfo::new(),
            collider_states: FxHashMap::default(),
        }
    }

    /// Build a simulation from a validated scenario. Agent ids are the
    /// indices into `scenario.agents`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario fails validation
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, ScenarioError> {
        scenario.validate()?;

        let mut sim = Self::new(scenario.dt, scenario.weights, scenario.sensing);
        sim.walls = scenario.walls.clone();
        sim.obstacles = scenario.obstacles.clone();
        sim.waypoints = scenario.waypoints.clone();

        for (index, spec) in scenario.agents.iter().enumerate() {
            let id = AgentId(index as u32);
            let motor = spec.motor.unwrap_or(scenario.motor);
            let pipeline = AgentPipeline::with_layers(
                id,
                motor,
                DefaultPerceptionLayer::new(),
                LinearPredictionLayer::new(),
                SocialForceLayer::new(scenario.group_weights),
                DefaultMotorLayer::new(),
            );
            let seed = scenario.seed.wrapping_add(index as u64);
            sim.spawn(id, spec, pipeline, seed);
        }

        log::info!(
            "Simulation '{}' ready: {} agents, {} walls, {} obstacles",
            scenario.name,
            scenario.agents.len(),
            sim.walls.len(),
            sim.obstacles.len()
        );
        Ok(sim)
    }

    fn spawn(&mut self, id: AgentId, spec: &AgentSpec, mut pipeline: AgentPipeline, seed: u64) {
        let speed = pipeline.motor_config().effective_initial_speed();
        pipeline.initialize();

        let mut direction = horizontal(spec.direction).normalize_or_zero();
        if direction == Vec3::ZERO {
            direction = Vec3::Z;
        }

        let mut agent = Agent::new(id, self.sensing.agent_radius);
        if let Some(group) = &spec.group {
            agent = agent.with_group(group.as_str());
        }

        let goal = match spec.goal {
            GoalSpec::Stay => Goal::Stay,
            GoalSpec::Point(point) => Goal::Fixed(point),
            GoalSpec::Route(start) => Goal::Route(RouteFollower::new(start, seed)),
        };

        self.world.spawn_agent(AgentBundle {
            agent,
            kinematics: Kinematics::new(spec.position, direction, speed),
            steering: Steering::new(pipeline),
            goal,
            activity: Activity(spec.upper_body),
            name: spec.name.as_deref().map(Name::new),
        });
    }

    /// Advance every agent by one step
    pub fn step(&mut self) {
        let started = Instant::now();

        // Snapshot everyone before anyone moves
        let mut agents: Vec<(Entity, NeighborSnapshot)> = self
            .world
            .query::<(&Agent, &Kinematics)>()
            .iter()
            .map(|(entity, (agent, kinematics))| {
                let snapshot = NeighborSnapshot::individual(agent.id, kinematics.frame)
                    .with_avoidance_vector(kinematics.avoidance_vector)
                    .with_group(agent.group_name())
                    .with_tag(AgentTag::Individual, agent.radius);
                (entity, snapshot)
            })
            .collect();
        agents.sort_unstable_by_key(|(_, snapshot)| snapshot.id);
        let (entities, snapshots): (Vec<Entity>, Vec<NeighborSnapshot>) =
            agents.into_iter().unzip();

        let (group_states, proxies) = self.update_groups(&snapshots);

        // Sensor sets over agents and group proxies
        let bodies: Vec<&NeighborSnapshot> = snapshots.iter().chain(proxies.iter()).collect();
        let sensing = self.sensing;
        let mut fov_sets: Vec<Vec<AgentHandle<'_>>> = Vec::with_capacity(snapshots.len());
        let mut area_sets: Vec<Vec<AgentHandle<'_>>> = Vec::with_capacity(snapshots.len());
        let mut obstacle_sets: Vec<Vec<Option<&dyn Surface>>> =
            Vec::with_capacity(snapshots.len());

        for me in &snapshots {
            let mut fov = Vec::new();
            let mut area = Vec::new();
            for body in &bodies {
                if body.id == me.id || (body.tag.is_group() && body.group_name == me.group_name) {
                    continue;
                }
                let position = body.frame.position;
                if sensing.in_view(&me.frame, position) {
                    fov.push(Some(*body as &dyn NeighborSource));
                }
                if sensing.in_avoidance_area(&me.frame, position, body.collider_radius) {
                    area.push(Some(*body as &dyn NeighborSource));
                }
            }
            fov_sets.push(fov);
            area_sets.push(area);

            obstacle_sets.push(
                self.obstacles
                    .iter()
                    .filter(|obstacle| sensing.senses_obstacle(&me.frame, obstacle))
                    .map(|obstacle| Some(obstacle as &dyn Surface))
                    .collect(),
            );
        }

        let mut group_of: Vec<Option<usize>> = vec![None; snapshots.len()];
        let groups: Vec<CrowdGroup<'_>> = group_states
            .iter()
            .enumerate()
            .map(|(index, state)| {
                for &member in &state.members {
                    group_of[member] = Some(index);
                }
                CrowdGroup::new(
                    state.name.as_str(),
                    state.members.iter().map(|&m| snapshots[m].handle()),
                )
                .with_shared_fov(state.members.iter().map(|&m| fov_sets[m].as_slice()))
            })
            .collect();

        let mut speed_sum = 0.0;
        let mut advanced = 0;
        let mut mutual_avoidances = 0;
        let mut targets_reached = 0;

        for (index, &entity) in entities.iter().enumerate() {
            let Ok((kinematics, steering, goal, activity)) = self
                .world
                .inner
                .query_one_mut::<(&mut Kinematics, &mut Steering, &mut Goal, &Activity)>(entity)
            else {
                continue;
            };

            let me = &snapshots[index];
            let wall = sensing
                .nearest_wall(&self.walls, me.frame.position)
                .map(|wall| &self.walls[wall] as &dyn Surface);

            let host = SimHost {
                sensors: SensorInput {
                    self_id: me.id,
                    fov_agents: &fov_sets[index],
                    avoidance_area_agents: &area_sets[index],
                    shared_fov_agents: &[],
                    wall,
                    obstacles: &obstacle_sets[index],
                    avoidance_zone_size: sensing.avoidance_zone_size,
                    agent_radius: me.collider_radius,
                },
                goal: match &*goal {
                    Goal::Stay => None,
                    Goal::Fixed(point) => Some(*point),
                    Goal::Route(route) => route.goal(&self.waypoints),
                },
                upper_body: activity.0,
                group: group_of[index].map(|g| &groups[g] as &dyn GroupAccessor),
            };

            let output = steering
                .pipeline
                .tick(&kinematics.frame, self.dt, &self.weights, &host);

            let mut next = output.motor.next_frame();
            if next.direction == Vec3::ZERO {
                // Keep facing the same way while standing still
                next.direction = kinematics.frame.direction;
            }
            kinematics.frame = next;
            kinematics.avoidance_vector = output.decision.forces.avoidance;

            if output.mutual_avoidance != steering.last_mutual {
                if let Some(other) = output.mutual_avoidance {
                    mutual_avoidances += 1;
                    self.events.push(SteeringEvent::MutualAvoidance {
                        agent: me.id,
                        other,
                    });
                }
                steering.last_mutual = output.mutual_avoidance;
            }

            if let Goal::Route(route) = goal {
                if let Some(next_waypoint) = route.update(&self.waypoints, next.position) {
                    steering.pipeline.on_target_reached();
                    targets_reached += 1;
                    self.events.push(SteeringEvent::TargetReached {
                        agent: me.id,
                        next_waypoint,
                        position: next.position,
                    });
                }
            }

            speed_sum += next.speed;
            advanced += 1;
        }

        self.elapsed += self.dt;
        self.events.swap();
        self.debug.record_step(StepSample {
            duration: started.elapsed(),
            agents: advanced,
            mutual_avoidances,
            targets_reached,
            mean_speed: if advanced > 0 {
                speed_sum / advanced as f32
            } else {
                0.0
            },
        });
    }

    /// Aggregate the groups, publish collider changes and build a proxy body
    /// for every group whose collider is active.
    fn update_groups(
        &mut self,
        snapshots: &[NeighborSnapshot],
    ) -> (Vec<GroupState>, Vec<NeighborSnapshot>) {
        let mut by_name: BTreeMap<&str, SmallVec<[usize; 8]>> = BTreeMap::new();
        for (index, snapshot) in snapshots.iter().enumerate() {
            if snapshot.group_name != INDIVIDUAL_GROUP {
                by_name
                    .entry(snapshot.group_name.as_str())
                    .or_default()
                    .push(index);
            }
        }

        let mut states = Vec::with_capacity(by_name.len());
        let mut proxies = Vec::new();

        for (name, members) in by_name {
            let group = CrowdGroup::new(name, members.iter().map(|&m| snapshots[m].handle()));
            let active = group.is_collider_active();

            let previous = self.collider_states.insert(name.to_string(), active);
            if previous != Some(active) && (previous.is_some() || active) {
                log::debug!("group '{name}' collider active: {active}");
                self.events.push(SteeringEvent::GroupColliderChanged {
                    group: name.to_string(),
                    active,
                });
            }

            if let Some(frame) = group.group_frame().filter(|_| active) {
                let id = AgentId(GROUP_PROXY_ID_BASE - proxies.len() as u32);
                proxies.push(
                    NeighborSnapshot::individual(id, frame)
                        .with_group(name)
                        .with_tag(AgentTag::Group, group.collider_radius()),
                );
            }

            states.push(GroupState {
                name: name.to_string(),
                members,
            });
        }

        (states, proxies)
    }

    /// Run `steps` steps
    pub fn run(&mut self, steps: u32) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Events raised by the last step
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn debug(&self) -> &DebugInfo {
        &self.debug
    }

    /// Simulated seconds so far
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn set_weights(&mut self, weights: ForceWeights) {
        self.weights = weights;
    }

    /// Current frame of one agent
    pub fn agent_frame(&self, id: AgentId) -> Option<AgentFrame> {
        let entity = self.world.find_agent(id)?;
        self.world
            .get::<Kinematics>(entity)
            .ok()
            .map(|kinematics| kinematics.frame)
    }

    /// Frames of all agents in id order
    pub fn frames(&self) -> Vec<(AgentId, AgentFrame)> {
        self.world
            .agents_by_id()
            .into_iter()
            .filter_map(|(id, entity)| {
                let kinematics = self.world.get::<Kinematics>(entity).ok()?;
                Some((id, kinematics.frame))
            })
            .collect()
    }

    /// Last decision of one agent, with its force breakdown
    pub fn last_decision(&self, id: AgentId) -> Option<DecisionOutput> {
        let entity = self.world.find_agent(id)?;
        let steering = self.world.get::<Steering>(entity).ok()?;
        Some(*steering.pipeline.last_decision())
    }

    /// Change an agent's speed settings mid-run. Returns false for an
    /// unknown id.
    pub fn update_motor_config(&mut self, id: AgentId, config: MotorConfig) -> bool {
        let Some(entity) = self.world.find_agent(id) else {
            return false;
        };
        match self.world.get_mut::<Steering>(entity) {
            Ok(mut steering) => {
                steering.pipeline.update_motor_config(config);
                true
            }
            Err(_) => false,
        }
    }

    /// Whether a group's proximity collider was active on the last step
    pub fn is_group_collider_active(&self, group: &str) -> Option<bool> {
        self.collider_states.get(group).copied()
    }
}
