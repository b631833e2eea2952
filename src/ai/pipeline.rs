//! Per-agent pipeline coordinator
//!
//! Runs Perception, Prediction, Decision and Motor in that fixed order once
//! per tick. The coordinator builds each stage's input from the host's
//! accessors and holds no reference back to the host between ticks.

use glam::Vec3;
use smallvec::SmallVec;

use super::contracts::{
    AgentFrame, AgentId, DecisionInput, DecisionOutput, ForceWeights, GroupContext, GroupMember,
    INDIVIDUAL_GROUP, MotorConfig, MotorContext, MotorOutput,
};
use super::decision::{DecisionLayer, SocialForceLayer};
use super::motor::{DefaultMotorLayer, MotorLayer};
use super::perception::{DefaultPerceptionLayer, PerceptionAttentionLayer};
use super::prediction::{LinearPredictionLayer, PredictionLayer};
use super::sources::{GroupAccessor, SteeringHost};

/// Identities of the agents the pipeline reacted to on its last tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AvoidanceTargets {
    pub urgent: Option<AgentId>,
    pub potential: Option<AgentId>,
}

/// Everything one tick produces
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOutput {
    pub motor: MotorOutput,
    /// Direction, speed and the six force vectors (diagnostic)
    pub decision: DecisionOutput,
    pub targets: AvoidanceTargets,
    /// Other agent of a detected mutual avoidance
    pub mutual_avoidance: Option<AgentId>,
}

/// Steering pipeline of a single agent.
///
/// Each layer is a type parameter so alternative models can be swapped in;
/// the defaults give the social force model.
pub struct AgentPipeline<
    P = DefaultPerceptionLayer,
    Pr = LinearPredictionLayer,
    D = SocialForceLayer,
    M = DefaultMotorLayer,
> {
    id: AgentId,
    perception: P,
    prediction: Pr,
    decision: D,
    motor: M,
    motor_config: MotorConfig,
    group_members: SmallVec<[GroupMember; 8]>,
    last_decision: DecisionOutput,
    last_targets: AvoidanceTargets,
    warned_uninitialized: bool,
}

impl AgentPipeline {
    /// Pipeline with the default layers
    #[must_use]
    pub fn new(id: AgentId, motor_config: MotorConfig) -> Self {
        Self::with_layers(
            id,
            motor_config,
            DefaultPerceptionLayer::new(),
            LinearPredictionLayer::new(),
            SocialForceLayer::default(),
            DefaultMotorLayer::new(),
        )
    }
}

impl<P, Pr, D, M> AgentPipeline<P, Pr, D, M>
where
    P: PerceptionAttentionLayer,
    Pr: PredictionLayer,
    D: DecisionLayer,
    M: MotorLayer,
{
    pub fn with_layers(
        id: AgentId,
        motor_config: MotorConfig,
        perception: P,
        prediction: Pr,
        decision: D,
        motor: M,
    ) -> Self {
        Self {
            id,
            perception,
            prediction,
            decision,
            motor,
            motor_config,
            group_members: SmallVec::new(),
            last_decision: DecisionOutput::default(),
            last_targets: AvoidanceTargets::default(),
            warned_uninitialized: false,
        }
    }

    #[inline]
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Arm the motor at the configured initial speed (floored at min speed)
    pub fn initialize(&mut self) {
        self.motor
            .initialize(self.motor_config.effective_initial_speed());
    }

    pub fn is_initialized(&self) -> bool {
        self.motor.is_initialized()
    }

    pub fn motor_config(&self) -> &MotorConfig {
        &self.motor_config
    }

    /// Replace the speed configuration. The current speed is reset to the new
    /// initial speed, floored at the new minimum.
    pub fn update_motor_config(&mut self, config: MotorConfig) {
        self.motor_config = config;
        self.motor
            .update_initial_speed(config.initial_speed, config.min_speed);
    }

    pub fn motor_speed(&self) -> f32 {
        self.motor.current_speed()
    }

    /// Ease the speed back to the configured initial speed after a waypoint
    pub fn on_target_reached(&mut self) {
        self.motor.on_target_reached(self.motor_config.initial_speed);
    }

    /// Decision of the last tick
    pub fn last_decision(&self) -> &DecisionOutput {
        &self.last_decision
    }

    pub fn last_targets(&self) -> AvoidanceTargets {
        self.last_targets
    }

    /// Extrapolate along the last desired direction without running the
    /// pipeline. Falls back to `fallback_direction`, then +Z.
    ///
    /// Returns the predicted position and the direction used.
    #[must_use]
    pub fn predict_position(
        &self,
        time: f32,
        position: Vec3,
        speed: f32,
        fallback_direction: Vec3,
    ) -> (Vec3, Vec3) {
        let mut direction = self.last_decision.desired_direction;
        if direction == Vec3::ZERO {
            direction = if fallback_direction != Vec3::ZERO {
                fallback_direction
            } else {
                Vec3::Z
            };
        }
        (position + direction * speed * time, direction)
    }

    /// Run every stage once
    pub fn tick(
        &mut self,
        frame: &AgentFrame,
        dt: f32,
        weights: &ForceWeights,
        host: &dyn SteeringHost,
    ) -> PipelineOutput {
        if !self.motor.is_initialized() {
            if !self.warned_uninitialized {
                log::warn!("agent {} ticked before initialize", self.id.0);
                self.warned_uninitialized = true;
            }
            return PipelineOutput {
                motor: MotorOutput::pass_through(frame),
                decision: DecisionOutput::default(),
                targets: AvoidanceTargets::default(),
                mutual_avoidance: None,
            };
        }

        let accessor = host.group();
        let group = build_group_context(self.id, frame, accessor, &mut self.group_members);

        let mut sensors = host.sensors();
        if group.is_in_group {
            if let Some(accessor) = accessor {
                sensors.shared_fov_agents = accessor.shared_fov();
            }
        }

        let goal = host.goal_position().unwrap_or(frame.position);

        let attention = self.perception.tick(frame, &sensors, &group);
        let prediction = self.prediction.tick(&attention, frame, &group);
        let input = DecisionInput::new(&attention, prediction, goal);
        let decision = self.decision.tick(&input, frame, weights, &group, dt);

        let targets = AvoidanceTargets {
            urgent: attention.urgent_target.map(|agent| agent.id),
            potential: attention.potential_target.map(|agent| agent.id),
        };

        let context = MotorContext {
            goal_position: goal,
            upper_body: host.upper_body_state(),
            config: self.motor_config,
        };
        let motor = self.motor.tick(&decision, frame, &context, &group, dt);

        log::trace!(
            "agent {} dir {:?} speed {:.3} urgent {:?}",
            self.id.0,
            decision.desired_direction,
            motor.speed,
            targets.urgent
        );

        self.last_decision = decision;
        self.last_targets = targets;

        PipelineOutput {
            motor,
            decision,
            targets,
            mutual_avoidance: decision.mutual_avoidance,
        }
    }
}

/// Build the group context, reusing `members` as the member buffer.
///
/// Lone agents and agents in the "Individual" pseudo-group get
/// [`GroupContext::none`].
fn build_group_context<'g>(
    self_id: AgentId,
    frame: &AgentFrame,
    accessor: Option<&'g dyn GroupAccessor>,
    members: &'g mut SmallVec<[GroupMember; 8]>,
) -> GroupContext<'g> {
    members.clear();

    let Some(accessor) = accessor else {
        return GroupContext::none();
    };
    let name = accessor.name();
    if name == INDIVIDUAL_GROUP || accessor.members().is_empty() {
        return GroupContext::none();
    }

    for handle in accessor.members().iter().flatten() {
        if handle.id() == self_id {
            continue;
        }
        members.push(GroupMember {
            position: handle.position(),
            direction: handle.direction(),
            speed: handle.speed(),
        });
    }

    let center_of_mass = if members.is_empty() {
        frame.position
    } else {
        members.iter().map(|m| m.position).sum::<Vec3>() / members.len() as f32
    };

    GroupContext {
        is_in_group: true,
        is_collider_active: accessor.is_collider_active(),
        name: Some(name),
        members: members.as_slice(),
        frame: accessor.group_frame().unwrap_or(*frame),
        center_of_mass,
    }
}
