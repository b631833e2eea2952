//! Motor
//!
//! Speed management: individual or group speed every 0.1s, slowing near the
//! goal, and a short linear transition back to cruising speed after a target
//! is reached. Integrates the decided direction into the next position.

use glam::Vec3;

use super::contracts::{AgentFrame, DecisionOutput, GroupContext, MotorContext, MotorOutput};
use super::timed_force::Cadence;

const SPEED_UPDATE_INTERVAL: f32 = 0.1;
const SPEED_CHANGE_RATE: f32 = 0.05;
const TARGET_REACHED_TRANSITION: f32 = 0.5;
const GROUP_SAFETY_DISTANCE: f32 = 0.05;

/// Motor stage of the steering pipeline.
pub trait MotorLayer {
    /// Arm the layer. Until called, ticks pass the frame through unchanged.
    fn initialize(&mut self, initial_speed: f32);

    fn is_initialized(&self) -> bool;

    fn tick(
        &mut self,
        decision: &DecisionOutput,
        frame: &AgentFrame,
        context: &MotorContext,
        group: &GroupContext<'_>,
        dt: f32,
    ) -> MotorOutput;

    /// Start easing back to `initial_speed`
    fn on_target_reached(&mut self, initial_speed: f32);

    /// Replace the current speed, floored at `min_speed`
    fn update_initial_speed(&mut self, initial_speed: f32, min_speed: f32);

    fn current_speed(&self) -> f32;
}

#[derive(Debug, Clone, Copy)]
struct SpeedTransition {
    elapsed: f32,
    duration: f32,
    from: f32,
    to: f32,
}

impl SpeedTransition {
    /// Advance and return the new speed plus whether the transition finished
    fn advance(&mut self, dt: f32) -> (f32, bool) {
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            (self.to, true)
        } else {
            let t = self.elapsed / self.duration;
            (self.from + (self.to - self.from) * t, false)
        }
    }
}

/// Default speed controller
#[derive(Debug, Clone)]
pub struct DefaultMotorLayer {
    initialized: bool,
    current_speed: f32,
    in_slowing_area: bool,
    /// Group cruising speed, computed once on the first grouped update
    group_speed: Option<f32>,
    transition: Option<SpeedTransition>,
    speed_update: Cadence,
}

impl Default for DefaultMotorLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultMotorLayer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            current_speed: 0.0,
            in_slowing_area: false,
            group_speed: None,
            transition: None,
            speed_update: Cadence::new(SPEED_UPDATE_INTERVAL),
        }
    }

    /// Whether a target-reached transition is running
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    fn update_speed(&mut self, frame: &AgentFrame, context: &MotorContext, group: &GroupContext<'_>) {
        if !group.is_in_group || group.members.is_empty() {
            self.update_individual_speed(context);
            return;
        }

        let config = &context.config;
        let Some(baseline) = self.group_speed else {
            let count = group.members.len() as f32;
            let mean = group.members.iter().map(|m| m.speed).sum::<f32>() / count;
            // +1 for self
            let baseline = (mean - 0.1 * (count + 1.0)).clamp(config.min_speed, config.max_speed);
            self.group_speed = Some(baseline);
            return;
        };

        let to_center = group.center_of_mass - frame.position;
        let distance = to_center.length();
        let threshold = (group.members.len() as f32 + 1.0) * 0.3 + GROUP_SAFETY_DISTANCE;

        if distance > threshold {
            if frame.direction.dot(to_center.normalize_or_zero()) > 0.0 {
                self.current_speed = (self.current_speed + SPEED_CHANGE_RATE).min(config.max_speed);
            } else {
                self.current_speed = (self.current_speed - SPEED_CHANGE_RATE).max(config.min_speed);
            }
        } else {
            self.current_speed = baseline;
        }
    }

    fn update_individual_speed(&mut self, context: &MotorContext) {
        let initial = context.config.effective_initial_speed();
        if context.upper_body.is_distracted() {
            self.current_speed = context.config.min_speed;
        } else if self.current_speed < initial {
            self.current_speed = initial;
        }
    }

    fn slow_near_goal(&mut self, position: Vec3, context: &MotorContext) {
        if self.transition.is_some() {
            return;
        }
        let config = &context.config;
        let distance = position.distance(context.goal_position);
        if distance < config.slowing_radius {
            let t = distance / config.slowing_radius;
            let desired = config.min_speed + (config.max_speed - config.min_speed) * t;
            self.current_speed = self.current_speed.min(desired);
        }
    }
}

impl MotorLayer for DefaultMotorLayer {
    fn initialize(&mut self, initial_speed: f32) {
        self.current_speed = initial_speed;
        self.initialized = true;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn tick(
        &mut self,
        decision: &DecisionOutput,
        frame: &AgentFrame,
        context: &MotorContext,
        group: &GroupContext<'_>,
        dt: f32,
    ) -> MotorOutput {
        if !self.initialized {
            return MotorOutput::pass_through(frame);
        }

        if self.speed_update.tick(dt) {
            self.update_speed(frame, context, group);
            self.slow_near_goal(frame.position, context);
            self.in_slowing_area =
                frame.position.distance(context.goal_position) < context.config.slowing_radius;
        }

        if let Some(transition) = self.transition.as_mut() {
            let (speed, finished) = transition.advance(dt);
            self.current_speed = speed;
            if finished {
                self.transition = None;
            }
        }

        let direction = decision.desired_direction;
        MotorOutput {
            next_position: frame.position + direction * self.current_speed * dt,
            next_direction: direction,
            speed: self.current_speed,
            is_in_slowing_area: self.in_slowing_area,
        }
    }

    fn on_target_reached(&mut self, initial_speed: f32) {
        self.transition = Some(SpeedTransition {
            elapsed: 0.0,
            duration: TARGET_REACHED_TRANSITION,
            from: self.current_speed,
            to: initial_speed,
        });
    }

    fn update_initial_speed(&mut self, initial_speed: f32, min_speed: f32) {
        self.current_speed = initial_speed.max(min_speed);
    }

    fn current_speed(&self) -> f32 {
        self.current_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::contracts::{GroupMember, MotorConfig, UpperBodyState};

    const DT: f32 = 1.0 / 60.0;

    fn context(goal: Vec3) -> MotorContext {
        MotorContext {
            goal_position: goal,
            upper_body: UpperBodyState::Walk,
            config: MotorConfig::default(),
        }
    }

    fn heading(direction: Vec3) -> DecisionOutput {
        DecisionOutput {
            desired_direction: direction,
            ..Default::default()
        }
    }

    #[test]
    fn test_pass_through_before_initialize() {
        let mut motor = DefaultMotorLayer::new();
        let frame = AgentFrame::new(Vec3::new(1.0, 0.0, 1.0), Vec3::Z, 0.4);
        let output = motor.tick(
            &heading(Vec3::X),
            &frame,
            &context(Vec3::new(20.0, 0.0, 0.0)),
            &GroupContext::none(),
            DT,
        );
        assert_eq!(output, MotorOutput::pass_through(&frame));
    }

    #[test]
    fn test_moves_along_decided_direction() {
        let mut motor = DefaultMotorLayer::new();
        motor.initialize(0.7);
        let frame = AgentFrame::new(Vec3::ZERO, Vec3::Z, 0.7);
        let output = motor.tick(
            &heading(Vec3::X),
            &frame,
            &context(Vec3::new(20.0, 0.0, 0.0)),
            &GroupContext::none(),
            0.5,
        );
        assert!((output.next_position - Vec3::new(0.35, 0.0, 0.0)).length() < 1e-6);
        assert_eq!(output.next_direction, Vec3::X);
        assert!(!output.is_in_slowing_area);
    }

    #[test]
    fn test_distracted_walks_at_min_speed() {
        let mut motor = DefaultMotorLayer::new();
        motor.initialize(0.7);
        let mut ctx = context(Vec3::new(20.0, 0.0, 0.0));
        ctx.upper_body = UpperBodyState::SmartPhone;
        ctx.config = ctx.config.with_speed_range(0.2, 1.0);
        let frame = AgentFrame::new(Vec3::ZERO, Vec3::X, 0.7);

        motor.tick(&heading(Vec3::X), &frame, &ctx, &GroupContext::none(), DT);
        assert_eq!(motor.current_speed(), 0.2);

        // Back to walking restores the cruising speed on the next update
        ctx.upper_body = UpperBodyState::Walk;
        for _ in 0..7 {
            motor.tick(&heading(Vec3::X), &frame, &ctx, &GroupContext::none(), DT);
        }
        assert!((motor.current_speed() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_slows_inside_radius() {
        let mut motor = DefaultMotorLayer::new();
        motor.initialize(0.7);
        let frame = AgentFrame::new(Vec3::new(9.0, 0.0, 0.0), Vec3::X, 0.7);
        let output = motor.tick(
            &heading(Vec3::X),
            &frame,
            &context(Vec3::new(10.0, 0.0, 0.0)),
            &GroupContext::none(),
            DT,
        );
        // lerp(0, 1, 1/3)
        assert!((output.speed - 1.0 / 3.0).abs() < 1e-6);
        assert!(output.is_in_slowing_area);
    }

    #[test]
    fn test_target_reached_transition() {
        let mut motor = DefaultMotorLayer::new();
        motor.initialize(0.7);
        motor.update_initial_speed(0.1, 0.0);
        motor.on_target_reached(0.7);
        assert!(motor.is_transitioning());

        let frame = AgentFrame::new(Vec3::new(9.5, 0.0, 0.0), Vec3::X, 0.1);
        let ctx = context(Vec3::new(10.0, 0.0, 0.0));
        let output = motor.tick(&heading(Vec3::X), &frame, &ctx, &GroupContext::none(), 0.25);
        // Slowing is suspended while transitioning
        assert!((output.speed - 0.4).abs() < 1e-5);

        let output = motor.tick(&heading(Vec3::X), &frame, &ctx, &GroupContext::none(), 0.25);
        assert!((output.speed - 0.7).abs() < 1e-6);
        assert!(!motor.is_transitioning());
    }

    #[test]
    fn test_group_speed_baseline_then_catch_up() {
        let mut motor = DefaultMotorLayer::new();
        motor.initialize(0.7);
        let members = [GroupMember {
            position: Vec3::new(0.5, 0.0, 0.0),
            direction: Vec3::X,
            speed: 1.0,
        }];
        let mut group = GroupContext {
            is_in_group: true,
            is_collider_active: true,
            name: Some("pair"),
            members: &members,
            frame: AgentFrame::default(),
            center_of_mass: Vec3::new(0.5, 0.0, 0.0),
        };
        let frame = AgentFrame::new(Vec3::ZERO, Vec3::X, 0.7);
        let ctx = context(Vec3::new(50.0, 0.0, 0.0));

        // First update only caches the baseline: 1.0 - 0.1 * 2
        motor.tick(&heading(Vec3::X), &frame, &ctx, &group, 0.1);
        assert!((motor.current_speed() - 0.7).abs() < 1e-6);

        motor.tick(&heading(Vec3::X), &frame, &ctx, &group, 0.1);
        assert!((motor.current_speed() - 0.8).abs() < 1e-6);

        // Centre of mass far ahead: speed up toward max
        group.center_of_mass = Vec3::new(3.0, 0.0, 0.0);
        motor.tick(&heading(Vec3::X), &frame, &ctx, &group, 0.1);
        assert!((motor.current_speed() - 0.85).abs() < 1e-5);
    }
}
