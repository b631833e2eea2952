//! Step statistics

use std::collections::VecDeque;
use std::time::Duration;

/// What one simulation step did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepSample {
    /// Wall-clock cost of the step
    pub duration: Duration,
    /// Agents advanced
    pub agents: usize,
    pub mutual_avoidances: usize,
    pub targets_reached: usize,
    /// Mean motor speed over the advanced agents
    pub mean_speed: f32,
}

/// Rolling statistics over recent steps
#[derive(Debug)]
pub struct StepStats {
    samples: VecDeque<StepSample>,
    max_samples: usize,
    avg_step_time_ms: f32,
    max_step_time_ms: f32,
    avg_speed: f32,
    total_steps: u64,
    total_mutual_avoidances: u64,
    total_targets_reached: u64,
}

impl StepStats {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(120),
            max_samples: 120,
            avg_step_time_ms: 0.0,
            max_step_time_ms: 0.0,
            avg_speed: 0.0,
            total_steps: 0,
            total_mutual_avoidances: 0,
            total_targets_reached: 0,
        }
    }

    /// Record one step
    pub fn record_step(&mut self, sample: StepSample) {
        self.total_steps += 1;
        self.total_mutual_avoidances += sample.mutual_avoidances as u64;
        self.total_targets_reached += sample.targets_reached as u64;

        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);

        self.update_stats();
    }

    fn update_stats(&mut self) {
        if self.samples.is_empty() {
            return;
        }

        let mut total = Duration::ZERO;
        let mut max = Duration::ZERO;
        let mut speed = 0.0;

        for sample in &self.samples {
            total += sample.duration;
            max = max.max(sample.duration);
            speed += sample.mean_speed;
        }

        let count = self.samples.len() as f32;
        self.avg_step_time_ms = total.as_secs_f32() / count * 1000.0;
        self.max_step_time_ms = max.as_secs_f32() * 1000.0;
        self.avg_speed = speed / count;
    }

    /// Average step cost over the window, in milliseconds
    pub fn avg_step_time_ms(&self) -> f32 {
        self.avg_step_time_ms
    }

    pub fn max_step_time_ms(&self) -> f32 {
        self.max_step_time_ms
    }

    /// Mean agent speed over the window
    pub fn avg_speed(&self) -> f32 {
        self.avg_speed
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn total_mutual_avoidances(&self) -> u64 {
        self.total_mutual_avoidances
    }

    pub fn total_targets_reached(&self) -> u64 {
        self.total_targets_reached
    }

    pub fn format_stats(&self) -> String {
        format!(
            "Steps: {} | Step: {:.3}ms (max: {:.3}) | Speed: {:.2} | Mutual: {} | Reached: {}",
            self.total_steps,
            self.avg_step_time_ms,
            self.max_step_time_ms,
            self.avg_speed,
            self.total_mutual_avoidances,
            self.total_targets_reached
        )
    }
}

impl Default for StepStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnostics collected by the simulation
#[derive(Debug, Default)]
pub struct DebugInfo {
    pub step_stats: StepStats,
}

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self, sample: StepSample) {
        self.step_stats.record_step(sample);
    }
}
