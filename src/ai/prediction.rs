//! Prediction
//!
//! Linear extrapolation of every visible neighbour to its time of nearest
//! approach. Keeps all non-diverging neighbours and marks the most urgent one.

use super::contracts::{AgentFrame, AttentionOutput, GroupContext, PredictedNeighbor, PredictionOutput};
use super::math::{
    COLLISION_DANGER_THRESHOLD, MIN_TIME_TO_COLLISION, nearest_approach, nearest_approach_time,
};

/// Prediction stage of the steering pipeline.
pub trait PredictionLayer {
    /// Predict this tick's approaches. The output borrows the layer's buffer.
    fn tick<'s>(
        &'s mut self,
        attention: &AttentionOutput<'_>,
        frame: &AgentFrame,
        group: &GroupContext<'_>,
    ) -> PredictionOutput<'s>;
}

/// Constant-velocity prediction.
#[derive(Debug, Default)]
pub struct LinearPredictionLayer {
    neighbors: Vec<PredictedNeighbor>,
}

impl LinearPredictionLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PredictionLayer for LinearPredictionLayer {
    fn tick<'s>(
        &'s mut self,
        attention: &AttentionOutput<'_>,
        frame: &AgentFrame,
        group: &GroupContext<'_>,
    ) -> PredictionOutput<'s> {
        self.neighbors.clear();

        let me = if group.uses_group_frame() {
            group.frame
        } else {
            *frame
        };

        let mut nearest_time = MIN_TIME_TO_COLLISION;
        let mut most_urgent = None;

        for agent in attention.visible_agents {
            let time = nearest_approach_time(&me, &agent.frame);
            if time < 0.0 {
                continue;
            }

            let approach = nearest_approach(time, &me, &agent.frame);
            let predicted = PredictedNeighbor {
                id: agent.id,
                agent: agent.frame,
                tag: agent.tag,
                collider_radius: agent.collider_radius,
                predicted_position: approach.other_position,
                self_position_at_approach: approach.self_position,
                time_to_approach: time,
                distance_at_approach: approach.distance,
            };
            self.neighbors.push(predicted);

            if time < nearest_time && approach.distance < COLLISION_DANGER_THRESHOLD {
                nearest_time = time;
                most_urgent = Some(predicted);
            }
        }

        PredictionOutput {
            neighbors: &self.neighbors,
            time_to_nearest_collision: nearest_time,
            most_urgent,
        }
    }
}
