//! Steering event queue
//!
//! Double-buffered queue of notable things the simulation noticed during a
//! step. Events pushed while step N runs become readable once step N has
//! returned (the queue swaps at the end of the step), so consumers never see
//! a half-finished step.
//!
//! # Example
//!
//! ```ignore
//! sim.step();
//! for event in sim.events().iter() {
//!     if let SteeringEvent::MutualAvoidance { agent, other } = event {
//!         println!("{agent:?} and {other:?} dodged the same way");
//!     }
//! }
//! ```

use std::collections::VecDeque;

use glam::Vec3;

use crate::ai::AgentId;

/// Something that happened to an agent or group during a step.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SteeringEvent {
    /// Two agents dodged toward the same side and one mirrored its escape.
    ///
    /// Raised once when an agent starts mirroring against `other`, not on
    /// every step the situation lasts. A new event follows only after the
    /// partner changes.
    MutualAvoidance {
        /// Agent that detected the situation
        agent: AgentId,
        /// The agent it was avoiding
        other: AgentId,
    },

    /// An agent reached its current waypoint and picked the next one.
    TargetReached {
        agent: AgentId,
        /// Index of the waypoint now targeted
        next_waypoint: usize,
        position: Vec3,
    },

    /// A group's proximity collider switched on or off.
    GroupColliderChanged {
        group: String,
        active: bool,
    },
}

/// Double-buffered event queue for step-consistent event processing.
///
/// - Push: O(1) amortized
/// - Iteration: O(n)
/// - Swap: O(1)
#[derive(Debug)]
pub struct EventQueue {
    /// Events being written this step
    pending: VecDeque<SteeringEvent>,
    /// Events from the previous step, ready for processing
    processing: VecDeque<SteeringEvent>,
}

impl EventQueue {
    const DEFAULT_CAPACITY: usize = 64;

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a queue with room for `capacity` events per step
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity),
            processing: VecDeque::with_capacity(capacity),
        }
    }

    /// Push an event; visible after the next `swap()`.
    #[inline]
    pub fn push(&mut self, event: SteeringEvent) {
        self.pending.push_back(event);
    }

    /// Make this step's events readable and start a fresh pending buffer.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.processing);
        self.pending.clear();
    }

    /// Events from the previous step
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &SteeringEvent> {
        self.processing.iter()
    }

    /// Take ownership of the previous step's events
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = SteeringEvent> + '_ {
        self.processing.drain(..)
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.processing.len()
    }

    /// Events written during the current step
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop everything, both buffers
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
