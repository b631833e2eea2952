//! Goal sequencing over a waypoint graph
//!
//! Agents wander the graph node by node. When an agent gets within the goal
//! radius of its current node it picks a random neighbour other than the node
//! it came from. Runs are reproducible because every follower owns a seeded
//! RNG.

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::math::horizontal;

/// Default distance at which a waypoint counts as reached
pub const DEFAULT_GOAL_RADIUS: f32 = 2.0;

/// One node of the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Vec3,
    #[serde(default)]
    pub neighbors: Vec<usize>,
}

/// Undirected graph of walkable waypoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointGraph {
    nodes: Vec<Waypoint>,
}

impl WaypointGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its index
    pub fn add_node(&mut self, position: Vec3) -> usize {
        self.nodes.push(Waypoint {
            position,
            neighbors: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Link two nodes both ways. Out-of-range indices are ignored.
    pub fn connect(&mut self, a: usize, b: usize) {
        if a == b || a >= self.nodes.len() || b >= self.nodes.len() {
            return;
        }
        if !self.nodes[a].neighbors.contains(&b) {
            self.nodes[a].neighbors.push(b);
        }
        if !self.nodes[b].neighbors.contains(&a) {
            self.nodes[b].neighbors.push(a);
        }
    }

    pub fn node(&self, index: usize) -> Option<&Waypoint> {
        self.nodes.get(index)
    }

    pub fn position(&self, index: usize) -> Option<Vec3> {
        self.nodes.get(index).map(|node| node.position)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether every neighbour index points at an existing node
    pub fn is_consistent(&self) -> bool {
        self.nodes
            .iter()
            .all(|node| node.neighbors.iter().all(|&n| n < self.nodes.len()))
    }
}

/// Per-agent progress along the graph
#[derive(Debug, Clone)]
pub struct RouteFollower {
    current: usize,
    previous: Option<usize>,
    goal_radius: f32,
    rng: StdRng,
}

impl RouteFollower {
    /// Start heading for `start`
    #[must_use]
    pub fn new(start: usize, seed: u64) -> Self {
        Self {
            current: start,
            previous: None,
            goal_radius: DEFAULT_GOAL_RADIUS,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn with_goal_radius(mut self, goal_radius: f32) -> Self {
        self.goal_radius = goal_radius;
        self
    }

    pub fn current_node(&self) -> usize {
        self.current
    }

    pub fn previous_node(&self) -> Option<usize> {
        self.previous
    }

    pub fn goal_radius(&self) -> f32 {
        self.goal_radius
    }

    /// Position of the node currently targeted
    pub fn goal(&self, graph: &WaypointGraph) -> Option<Vec3> {
        graph.position(self.current)
    }

    /// Advance when `position` is inside the goal radius.
    ///
    /// Returns the newly targeted node when the current one was reached.
    pub fn update(&mut self, graph: &WaypointGraph, position: Vec3) -> Option<usize> {
        let Some(node) = graph.node(self.current) else {
            log::warn!("route target {} is not in the graph", self.current);
            return None;
        };

        let distance = horizontal(node.position - position).length();
        if distance > self.goal_radius {
            return None;
        }

        let mut candidates: Vec<usize> = node
            .neighbors
            .iter()
            .copied()
            .filter(|&n| Some(n) != self.previous)
            .collect();
        if candidates.is_empty() {
            // Dead end: turn back
            candidates.extend(node.neighbors.iter().copied());
        }

        let &next = candidates.choose(&mut self.rng)?;
        log::debug!("waypoint {} reached, heading for {}", self.current, next);
        self.previous = Some(self.current);
        self.current = next;
        Some(next)
    }
}
