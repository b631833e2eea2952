//! Entity Component System module
//!
//! Crowd agents stored in a hecs world

mod components;
mod world;

pub use components::{Activity, Agent, Goal, Kinematics, Name, Steering};
pub use world::{AgentBundle, World};
