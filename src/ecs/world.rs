//! World wrapper around hecs

use hecs::Entity;

use super::components::{Activity, Agent, Goal, Kinematics, Name, Steering};
use crate::ai::AgentId;

/// Everything an agent entity is spawned with
pub struct AgentBundle {
    pub agent: Agent,
    pub kinematics: Kinematics,
    pub steering: Steering,
    pub goal: Goal,
    pub activity: Activity,
    pub name: Option<Name>,
}

/// Crowd world containing all agent entities
pub struct World {
    /// The underlying hecs world
    pub inner: hecs::World,
}

impl World {
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
        }
    }

    /// Spawn an agent entity
    pub fn spawn_agent(&mut self, bundle: AgentBundle) -> Entity {
        let AgentBundle {
            agent,
            kinematics,
            steering,
            goal,
            activity,
            name,
        } = bundle;
        match name {
            Some(name) => self
                .inner
                .spawn((agent, kinematics, steering, goal, activity, name)),
            None => self.inner.spawn((agent, kinematics, steering, goal, activity)),
        }
    }

    pub fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        self.inner.despawn(entity)
    }

    /// Get a reference to a component
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Get a mutable reference to a component
    pub fn get_mut<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<hecs::RefMut<'_, T>, hecs::ComponentError> {
        self.inner.get::<&mut T>(entity)
    }

    /// Agent entities sorted by agent id
    pub fn agents_by_id(&self) -> Vec<(AgentId, Entity)> {
        let mut agents: Vec<(AgentId, Entity)> = self
            .inner
            .query::<&Agent>()
            .iter()
            .map(|(entity, agent)| (agent.id, entity))
            .collect();
        agents.sort_unstable_by_key(|(id, _)| *id);
        agents
    }

    /// Entity of the agent with `id`
    pub fn find_agent(&self, id: AgentId) -> Option<Entity> {
        self.inner
            .query::<&Agent>()
            .iter()
            .find(|(_, agent)| agent.id == id)
            .map(|(entity, _)| entity)
    }

    pub fn agent_count(&self) -> usize {
        self.inner.query::<&Agent>().iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Query for entities with specific components
    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<'_, Q> {
        self.inner.query::<Q>()
    }

    /// Query for entities with specific components (mutable)
    pub fn query_mut<Q: hecs::Query>(&mut self) -> hecs::QueryMut<'_, Q> {
        self.inner.query_mut::<Q>()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
