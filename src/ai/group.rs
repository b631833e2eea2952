//! Group aggregation
//!
//! [`CrowdGroup`] is a per-tick view of a walking group built from its
//! members' handles: the group-averaged frame, the proximity collider state
//! and the union of what the members can see.

use glam::Vec3;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::contracts::{AgentFrame, AgentId};
use super::sources::{AgentHandle, DEFAULT_AGENT_RADIUS, GroupAccessor};

/// Members of a group, stored inline for the usual small groups.
pub type MemberHandles<'a> = SmallVec<[AgentHandle<'a>; 8]>;

/// A named group of agents for one tick
#[derive(Clone)]
pub struct CrowdGroup<'a> {
    name: String,
    members: MemberHandles<'a>,
    frame: Option<AgentFrame>,
    collider_active: bool,
    collider_radius: f32,
    shared_fov: Vec<AgentHandle<'a>>,
}

impl<'a> CrowdGroup<'a> {
    /// Aggregate the members' current state.
    ///
    /// Missing handles are kept in the member list but ignored by the
    /// aggregate.
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = AgentHandle<'a>>) -> Self {
        let members: MemberHandles<'a> = members.into_iter().collect();
        let (frame, collider_active, collider_radius) = aggregate(&members, DEFAULT_AGENT_RADIUS);
        Self {
            name: name.into(),
            members,
            frame,
            collider_active,
            collider_radius,
            shared_fov: Vec::new(),
        }
    }

    /// Merge the members' FOV sets into the shared FOV.
    ///
    /// Members themselves and duplicates are dropped.
    pub fn with_shared_fov<I>(mut self, fov_sets: I) -> Self
    where
        I: IntoIterator<Item = &'a [AgentHandle<'a>]>,
    {
        let mut seen: FxHashSet<AgentId> = self.member_ids().collect();
        self.shared_fov.clear();

        for handle in fov_sets.into_iter().flatten().flatten() {
            if seen.insert(handle.id()) {
                self.shared_fov.push(Some(*handle));
            }
        }
        self
    }

    /// Ids of the members still present
    pub fn member_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.members.iter().flatten().map(|member| member.id())
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.member_ids().any(|member| member == id)
    }

    /// Radius of the proximity collider: the farthest member plus one agent
    /// radius. Only meaningful while the collider is active.
    pub fn collider_radius(&self) -> f32 {
        self.collider_radius
    }
}

impl GroupAccessor for CrowdGroup<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn members(&self) -> &[AgentHandle<'_>] {
        &self.members
    }

    fn group_frame(&self) -> Option<AgentFrame> {
        self.frame
    }

    fn is_collider_active(&self) -> bool {
        self.collider_active
    }

    fn shared_fov(&self) -> &[AgentHandle<'_>] {
        &self.shared_fov
    }
}

/// Group frame, collider state and collider radius.
///
/// The collider switches on once every member lies within `count / 2`
/// (integer division) of the centroid.
fn aggregate(members: &[AgentHandle<'_>], agent_radius: f32) -> (Option<AgentFrame>, bool, f32) {
    let live: SmallVec<[AgentFrame; 8]> = members.iter().flatten().map(|m| m.frame()).collect();
    if live.is_empty() {
        return (None, false, 0.0);
    }

    let count = live.len() as f32;
    let position = live.iter().map(|f| f.position).sum::<Vec3>() / count;
    let direction = live
        .iter()
        .map(|f| f.direction)
        .sum::<Vec3>()
        .normalize_or_zero();
    let speed = live.iter().map(|f| f.speed).sum::<f32>() / count;

    let max_distance = live
        .iter()
        .map(|f| f.position.distance(position))
        .fold(0.0_f32, f32::max);
    let limit = (live.len() / 2) as f32;
    let collider_active = max_distance <= limit;

    (
        Some(AgentFrame::new(position, direction, speed)),
        collider_active,
        max_distance + agent_radius,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::sources::NeighborSnapshot;

    fn walker(id: u32, position: Vec3, direction: Vec3, speed: f32) -> NeighborSnapshot {
        NeighborSnapshot::individual(AgentId(id), AgentFrame::new(position, direction, speed))
            .with_group("friends")
    }

    #[test]
    fn test_group_frame_is_average() {
        let a = walker(1, Vec3::new(0.0, 0.0, 0.0), Vec3::X, 0.6);
        let b = walker(2, Vec3::new(1.0, 0.0, 0.0), Vec3::Z, 1.0);
        let group = CrowdGroup::new("friends", [a.handle(), b.handle(), None]);

        let frame = group.group_frame().unwrap();
        assert!((frame.position - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
        assert!((frame.direction - Vec3::new(1.0, 0.0, 1.0).normalize()).length() < 1e-6);
        assert!((frame.speed - 0.8).abs() < 1e-6);
        assert_eq!(group.members().len(), 3);
    }

    #[test]
    fn test_collider_follows_spread() {
        let a = walker(1, Vec3::ZERO, Vec3::X, 1.0);
        let b = walker(2, Vec3::new(1.8, 0.0, 0.0), Vec3::X, 1.0);
        // 2 members: limit 1, max distance 0.9
        let close = CrowdGroup::new("friends", [a.handle(), b.handle()]);
        assert!(close.is_collider_active());
        assert!((close.collider_radius() - 1.2).abs() < 1e-6);

        let c = walker(2, Vec3::new(3.0, 0.0, 0.0), Vec3::X, 1.0);
        let spread = CrowdGroup::new("friends", [a.handle(), c.handle()]);
        assert!(!spread.is_collider_active());
    }

    #[test]
    fn test_shared_fov_union_without_members() {
        let a = walker(1, Vec3::ZERO, Vec3::X, 1.0);
        let b = walker(2, Vec3::new(0.6, 0.0, 0.0), Vec3::X, 1.0);
        let x = NeighborSnapshot::individual(AgentId(10), AgentFrame::default());
        let y = NeighborSnapshot::individual(AgentId(11), AgentFrame::default());

        let fov_a = [b.handle(), x.handle()];
        let fov_b = [a.handle(), x.handle(), None, y.handle()];
        let group = CrowdGroup::new("friends", [a.handle(), b.handle()])
            .with_shared_fov([&fov_a[..], &fov_b[..]]);

        let ids: Vec<AgentId> = group.shared_fov().iter().flatten().map(|h| h.id()).collect();
        assert_eq!(ids, vec![AgentId(10), AgentId(11)]);
        assert!(group.contains(AgentId(2)));
    }

    #[test]
    fn test_empty_group_has_no_frame() {
        let group = CrowdGroup::new("ghosts", [None, None]);
        assert!(group.group_frame().is_none());
        assert!(!group.is_collider_active());
    }
}
