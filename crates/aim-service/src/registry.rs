//! The group-state map and event log, held under one read/write mutex per
//! spec §5 "Shared state": readers take deep-copy snapshots rather than
//! holding the lock across I/O.

use aim_core::errors::Result;
use aim_core::identifiers::GroupId;
use aim_groups::state::GroupState;
use aim_inbound::GroupStateRepository;
use aim_journal::GroupEventLog;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<GroupId, (GroupState, GroupEventLog)>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A deep-copy snapshot of a single group's state, or `None` if it does
    /// not exist. Callers use this instead of holding the registry lock
    /// across a downstream await.
    pub async fn snapshot(&self, group_id: &GroupId) -> Option<GroupState> {
        self.groups.read().await.get(group_id).map(|(state, _)| state.clone())
    }

    pub async fn exists(&self, group_id: &GroupId) -> bool {
        self.groups.read().await.contains_key(group_id)
    }

    pub async fn list_group_ids(&self) -> Vec<GroupId> {
        self.groups.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl GroupStateRepository for GroupRegistry {
    async fn load(&self, group_id: &GroupId) -> Result<Option<(GroupState, GroupEventLog)>> {
        Ok(self.groups.read().await.get(group_id).cloned())
    }

    async fn store(&self, group_id: &GroupId, state: GroupState, log: GroupEventLog) -> Result<()> {
        self.groups.write().await.insert(group_id.clone(), (state, log));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_groups::types::Group;
    use aim_core::identifiers::MemberId;
    use chrono::Utc;

    fn group_state(id: &str) -> GroupState {
        let now = Utc::now();
        GroupState::new(Group {
            id: GroupId::new(id),
            title: "General".into(),
            description: None,
            avatar: None,
            created_by: MemberId::new("owner"),
            created_at: now,
            updated_at: now,
        })
    }

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let registry = GroupRegistry::new();
        registry.store(&GroupId::new("g1"), group_state("g1"), GroupEventLog::new()).await.unwrap();

        let loaded = registry.load(&GroupId::new("g1")).await.unwrap();
        assert!(loaded.is_some());
        assert!(registry.exists(&GroupId::new("g1")).await);
    }

    #[tokio::test]
    async fn snapshot_is_independent_of_later_mutation() {
        let registry = GroupRegistry::new();
        registry.store(&GroupId::new("g1"), group_state("g1"), GroupEventLog::new()).await.unwrap();

        let snapshot = registry.snapshot(&GroupId::new("g1")).await.unwrap();

        let mut mutated = group_state("g1");
        mutated.version = 99;
        registry.store(&GroupId::new("g1"), mutated, GroupEventLog::new()).await.unwrap();

        assert_eq!(snapshot.version, 0);
    }
}
