use std::sync::{Arc, Mutex};

use rand::{distributions::Alphanumeric, Rng};

use crate::partitions::{Group, UserPartition, UserPartitionId};
use crate::schemes::{
    InMemoryAssignmentStore, RandomScheme, SchemeRegistry, TrackFunction, User, UserId,
    UserPartitionScheme,
};

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// One `get_group_for_user` call seen by a `MockScheme`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeCall {
    pub course_id: String,
    pub user_id: UserId,
    pub partition_id: UserPartitionId,
    pub had_track_function: bool,
}

/// Scheme that hands back whatever group it was last told to, and records
/// how it was called.
#[derive(Debug, Default)]
pub struct MockScheme {
    name: String,
    current_group: Mutex<Option<Group>>,
    calls: Mutex<Vec<SchemeCall>>,
}

impl MockScheme {
    pub fn new(name: impl Into<String>) -> Self {
        MockScheme {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_current_group(&self, group: Option<Group>) {
        *self.current_group.lock().expect("mock scheme lock poisoned") = group;
    }

    pub fn calls(&self) -> Vec<SchemeCall> {
        self.calls.lock().expect("mock scheme lock poisoned").clone()
    }
}

impl UserPartitionScheme for MockScheme {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_group_for_user(
        &self,
        course_id: &str,
        user: &User,
        user_partition: &UserPartition,
        track_function: Option<&TrackFunction>,
    ) -> Option<Group> {
        self.calls
            .lock()
            .expect("mock scheme lock poisoned")
            .push(SchemeCall {
                course_id: course_id.to_string(),
                user_id: user.id,
                partition_id: user_partition.id,
                had_track_function: track_function.is_some(),
            });
        self.current_group
            .lock()
            .expect("mock scheme lock poisoned")
            .clone()
    }
}

pub fn mock_groups() -> Vec<Group> {
    vec![
        Group::new(0, "Group 1").expect("valid group"),
        Group::new(1, "Group 2").expect("valid group"),
    ]
}

/// Registry with a real `random` scheme and a `mock` one, isolated from any
/// process-wide registry.
pub fn mock_registry() -> SchemeRegistry {
    let mut registry = SchemeRegistry::new();
    registry.register(Arc::new(RandomScheme::new(Arc::new(
        InMemoryAssignmentStore::new(),
    ))));
    registry.register(Arc::new(MockScheme::new("mock")));
    registry
}
