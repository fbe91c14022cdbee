use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::partitions::{Group, GroupId, UserPartition, UserPartitionId};

use super::{TrackFunction, User, UserId, UserPartitionScheme, DEFAULT_SCHEME_NAME};

pub const ASSIGNED_USER_TO_PARTITION_EVENT: &str = "partitions.assigned_user_to_partition";

/// Where the random scheme remembers which group each user was put in.
pub trait AssignmentStore: Send + Sync {
    fn get_group_id(
        &self,
        course_id: &str,
        user_id: UserId,
        partition_id: UserPartitionId,
    ) -> Option<GroupId>;

    fn set_group_id(
        &self,
        course_id: &str,
        user_id: UserId,
        partition_id: UserPartitionId,
        group_id: GroupId,
    );

    /// Returns the stored group if `is_valid` accepts it, otherwise stores
    /// and returns the group picked by `choose`. Lookup and store happen as
    /// one step, so concurrent callers for the same key all see one group.
    /// The flag is true when `choose` was used.
    fn get_or_assign(
        &self,
        course_id: &str,
        user_id: UserId,
        partition_id: UserPartitionId,
        is_valid: &dyn Fn(GroupId) -> bool,
        choose: &mut dyn FnMut() -> GroupId,
    ) -> (GroupId, bool);
}

#[derive(Debug, Default)]
pub struct InMemoryAssignmentStore {
    assignments: DashMap<(String, UserId, UserPartitionId), GroupId>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl AssignmentStore for InMemoryAssignmentStore {
    fn get_group_id(
        &self,
        course_id: &str,
        user_id: UserId,
        partition_id: UserPartitionId,
    ) -> Option<GroupId> {
        self.assignments
            .get(&(course_id.to_string(), user_id, partition_id))
            .map(|entry| *entry.value())
    }

    fn set_group_id(
        &self,
        course_id: &str,
        user_id: UserId,
        partition_id: UserPartitionId,
        group_id: GroupId,
    ) {
        self.assignments
            .insert((course_id.to_string(), user_id, partition_id), group_id);
    }

    fn get_or_assign(
        &self,
        course_id: &str,
        user_id: UserId,
        partition_id: UserPartitionId,
        is_valid: &dyn Fn(GroupId) -> bool,
        choose: &mut dyn FnMut() -> GroupId,
    ) -> (GroupId, bool) {
        // The entry holds the shard lock until it is dropped.
        match self
            .assignments
            .entry((course_id.to_string(), user_id, partition_id))
        {
            Entry::Occupied(entry) if is_valid(*entry.get()) => (*entry.get(), false),
            Entry::Occupied(mut entry) => {
                let group_id = choose();
                warn!(
                    stale_group_id = *entry.get(),
                    group_id, "stored group no longer exists, reassigning"
                );
                entry.insert(group_id);
                (group_id, true)
            }
            Entry::Vacant(entry) => {
                let group_id = choose();
                entry.insert(group_id);
                (group_id, true)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct AssignmentEvent<'a> {
    partition_id: UserPartitionId,
    partition_name: &'a str,
    group_id: GroupId,
    group_name: &'a str,
}

/// Puts each user in a uniformly random group the first time they are seen
/// and keeps them there afterwards.
pub struct RandomScheme {
    store: Arc<dyn AssignmentStore>,
}

impl RandomScheme {
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        RandomScheme { store }
    }

    fn track_assignment(
        &self,
        track_function: Option<&TrackFunction>,
        user_partition: &UserPartition,
        group: &Group,
    ) {
        let Some(track) = track_function else {
            return;
        };
        let event = AssignmentEvent {
            partition_id: user_partition.id,
            partition_name: &user_partition.name,
            group_id: group.id,
            group_name: &group.name,
        };
        match serde_json::to_value(&event) {
            Ok(properties) => track(ASSIGNED_USER_TO_PARTITION_EVENT, &properties),
            Err(e) => warn!("failed to serialize assignment event: {}", e),
        }
    }
}

impl UserPartitionScheme for RandomScheme {
    fn name(&self) -> &str {
        DEFAULT_SCHEME_NAME
    }

    #[instrument(skip_all, fields(course_id = %course_id, user_id = user.id, partition_id = user_partition.id))]
    fn get_group_for_user(
        &self,
        course_id: &str,
        user: &User,
        user_partition: &UserPartition,
        track_function: Option<&TrackFunction>,
    ) -> Option<Group> {
        let groups = &user_partition.groups;
        if groups.is_empty() {
            return None;
        }

        let (group_id, assigned) = self.store.get_or_assign(
            course_id,
            user.id,
            user_partition.id,
            &|group_id| groups.iter().any(|group| group.id == group_id),
            &mut || groups[rand::thread_rng().gen_range(0..groups.len())].id,
        );
        let group = user_partition.get_group(group_id).ok()?.clone();

        if assigned {
            info!(group_id = group.id, "assigned user to partition group");
            self.track_assignment(track_function, user_partition, &group);
        }

        Some(group)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Barrier, Mutex};
    use std::thread;

    use serde_json::{json, Value};

    use super::*;
    use crate::test_utils::mock_groups;

    const COURSE_ID: &str = "course-v1:edX+DemoX+Demo_Course";

    fn partition_with(scheme: Arc<RandomScheme>, groups: Vec<Group>) -> UserPartition {
        UserPartition::new(0, "Experiment", "A/B test", groups, scheme).unwrap()
    }

    #[test]
    fn test_assignment_is_sticky() {
        let store = Arc::new(InMemoryAssignmentStore::new());
        let scheme = Arc::new(RandomScheme::new(store.clone()));
        let partition = partition_with(scheme.clone(), mock_groups());
        let user = User::new(42, "grendel");

        let first = scheme
            .get_group_for_user(COURSE_ID, &user, &partition, None)
            .unwrap();
        assert!(mock_groups().contains(&first));
        for _ in 0..20 {
            let again = scheme
                .get_group_for_user(COURSE_ID, &user, &partition, None)
                .unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_group_id(COURSE_ID, 42, 0), Some(first.id));
    }

    #[test]
    fn test_assignment_is_tracked_once() {
        let events: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();
        let track: Box<TrackFunction> = Box::new(move |name: &str, properties: &Value| {
            recorded
                .lock()
                .unwrap()
                .push((name.to_string(), properties.clone()));
        });

        let scheme = Arc::new(RandomScheme::new(Arc::new(InMemoryAssignmentStore::new())));
        let partition = partition_with(scheme.clone(), mock_groups());
        let user = User::new(7, "beowulf");

        let group = scheme
            .get_group_for_user(COURSE_ID, &user, &partition, Some(track.as_ref()))
            .unwrap();
        scheme.get_group_for_user(COURSE_ID, &user, &partition, Some(track.as_ref()));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, ASSIGNED_USER_TO_PARTITION_EVENT);
        assert_eq!(
            events[0].1,
            json!({
                "partition_id": 0,
                "partition_name": "Experiment",
                "group_id": group.id,
                "group_name": group.name,
            })
        );
    }

    #[test]
    fn test_removed_group_is_reassigned() {
        let store = Arc::new(InMemoryAssignmentStore::new());
        store.set_group_id(COURSE_ID, 1, 0, 99);
        let scheme = Arc::new(RandomScheme::new(store.clone()));
        let partition = partition_with(scheme.clone(), mock_groups());

        let group = scheme
            .get_group_for_user(COURSE_ID, &User::new(1, "hrothgar"), &partition, None)
            .unwrap();
        assert_ne!(group.id, 99);
        assert_eq!(store.get_group_id(COURSE_ID, 1, 0), Some(group.id));
    }

    #[test]
    fn test_empty_partition_has_no_group() {
        let store = Arc::new(InMemoryAssignmentStore::new());
        let scheme = Arc::new(RandomScheme::new(store.clone()));
        let partition = partition_with(scheme.clone(), Vec::new());

        assert!(scheme
            .get_group_for_user(COURSE_ID, &User::new(1, "hrothgar"), &partition, None)
            .is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_first_requests_agree() {
        let groups: Vec<Group> = (0..10i64)
            .map(|id| Group::new(id, format!("Group {id}")).unwrap())
            .collect();

        for round in 0..50 {
            let store = Arc::new(InMemoryAssignmentStore::new());
            let scheme = Arc::new(RandomScheme::new(store.clone()));
            let partition = Arc::new(partition_with(scheme.clone(), groups.clone()));
            let tracked = Arc::new(Mutex::new(0usize));
            let barrier = Arc::new(Barrier::new(8));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let scheme = scheme.clone();
                    let partition = partition.clone();
                    let tracked = tracked.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        let track: Box<TrackFunction> =
                            Box::new(move |_name: &str, _properties: &Value| {
                                *tracked.lock().unwrap() += 1;
                            });
                        barrier.wait();
                        scheme
                            .get_group_for_user(
                                COURSE_ID,
                                &User::new(1, "hrothgar"),
                                &partition,
                                Some(track.as_ref()),
                            )
                            .unwrap()
                            .id
                    })
                })
                .collect();
            let returned: Vec<GroupId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            let stored = store.get_group_id(COURSE_ID, 1, 0).unwrap();
            assert!(
                returned.iter().all(|id| *id == stored),
                "round {round}: returned {returned:?}, stored {stored}"
            );
            assert_eq!(*tracked.lock().unwrap(), 1, "round {round}");
        }
    }

    #[test]
    fn test_get_or_assign_keeps_valid_group() {
        let store = InMemoryAssignmentStore::new();
        let (first, assigned) = store.get_or_assign(COURSE_ID, 1, 0, &|_| true, &mut || 3);
        assert_eq!((first, assigned), (3, true));

        let (again, assigned) = store.get_or_assign(COURSE_ID, 1, 0, &|_| true, &mut || 4);
        assert_eq!((again, assigned), (3, false));

        let (replaced, assigned) =
            store.get_or_assign(COURSE_ID, 1, 0, &|id| id != 3, &mut || 4);
        assert_eq!((replaced, assigned), (4, true));
        assert_eq!(store.get_group_id(COURSE_ID, 1, 0), Some(4));
    }

    #[test]
    fn test_assignments_are_per_course() {
        let store = InMemoryAssignmentStore::new();
        store.set_group_id("course-a", 1, 0, 0);
        store.set_group_id("course-b", 1, 0, 1);
        assert_eq!(store.get_group_id("course-a", 1, 0), Some(0));
        assert_eq!(store.get_group_id("course-b", 1, 0), Some(1));
        assert_eq!(store.get_group_id("course-c", 1, 0), None);
    }
}
