use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::course_config::CourseConfigStore;
use crate::errors::PartitionError;
use crate::partitions::{user_partitions_from_json, Group, GroupId, UserPartition, UserPartitionId};
use crate::schemes::{SchemeRegistry, TrackFunction, User};

/// Answers "which group is this user in" for one course's partitions.
///
/// The service never caches or stores assignments and never changes the
/// partitions it holds. Keeping a user in the same group across calls is up
/// to each partition's scheme.
pub struct PartitionService {
    course_id: String,
    user_partitions: Vec<UserPartition>,
    track_function: Option<Arc<TrackFunction>>,
}

impl PartitionService {
    pub fn new(course_id: impl Into<String>, user_partitions: Vec<UserPartition>) -> Self {
        PartitionService {
            course_id: course_id.into(),
            user_partitions,
            track_function: None,
        }
    }

    pub fn with_track_function(mut self, track_function: Arc<TrackFunction>) -> Self {
        self.track_function = Some(track_function);
        self
    }

    /// Loads the course's serialized partitions from `store` and builds a
    /// service over them. Fails if any partition fails to deserialize.
    #[instrument(skip_all, fields(course_id = %course_id))]
    pub fn from_course_config(
        store: &dyn CourseConfigStore,
        registry: &SchemeRegistry,
        course_id: &str,
    ) -> Result<Self, PartitionError> {
        let values = store.get_user_partitions(course_id)?;
        let user_partitions = user_partitions_from_json(&values, registry).inspect_err(|e| {
            warn!(error = %e, "course has invalid user partition configuration");
        })?;
        debug!(count = user_partitions.len(), "loaded user partitions");

        Ok(Self::new(course_id, user_partitions))
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn course_partitions(&self) -> &[UserPartition] {
        &self.user_partitions
    }

    pub fn get_user_partition(
        &self,
        partition_id: UserPartitionId,
    ) -> Result<&UserPartition, PartitionError> {
        self.user_partitions
            .iter()
            .find(|partition| partition.id == partition_id)
            .ok_or(PartitionError::NoSuchUserPartition(partition_id))
    }

    /// Returns the group the partition's scheme puts `user` in, or `None` if
    /// the scheme has no group for them.
    #[instrument(skip_all, fields(course_id = %self.course_id, user_id = user.id, partition_id = partition_id))]
    pub fn get_group(
        &self,
        user: &User,
        partition_id: UserPartitionId,
    ) -> Result<Option<Group>, PartitionError> {
        let user_partition = self.get_user_partition(partition_id).inspect_err(|_| {
            warn!("requested user partition does not exist");
        })?;

        let group = user_partition.scheme.get_group_for_user(
            &self.course_id,
            user,
            user_partition,
            self.track_function.as_deref(),
        );
        debug!(
            scheme = user_partition.scheme_name(),
            group_id = group.as_ref().map(|group| group.id),
            "resolved user group"
        );

        Ok(group)
    }

    pub fn get_user_group_id_for_partition(
        &self,
        user: &User,
        partition_id: UserPartitionId,
    ) -> Result<Option<GroupId>, PartitionError> {
        Ok(self.get_group(user, partition_id)?.map(|group| group.id))
    }
}

impl fmt::Debug for PartitionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionService")
            .field("course_id", &self.course_id)
            .field("user_partitions", &self.user_partitions)
            .field("track_function", &self.track_function.is_some())
            .finish()
    }
}
