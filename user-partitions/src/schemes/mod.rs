pub mod random;
pub mod registry;

pub use random::{AssignmentStore, InMemoryAssignmentStore, RandomScheme};
pub use registry::{global_registry, install_global_registry, SchemeRegistry, DEFAULT_SCHEME_NAME};

use serde_json::Value;

use crate::partitions::{Group, UserPartition};

pub type UserId = i64;

/// Analytics callback forwarded to schemes: `(event_name, event_properties)`.
pub type TrackFunction = dyn Fn(&str, &Value) + Send + Sync;

/// The user a group is being resolved for. Partitions and the partition
/// service pass it through untouched; only schemes look inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        User {
            id,
            username: username.into(),
        }
    }
}

/// Strategy deciding which group of a partition a user belongs to.
///
/// Whether repeated calls for the same user return the same group is up to
/// the implementation; callers never cache the result.
pub trait UserPartitionScheme: Send + Sync {
    /// Identifier written to the `scheme` key of serialized partitions.
    fn name(&self) -> &str;

    /// Returns the user's group, or `None` if the user has no group in this
    /// partition (not eligible, or not assigned yet).
    fn get_group_for_user(
        &self,
        course_id: &str,
        user: &User,
        user_partition: &UserPartition,
        track_function: Option<&TrackFunction>,
    ) -> Option<Group>;
}
