use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::PartitionError;
use crate::schemes::{SchemeRegistry, UserPartitionScheme};

use super::{Group, GroupId, IntoId, SerializedObject, UserPartitionId};

/// Serialized format versions a user partition can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SerializedVersion {
    /// Written before schemes existed, carries no `scheme` key.
    Legacy,
    Current,
}

impl SerializedVersion {
    fn parse(version: Option<&Value>) -> Option<Self> {
        match version.and_then(Value::as_u64) {
            Some(UserPartition::LEGACY_VERSION) => Some(SerializedVersion::Legacy),
            Some(UserPartition::VERSION) => Some(SerializedVersion::Current),
            _ => None,
        }
    }
}

/// A named set of groups for a course, bound to the scheme that decides
/// which group a user falls into. Group order is preserved; schemes may treat
/// the first group as a default.
#[derive(Clone)]
pub struct UserPartition {
    pub id: UserPartitionId,
    pub name: String,
    pub description: String,
    pub groups: Vec<Group>,
    pub scheme: Arc<dyn UserPartitionScheme>,
}

impl UserPartition {
    pub const VERSION: u64 = 2;
    pub const LEGACY_VERSION: u64 = 1;
    const ENTITY: &'static str = "UserPartition";

    pub fn new(
        id: impl IntoId,
        name: impl Into<String>,
        description: impl Into<String>,
        groups: Vec<Group>,
        scheme: Arc<dyn UserPartitionScheme>,
    ) -> Result<Self, PartitionError> {
        Ok(UserPartition {
            id: id.into_id()?,
            name: name.into(),
            description: description.into(),
            groups,
            scheme,
        })
    }

    /// Builds a partition bound to the registry's default scheme, for callers
    /// that don't care how users are assigned.
    pub fn with_default_scheme(
        id: impl IntoId,
        name: impl Into<String>,
        description: impl Into<String>,
        groups: Vec<Group>,
        registry: &SchemeRegistry,
    ) -> Result<Self, PartitionError> {
        let scheme = registry.default_scheme()?;
        Self::new(id, name, description, groups, scheme)
    }

    pub fn scheme_name(&self) -> &str {
        self.scheme.name()
    }

    pub fn get_group(&self, group_id: GroupId) -> Result<&Group, PartitionError> {
        self.groups
            .iter()
            .find(|group| group.id == group_id)
            .ok_or(PartitionError::NoSuchGroup {
                partition_id: self.id,
                group_id,
            })
    }

    /// Always writes the current version with an explicit scheme name.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "description": self.description,
            "groups": self.groups.iter().map(Group::to_json).collect::<Vec<_>>(),
            "version": Self::VERSION,
            "scheme": self.scheme_name(),
        })
    }

    /// Deserializes a partition, resolving its scheme through `registry`.
    ///
    /// Legacy (version 1) data has no `scheme` key and is bound to the
    /// registry's default scheme. Current data must name its scheme. Either
    /// the whole partition loads or an error is returned; unknown keys are
    /// dropped.
    pub fn from_json(value: &Value, registry: &SchemeRegistry) -> Result<Self, PartitionError> {
        let data = SerializedObject::new(Self::ENTITY, value)?;

        let version = SerializedVersion::parse(data.get("version"))
            .ok_or_else(|| data.unexpected_version())?;

        let id = data.required("id")?;
        let name = data.required_str("name")?;
        let description = data.required_str("description")?;
        let groups = data.required_array("groups")?;

        let scheme_name = match version {
            SerializedVersion::Legacy => registry.default_scheme_name(),
            SerializedVersion::Current => data.required_str("scheme")?,
        };
        let scheme = registry.resolve(scheme_name).inspect_err(|_| {
            warn!(
                scheme = scheme_name,
                partition = %id,
                "user partition bound to unregistered scheme"
            );
        })?;

        let groups = groups
            .iter()
            .map(Group::from_json)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(id, name, description, groups, scheme)
    }
}

impl fmt::Debug for UserPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPartition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("groups", &self.groups)
            .field("scheme", &self.scheme_name())
            .finish()
    }
}

impl PartialEq for UserPartition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.description == other.description
            && self.groups == other.groups
            && self.scheme_name() == other.scheme_name()
    }
}

impl Serialize for UserPartition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Deserializes a course's partition list in order. The first failing entry
/// aborts the whole load.
pub fn user_partitions_from_json(
    values: &[Value],
    registry: &SchemeRegistry,
) -> Result<Vec<UserPartition>, PartitionError> {
    values
        .iter()
        .map(|value| UserPartition::from_json(value, registry))
        .collect()
}

pub fn user_partitions_to_json(partitions: &[UserPartition]) -> Vec<Value> {
    partitions.iter().map(UserPartition::to_json).collect()
}
