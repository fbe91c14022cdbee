use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::errors::PartitionError;

use super::{GroupId, IntoId, SerializedObject};

/// One bucket within a user partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl Group {
    pub const VERSION: u64 = 1;
    const ENTITY: &'static str = "Group";

    pub fn new(id: impl IntoId, name: impl Into<String>) -> Result<Self, PartitionError> {
        Ok(Group {
            id: id.into_id()?,
            name: name.into(),
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "version": Self::VERSION,
        })
    }

    /// Deserializes a group. A missing `version` is accepted; any other
    /// version is rejected. Keys other than `id`, `name` and `version` are
    /// dropped.
    pub fn from_json(value: &Value) -> Result<Self, PartitionError> {
        let data = SerializedObject::new(Self::ENTITY, value)?;

        if let Some(version) = data.get("version") {
            if version.as_u64() != Some(Self::VERSION) {
                return Err(data.unexpected_version().into());
            }
        }

        let id = data.required("id")?;
        let name = data.required_str("name")?;

        Group::new(id, name)
    }
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
