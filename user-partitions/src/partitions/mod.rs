pub mod group;
pub mod user_partition;

pub use group::Group;
pub use user_partition::{user_partitions_from_json, user_partitions_to_json, UserPartition};

use serde_json::{Map, Value};

use crate::errors::{FormatError, PartitionError};

pub type GroupId = i64;
pub type UserPartitionId = i64;

/// Normalizes the id forms found in course configuration into an integer.
/// Integers pass through; numeric strings are parsed after trimming
/// whitespace. Anything else is rejected with `PartitionError::InvalidId`.
pub trait IntoId {
    fn into_id(self) -> Result<i64, PartitionError>;
}

impl IntoId for i64 {
    fn into_id(self) -> Result<i64, PartitionError> {
        Ok(self)
    }
}

impl IntoId for i32 {
    fn into_id(self) -> Result<i64, PartitionError> {
        Ok(i64::from(self))
    }
}

impl IntoId for u32 {
    fn into_id(self) -> Result<i64, PartitionError> {
        Ok(i64::from(self))
    }
}

impl IntoId for &str {
    fn into_id(self) -> Result<i64, PartitionError> {
        self.trim()
            .parse::<i64>()
            .map_err(|_| PartitionError::InvalidId(format!("{self:?}")))
    }
}

impl IntoId for String {
    fn into_id(self) -> Result<i64, PartitionError> {
        self.as_str().into_id()
    }
}

impl IntoId for &String {
    fn into_id(self) -> Result<i64, PartitionError> {
        self.as_str().into_id()
    }
}

impl IntoId for &Value {
    fn into_id(self) -> Result<i64, PartitionError> {
        match self {
            Value::Number(number) => number
                .as_i64()
                .ok_or_else(|| PartitionError::InvalidId(number.to_string())),
            Value::String(s) => s.as_str().into_id(),
            other => Err(PartitionError::InvalidId(other.to_string())),
        }
    }
}

/// Read-only view over one serialized entity, producing format errors that
/// carry the entity name and the offending data.
pub(crate) struct SerializedObject<'a> {
    entity: &'static str,
    value: &'a Value,
    map: &'a Map<String, Value>,
}

impl<'a> SerializedObject<'a> {
    pub(crate) fn new(entity: &'static str, value: &'a Value) -> Result<Self, FormatError> {
        match value.as_object() {
            Some(map) => Ok(SerializedObject { entity, value, map }),
            None => Err(FormatError::NotAnObject {
                entity,
                data: value.to_string(),
            }),
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub(crate) fn required(&self, key: &'static str) -> Result<&'a Value, FormatError> {
        self.map.get(key).ok_or_else(|| FormatError::MissingKey {
            entity: self.entity,
            data: self.value.to_string(),
            key,
        })
    }

    pub(crate) fn required_str(&self, key: &'static str) -> Result<&'a str, FormatError> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| self.invalid_value(key))
    }

    pub(crate) fn required_array(&self, key: &'static str) -> Result<&'a Vec<Value>, FormatError> {
        self.required(key)?
            .as_array()
            .ok_or_else(|| self.invalid_value(key))
    }

    pub(crate) fn invalid_value(&self, key: &'static str) -> FormatError {
        FormatError::InvalidValue {
            entity: self.entity,
            data: self.value.to_string(),
            key,
        }
    }

    pub(crate) fn unexpected_version(&self) -> FormatError {
        let version = match self.map.get("version") {
            Some(version) => version.to_string(),
            None => "None".to_string(),
        };
        FormatError::UnexpectedVersion {
            entity: self.entity,
            data: self.value.to_string(),
            version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!(10), 10 ; "integer")]
    #[test_case(json!("10"), 10 ; "numeric string")]
    #[test_case(json!(" 70 "), 70 ; "padded string")]
    #[test_case(json!(-3), -3 ; "negative")]
    fn test_value_ids_normalize(raw: Value, expected: i64) {
        assert_eq!((&raw).into_id().unwrap(), expected);
    }

    #[test_case(json!("ten") ; "word")]
    #[test_case(json!(1.5) ; "float")]
    #[test_case(json!(null) ; "null")]
    #[test_case(json!([1]) ; "array")]
    fn test_value_ids_reject(raw: Value) {
        let err = (&raw).into_id().unwrap_err();
        assert!(matches!(err, PartitionError::InvalidId(_)));
    }

    #[test]
    fn test_string_and_integer_ids_agree() {
        assert_eq!("10".into_id().unwrap(), 10i64.into_id().unwrap());
        assert_eq!("70".to_string().into_id().unwrap(), 70i32.into_id().unwrap());
    }

    #[test]
    fn test_serialized_object_rejects_non_objects() {
        let value = json!([1, 2]);
        match SerializedObject::new("Group", &value) {
            Err(FormatError::NotAnObject { entity, .. }) => assert_eq!(entity, "Group"),
            _ => panic!("Expected NotAnObject"),
        }
    }
}
