use thiserror::Error;

use crate::partitions::{GroupId, UserPartitionId};

/// Malformed or incompatible serialized data. Every variant names either the
/// offending key or the unexpected version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("{entity} dict {data} has unexpected version {version}")]
    UnexpectedVersion {
        entity: &'static str,
        data: String,
        version: String,
    },
    #[error("{entity} dict {data} missing value key '{key}'")]
    MissingKey {
        entity: &'static str,
        data: String,
        key: &'static str,
    },
    #[error("{entity} dict {data} has invalid value for key '{key}'")]
    InvalidValue {
        entity: &'static str,
        data: String,
        key: &'static str,
    },
    #[error("{entity} data {data} is not a JSON object")]
    NotAnObject { entity: &'static str, data: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("Unrecognized scheme '{0}'")]
    UnrecognizedScheme(String),
    #[error("No user partition with id {0}")]
    NoSuchUserPartition(UserPartitionId),
    #[error("No group with id {group_id} in user partition {partition_id}")]
    NoSuchGroup {
        partition_id: UserPartitionId,
        group_id: GroupId,
    },
    #[error("No course configuration for {0}")]
    NoSuchCourse(String),
    #[error("Course configuration could not be read: {0}")]
    CourseConfigUnavailable(String),
    #[error("Id {0} cannot be converted to an integer")]
    InvalidId(String),
}

/// Broad classification callers use to translate errors into request-level
/// failures without matching on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    UserPartition,
    NotFound,
    Validation,
    Unavailable,
}

impl PartitionError {
    /// Returns (error_code, kind) for this error.
    fn error_metadata(&self) -> (&'static str, ErrorKind) {
        match self {
            PartitionError::Format(FormatError::UnexpectedVersion { .. }) => {
                ("unexpected_version", ErrorKind::Format)
            }
            PartitionError::Format(FormatError::MissingKey { .. }) => {
                ("missing_key", ErrorKind::Format)
            }
            PartitionError::Format(FormatError::InvalidValue { .. }) => {
                ("invalid_value", ErrorKind::Format)
            }
            PartitionError::Format(FormatError::NotAnObject { .. }) => {
                ("not_an_object", ErrorKind::Format)
            }
            PartitionError::UnrecognizedScheme(_) => {
                ("unrecognized_scheme", ErrorKind::UserPartition)
            }
            PartitionError::NoSuchUserPartition(_) => {
                ("no_such_user_partition", ErrorKind::NotFound)
            }
            PartitionError::NoSuchGroup { .. } => ("no_such_group", ErrorKind::NotFound),
            PartitionError::NoSuchCourse(_) => ("no_such_course", ErrorKind::NotFound),
            PartitionError::CourseConfigUnavailable(_) => {
                ("course_config_unavailable", ErrorKind::Unavailable)
            }
            PartitionError::InvalidId(_) => ("invalid_id", ErrorKind::Validation),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error_metadata().1
    }

    pub fn error_code(&self) -> &'static str {
        self.error_metadata().0
    }
}
