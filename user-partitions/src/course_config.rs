use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::{error, instrument};

use crate::errors::PartitionError;
use crate::partitions::{user_partitions_to_json, UserPartition};

/// Source and write target of a course's serialized partition list.
pub trait CourseConfigStore: Send + Sync {
    fn get_user_partitions(&self, course_id: &str) -> Result<Vec<Value>, PartitionError>;

    fn set_user_partitions(&self, course_id: &str, values: Vec<Value>)
        -> Result<(), PartitionError>;
}

/// Serializes `partitions` at the current format version and writes them
/// back as the course's partition list.
pub fn save_user_partitions(
    store: &dyn CourseConfigStore,
    course_id: &str,
    partitions: &[UserPartition],
) -> Result<(), PartitionError> {
    store.set_user_partitions(course_id, user_partitions_to_json(partitions))
}

#[derive(Debug, Default)]
pub struct InMemoryCourseConfigStore {
    courses: DashMap<String, Vec<Value>>,
}

impl InMemoryCourseConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, course_id: impl Into<String>, values: Vec<Value>) {
        self.courses.insert(course_id.into(), values);
    }
}

impl CourseConfigStore for InMemoryCourseConfigStore {
    fn get_user_partitions(&self, course_id: &str) -> Result<Vec<Value>, PartitionError> {
        self.courses
            .get(course_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PartitionError::NoSuchCourse(course_id.to_string()))
    }

    fn set_user_partitions(
        &self,
        course_id: &str,
        values: Vec<Value>,
    ) -> Result<(), PartitionError> {
        self.insert(course_id, values);
        Ok(())
    }
}

/// Course configuration kept in one JSON file shaped as
/// `{"<course_id>": [<partition>, ...], ...}`. The file is re-read on every
/// call.
#[derive(Debug, Clone)]
pub struct JsonFileCourseConfigStore {
    path: PathBuf,
}

impl JsonFileCourseConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileCourseConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_courses(&self) -> Result<Map<String, Value>, PartitionError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                error!(path = %self.path.display(), "failed to read course configuration: {}", e);
                return Err(PartitionError::CourseConfigUnavailable(e.to_string()));
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(courses)) => Ok(courses),
            Ok(_) => Err(PartitionError::CourseConfigUnavailable(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => {
                error!(path = %self.path.display(), "failed to parse course configuration: {}", e);
                Err(PartitionError::CourseConfigUnavailable(e.to_string()))
            }
        }
    }
}

impl CourseConfigStore for JsonFileCourseConfigStore {
    #[instrument(skip_all, fields(course_id = %course_id))]
    fn get_user_partitions(&self, course_id: &str) -> Result<Vec<Value>, PartitionError> {
        match self.read_courses()?.remove(course_id) {
            Some(Value::Array(values)) => Ok(values),
            Some(_) => Err(PartitionError::CourseConfigUnavailable(format!(
                "partitions for {course_id} are not a JSON list"
            ))),
            None => Err(PartitionError::NoSuchCourse(course_id.to_string())),
        }
    }

    #[instrument(skip_all, fields(course_id = %course_id))]
    fn set_user_partitions(
        &self,
        course_id: &str,
        values: Vec<Value>,
    ) -> Result<(), PartitionError> {
        let mut courses = self.read_courses()?;
        courses.insert(course_id.to_string(), Value::Array(values));

        let serialized = serde_json::to_string_pretty(&Value::Object(courses))
            .map_err(|e| PartitionError::CourseConfigUnavailable(e.to_string()))?;
        fs::write(&self.path, serialized).map_err(|e| {
            error!(path = %self.path.display(), "failed to write course configuration: {}", e);
            PartitionError::CourseConfigUnavailable(e.to_string())
        })
    }
}
