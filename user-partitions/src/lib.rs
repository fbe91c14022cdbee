use std::sync::Arc;

use crate::config::Config;
use crate::errors::PartitionError;
use crate::schemes::{AssignmentStore, RandomScheme, SchemeRegistry};

pub mod config;
pub mod course_config;
pub mod errors;
pub mod partitions;
pub mod schemes;
pub mod service;

// Integration tests need the mocks too, so this isn't gated on cfg(test).
pub mod test_utils;

/// Builds the registry a process starts with: the built-in random scheme
/// backed by `store`, and the configured default scheme name. Fails if the
/// default scheme isn't registered, since legacy partitions could never load.
pub fn build_registry(
    config: &Config,
    store: Arc<dyn AssignmentStore>,
) -> Result<SchemeRegistry, PartitionError> {
    let mut registry = SchemeRegistry::new().with_default_scheme(config.default_scheme.clone());
    registry.register(Arc::new(RandomScheme::new(store)));
    registry.default_scheme()?;
    Ok(registry)
}
