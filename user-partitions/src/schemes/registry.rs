use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::errors::PartitionError;

use super::UserPartitionScheme;

/// Scheme bound to partitions written before schemes were recorded, and to
/// partitions built without an explicit scheme.
pub const DEFAULT_SCHEME_NAME: &str = "random";

static GLOBAL_REGISTRY: OnceCell<Arc<SchemeRegistry>> = OnceCell::new();

/// Name → scheme lookup table.
///
/// Populated with `register` while the process starts up, then shared
/// read-only (usually behind an `Arc`). Lookups are exact string matches.
pub struct SchemeRegistry {
    schemes: HashMap<String, Arc<dyn UserPartitionScheme>>,
    default_scheme: String,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        SchemeRegistry {
            schemes: HashMap::new(),
            default_scheme: DEFAULT_SCHEME_NAME.to_string(),
        }
    }

    pub fn with_default_scheme(mut self, name: impl Into<String>) -> Self {
        self.default_scheme = name.into();
        self
    }

    /// Adds a scheme under its own `name()`, the same name partitions bound
    /// to it are serialized with. Registering a name twice replaces the
    /// earlier entry, which is returned.
    pub fn register(
        &mut self,
        scheme: Arc<dyn UserPartitionScheme>,
    ) -> Option<Arc<dyn UserPartitionScheme>> {
        let name = scheme.name().to_string();
        debug!(scheme = %name, "registering user partition scheme");
        self.schemes.insert(name, scheme)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn UserPartitionScheme>, PartitionError> {
        self.schemes
            .get(name)
            .cloned()
            .ok_or_else(|| PartitionError::UnrecognizedScheme(name.to_string()))
    }

    pub fn default_scheme_name(&self) -> &str {
        &self.default_scheme
    }

    pub fn default_scheme(&self) -> Result<Arc<dyn UserPartitionScheme>, PartitionError> {
        self.resolve(&self.default_scheme)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemes.contains_key(name)
    }

    pub fn scheme_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("schemes", &self.scheme_names())
            .field("default_scheme", &self.default_scheme)
            .finish()
    }
}

/// Installs the process-wide registry. Only the first call wins; later calls
/// hand their registry back unchanged.
pub fn install_global_registry(
    registry: SchemeRegistry,
) -> Result<Arc<SchemeRegistry>, Arc<SchemeRegistry>> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY.set(registry.clone())?;
    Ok(registry)
}

pub fn global_registry() -> Option<Arc<SchemeRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitions::UserPartition;
    use crate::test_utils::{mock_groups, mock_registry, MockScheme};

    #[test]
    fn test_resolve_exact_name() {
        let mut registry = SchemeRegistry::new();
        registry.register(Arc::new(MockScheme::new("mock")));

        assert_eq!(registry.resolve("mock").unwrap().name(), "mock");
        for name in ["moc", "mock ", "Mock", ""] {
            match registry.resolve(name) {
                Err(PartitionError::UnrecognizedScheme(unknown)) => assert_eq!(unknown, name),
                _ => panic!("Expected UnrecognizedScheme for {name:?}"),
            }
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let first: Arc<dyn UserPartitionScheme> = Arc::new(MockScheme::new("cohort"));
        let second: Arc<dyn UserPartitionScheme> = Arc::new(MockScheme::new("cohort"));

        let mut registry = SchemeRegistry::new();
        assert!(registry.register(first.clone()).is_none());
        let replaced = registry.register(second.clone()).unwrap();

        assert!(Arc::ptr_eq(&replaced, &first));
        assert!(Arc::ptr_eq(&registry.resolve("cohort").unwrap(), &second));
        assert_eq!(registry.scheme_names(), vec!["cohort"]);
    }

    #[test]
    fn test_every_registered_scheme_round_trips() {
        let mut registry = mock_registry();
        registry.register(Arc::new(MockScheme::new("cohort")));

        for name in registry.scheme_names() {
            let partition = UserPartition::new(
                5,
                "Partition",
                "bound to a registered scheme",
                mock_groups(),
                registry.resolve(name).unwrap(),
            )
            .unwrap();
            let restored = UserPartition::from_json(&partition.to_json(), &registry).unwrap();
            assert_eq!(restored.scheme_name(), name);
            assert_eq!(restored, partition);
        }
    }

    #[test]
    fn test_default_scheme() {
        let registry = SchemeRegistry::new();
        assert_eq!(registry.default_scheme_name(), DEFAULT_SCHEME_NAME);
        assert!(matches!(
            registry.default_scheme(),
            Err(PartitionError::UnrecognizedScheme(_))
        ));

        let mut registry = SchemeRegistry::new().with_default_scheme("cohort");
        registry.register(Arc::new(MockScheme::new("cohort")));
        assert!(registry.contains("cohort"));
        assert_eq!(registry.default_scheme().unwrap().name(), "cohort");
    }

    #[test]
    fn test_global_registry_installs_once() {
        let mut first = SchemeRegistry::new();
        first.register(Arc::new(MockScheme::new("mock")));
        // Other tests never touch the global, so the first install here wins.
        let installed = install_global_registry(first).unwrap();
        assert!(installed.contains("mock"));

        let rejected = install_global_registry(SchemeRegistry::new()).unwrap_err();
        assert!(!rejected.contains("mock"));
        assert!(global_registry().unwrap().contains("mock"));
    }
}
