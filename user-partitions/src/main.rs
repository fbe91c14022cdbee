use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use envconfig::Envconfig;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use user_partitions::build_registry;
use user_partitions::config::Config;
use user_partitions::course_config::JsonFileCourseConfigStore;
use user_partitions::schemes::{install_global_registry, InMemoryAssignmentStore, User};
use user_partitions::service::PartitionService;

fn init_logging(debug: bool) {
    let base_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    let log_layer = if debug {
        base_layer
            .with_ansi(true)
            .with_filter(EnvFilter::from_default_env())
            .boxed()
    } else {
        base_layer
            .json()
            .with_filter(EnvFilter::from_default_env())
            .boxed()
    };

    tracing_subscriber::registry().with(log_layer).init();
}

fn main() -> Result<()> {
    let config = Config::init_from_env().context("Invalid configuration")?;
    init_logging(*config.debug);

    let registry = build_registry(&config, Arc::new(InMemoryAssignmentStore::new()))
        .with_context(|| {
            format!(
                "DEFAULT_SCHEME {:?} is not a registered scheme",
                config.default_scheme
            )
        })?;
    let registry = install_global_registry(registry)
        .map_err(|_| anyhow!("scheme registry was already installed"))?;

    let store = JsonFileCourseConfigStore::new(config.partitions_path.clone());
    let service = PartitionService::from_course_config(&store, &registry, &config.course_id)
        .with_context(|| format!("failed to load partitions for {}", config.course_id))?;

    let user = User::new(config.user_id, config.username.clone());
    for partition in service.course_partitions() {
        let group_id = service.get_user_group_id_for_partition(&user, partition.id)?;
        let group = group_id.map_or_else(|| "-".to_string(), |id| id.to_string());
        println!("{}\t{}\t{}", partition.id, partition.name, group);
    }

    tracing::info!(
        course_id = %config.course_id,
        partitions = service.course_partitions().len(),
        "resolved user partitions"
    );
    Ok(())
}
