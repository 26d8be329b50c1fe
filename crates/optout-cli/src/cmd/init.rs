use anyhow::Context;
use optout_core::config::{self, AppConfig};
use optout_core::io;
use optout_core::profile::ProfileRegistry;
use std::path::Path;

/// Materialize the data directory: a default `config.yaml` and the seed
/// controller registry, both skipped when already present so re-running
/// is safe.
pub fn run(data_dir: &Path) -> anyhow::Result<()> {
    io::ensure_dir(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    println!("Initializing optout data directory: {}", data_dir.display());

    let config_path = config::config_path(data_dir);
    if config_path.exists() {
        println!("  exists:  {}", config::CONFIG_FILE);
    } else {
        AppConfig::default()
            .save(data_dir)
            .context("failed to write config.yaml")?;
        println!("  created: {}", config::CONFIG_FILE);
    }

    let registry_path = config::registry_path(data_dir);
    if registry_path.exists() {
        println!("  exists:  {}", config::REGISTRY_FILE);
    } else {
        ProfileRegistry::seed()
            .save(&registry_path)
            .context("failed to write controller registry")?;
        println!("  created: {}", config::REGISTRY_FILE);
    }

    println!("Edit controllers.yaml to add or adjust controller profiles.");
    Ok(())
}
