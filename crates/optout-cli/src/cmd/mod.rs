pub mod action;
pub mod controllers;
pub mod dispatch;
pub mod dlq;
pub mod init;
pub mod proof;
pub mod serve;
pub mod sla;
pub mod status;
pub mod verify;

use anyhow::Context;
use optout_core::config::{self, AppConfig};
use optout_core::profile::ProfileRegistry;
use optout_core::store::Store;
use std::path::Path;

/// Open the store inside the data directory, creating the directory on
/// first use.
pub(crate) fn open_store(data_dir: &Path) -> anyhow::Result<Store> {
    optout_core::io::ensure_dir(data_dir).context("failed to create data directory")?;
    Store::open(&config::db_path(data_dir)).context("failed to open store")
}

pub(crate) fn load_config(data_dir: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load(data_dir).context("failed to load config")
}

pub(crate) fn load_registry(data_dir: &Path) -> anyhow::Result<ProfileRegistry> {
    ProfileRegistry::load(&config::registry_path(data_dir))
        .context("failed to load controller registry")
}
