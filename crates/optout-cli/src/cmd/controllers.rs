use clap::Subcommand;
use std::path::Path;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum ControllersSubcommand {
    /// List known controllers and their delivery channels
    List,
}

pub fn run(data_dir: &Path, subcmd: ControllersSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ControllersSubcommand::List => list(data_dir, json),
    }
}

fn list(data_dir: &Path, json: bool) -> anyhow::Result<()> {
    let registry = super::load_registry(data_dir)?;
    let profiles = registry.list();

    if json {
        return print_json(&profiles);
    }

    let rows = profiles
        .iter()
        .map(|p| {
            let channels = p
                .channels
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(",");
            vec![
                p.key.clone(),
                p.name.clone(),
                channels,
                p.preferred_channel
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                p.sla_days
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                if p.is_dispatchable() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(
        &["key", "name", "channels", "preferred", "sla", "dispatchable"],
        rows,
    );
    Ok(())
}
