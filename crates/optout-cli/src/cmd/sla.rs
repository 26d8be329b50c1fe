use chrono::Utc;
use clap::Subcommand;
use std::path::Path;

use optout_core::sla;

use crate::output::print_json;

#[derive(Subcommand)]
pub enum SlaSubcommand {
    /// Flag overdue sent actions for escalation
    Tick,
}

pub fn run(data_dir: &Path, subcmd: SlaSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SlaSubcommand::Tick => tick(data_dir, json),
    }
}

fn tick(data_dir: &Path, json: bool) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let registry = super::load_registry(data_dir)?;
    let report = sla::run_sla_sweep(&store, &registry, Utc::now())?;

    if json {
        return print_json(&report);
    }
    println!("scanned {}, flagged {}", report.scanned, report.flagged);
    Ok(())
}
