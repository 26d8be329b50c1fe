use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use std::path::Path;

use optout_core::sweep;
use optout_core::transport::HttpProbe;

use crate::output::print_json;

#[derive(Subcommand)]
pub enum VerifySubcommand {
    /// Probe a bounded batch of in-flight actions for continued presence
    Sweep {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

pub fn run(data_dir: &Path, subcmd: VerifySubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        VerifySubcommand::Sweep { limit } => sweep(data_dir, limit, json),
    }
}

fn sweep(data_dir: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(data_dir)?;
    let store = super::open_store(data_dir)?;
    let registry = super::load_registry(data_dir)?;
    let probe = HttpProbe::new(config.timeout()).context("failed to build probe transport")?;

    let report = sweep::run_verification_sweep(&store, &registry, &probe, limit, Utc::now())?;

    if json {
        return print_json(&report);
    }
    println!(
        "checked {}: verified {}, needs review {}",
        report.checked, report.verified, report.needs_review
    );
    Ok(())
}
