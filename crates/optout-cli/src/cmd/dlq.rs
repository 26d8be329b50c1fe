use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use optout_core::dispatch::Dispatcher;
use optout_core::dlq;
use optout_core::retry::ThreadSleeper;
use optout_core::transport::{HttpFormClient, HttpMailer};

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum DlqSubcommand {
    /// List open entries, oldest first
    List {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Push one parked entry back through delivery
    Retry { id: String },
    /// Export open entries as CSV
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub fn run(data_dir: &Path, subcmd: DlqSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DlqSubcommand::List { limit } => list(data_dir, limit, json),
        DlqSubcommand::Retry { id } => retry(data_dir, &id, json),
        DlqSubcommand::Export { out } => export(data_dir, out.as_deref()),
    }
}

fn list(data_dir: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let entries = dlq::list(&store, limit)?;

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("Dead letter queue is empty.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.controller_key.clone(),
                e.channel.as_str().to_string(),
                e.error_code.as_str().to_string(),
                e.retries.to_string(),
                e.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(
        &["id", "controller", "channel", "error", "retries", "created"],
        rows,
    );
    Ok(())
}

fn retry(data_dir: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(data_dir)?;
    let store = super::open_store(data_dir)?;
    let registry = super::load_registry(data_dir)?;
    let id = Uuid::parse_str(id).context("invalid dlq entry id")?;

    let timeout = config.timeout();
    let mailer = HttpMailer::new(config.relay_url.clone(), config.from_email.clone(), timeout)
        .context("failed to build mail transport")?;
    let forms = HttpFormClient::new(timeout).context("failed to build form transport")?;
    let dispatcher = Dispatcher::new(
        &store,
        &registry,
        &mailer,
        &forms,
        &ThreadSleeper,
        config.backoff.clone(),
        config.breaker.clone(),
    );

    let receipt = dlq::retry(&store, &registry, &dispatcher, id, Utc::now())?;

    if json {
        return print_json(&receipt);
    }
    if receipt.ok {
        println!("retry delivered");
        if let Some(pid) = &receipt.provider_id {
            println!("provider id: {pid}");
        }
    } else {
        println!(
            "retry failed: {}",
            receipt.error.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

fn export(data_dir: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let csv = dlq::export_csv(&store)?;

    match out {
        Some(path) => {
            std::fs::write(path, &csv)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}
