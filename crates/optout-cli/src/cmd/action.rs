use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use std::path::Path;
use uuid::Uuid;

use optout_core::action;
use optout_core::types::ActionStatus;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum ActionSubcommand {
    /// List actions, newest first
    List {
        /// Filter by status (draft, prepared, sent, verified, needs_review,
        /// escalate_pending, resolved, cancelled)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one action with its attempt history
    Show { id: String },
    /// Cancel an in-flight action
    Cancel { id: String },
}

pub fn run(data_dir: &Path, subcmd: ActionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ActionSubcommand::List { status } => list(data_dir, status.as_deref(), json),
        ActionSubcommand::Show { id } => show(data_dir, &id, json),
        ActionSubcommand::Cancel { id } => cancel(data_dir, &id, json),
    }
}

fn parse_id(id: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(id).context("invalid action id")
}

fn list(data_dir: &Path, status: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let filter = status
        .map(|s| s.parse::<ActionStatus>())
        .transpose()
        .context("invalid status filter")?;
    let actions = store.list_actions(filter)?;

    if json {
        return print_json(&actions);
    }

    if actions.is_empty() {
        println!("No actions.");
        return Ok(());
    }
    let rows = actions
        .iter()
        .map(|a| {
            vec![
                a.id.to_string(),
                a.controller_key.clone(),
                a.channel.as_str().to_string(),
                a.status.as_str().to_string(),
                a.retries.to_string(),
                a.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(
        &["id", "controller", "channel", "status", "retries", "updated"],
        rows,
    );
    Ok(())
}

fn show(data_dir: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let id = parse_id(id)?;
    let action = store.get_action(id)?;
    let attempts = store.attempts_for(id)?;

    if json {
        return print_json(&serde_json::json!({
            "action": action,
            "attempts": attempts,
        }));
    }

    println!("action:     {}", action.id);
    println!("controller: {}", action.controller_key);
    println!("subject:    {}", action.subject_id);
    println!("channel:    {}", action.channel);
    println!("status:     {}", action.status);
    println!("sla days:   {}", action.sla_days);
    println!("retries:    {}", action.retries);
    if let Some(err) = &action.last_error {
        println!("last error: {err}");
    }
    if let Some(pid) = &action.provider_id {
        println!("provider:   {pid}");
    }
    if let Some(proof) = &action.proof_id {
        println!("proof:      {proof}");
    }
    if !action.evidence_hashes.is_empty() {
        println!("evidence:   {} hash(es)", action.evidence_hashes.len());
    }
    if attempts.is_empty() {
        println!("\nno attempts recorded");
    } else {
        println!("\nattempts:");
        for attempt in &attempts {
            let outcome = if attempt.ok {
                "ok".to_string()
            } else {
                attempt
                    .error_code
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_else(|| "failed".to_string())
            };
            println!(
                "  #{} {} {} {}",
                attempt.seq,
                attempt.at.format("%Y-%m-%d %H:%M:%S"),
                attempt.channel,
                outcome
            );
        }
    }
    Ok(())
}

fn cancel(data_dir: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let id = parse_id(id)?;
    let action = action::cancel(&store, id, Utc::now())?;

    if json {
        return print_json(&action);
    }
    println!("cancelled {}", action.id);
    Ok(())
}
