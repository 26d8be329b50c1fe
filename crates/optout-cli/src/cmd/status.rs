use chrono::Utc;
use std::path::Path;

use optout_core::{breaker, dlq};

use crate::output::print_json;

pub fn run(data_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(data_dir)?;
    let store = super::open_store(data_dir)?;

    let actions = store.count_actions_by_status()?;
    let dlq_open = dlq::open_count(&store)?;
    let breakers = breaker::state(&store, &config.breaker, Utc::now())?;

    if json {
        return print_json(&serde_json::json!({
            "actions": actions,
            "dlq_open": dlq_open,
            "breakers": breakers,
        }));
    }

    if actions.is_empty() {
        println!("actions: none");
    } else {
        println!("actions:");
        for (status, count) in &actions {
            println!("  {status:<16} {count}");
        }
    }
    println!("dlq open: {dlq_open}");
    if breakers.is_empty() {
        println!("breakers: all quiet");
    } else {
        println!("breakers:");
        for b in &breakers {
            let gate = if b.open { "OPEN" } else { "closed" };
            println!(
                "  {:<16} {} failure(s) in window, {}",
                b.controller_key, b.recent_failures, gate
            );
        }
    }
    Ok(())
}
