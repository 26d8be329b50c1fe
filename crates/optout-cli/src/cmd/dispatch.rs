use anyhow::Context;
use chrono::Utc;
use std::path::Path;

use optout_core::dispatch::{DispatchRequest, Dispatcher};
use optout_core::retry::ThreadSleeper;
use optout_core::subject::Subject;
use optout_core::transport::{HttpFormClient, HttpMailer};

use crate::output::print_json;

pub struct DispatchArgs {
    pub controller: String,
    pub controller_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub locale: Option<String>,
}

pub fn run(data_dir: &Path, args: DispatchArgs, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(data_dir)?;
    let store = super::open_store(data_dir)?;
    let registry = super::load_registry(data_dir)?;

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

    let request = DispatchRequest {
        controller_key: args.controller,
        controller_name: args.controller_name,
        subject: Subject {
            name: args.name,
            email: args.email,
            phone: args.phone,
        },
        locale: args.locale,
    };

    let receipt = dispatcher.dispatch(request, Utc::now())?;

    if json {
        return print_json(&receipt);
    }

    if receipt.ok {
        let channel = receipt.channel.map(|c| c.as_str()).unwrap_or("?");
        println!("sent via {channel}");
        if let Some(id) = &receipt.provider_id {
            println!("provider id: {id}");
        }
        if let Some(note) = &receipt.note {
            println!("{note}");
        }
    } else {
        let error = receipt.error.as_deref().unwrap_or("unknown");
        println!("not sent: {error}");
        if let Some(hint) = &receipt.hint {
            println!("{hint}");
        }
    }
    if let Some(id) = &receipt.action_id {
        println!("action: {id}");
    }
    Ok(())
}
