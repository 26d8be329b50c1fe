use anyhow::{bail, Context};
use chrono::Utc;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use optout_core::signer::Signer;
use optout_core::{bundle, ledger};

use crate::output::print_json;

#[derive(Subcommand)]
pub enum ProofSubcommand {
    /// Seal evidence into a signed Merkle root
    Commit {
        /// Verified action to seal and resolve
        #[arg(long, conflicts_with_all = ["subject", "evidence", "controller"])]
        action: Option<String>,

        /// Subject id for a free-standing proof
        #[arg(long, requires = "evidence")]
        subject: Option<String>,

        /// Evidence hash (64 hex chars, repeatable)
        #[arg(long)]
        evidence: Vec<String>,

        /// Controller key recorded on a free-standing proof
        #[arg(long)]
        controller: Option<String>,
    },
    /// Recompute the root and check the signature of a stored proof
    Verify { id: String },
    /// Export an offline-verifiable zip bundle for a subject
    Export {
        subject_id: String,

        /// Output path
        #[arg(long, default_value = "proof-bundle.zip")]
        out: PathBuf,
    },
}

pub fn run(data_dir: &Path, subcmd: ProofSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ProofSubcommand::Commit {
            action,
            subject,
            evidence,
            controller,
        } => commit(
            data_dir,
            action.as_deref(),
            subject.as_deref(),
            &evidence,
            controller.as_deref(),
            json,
        ),
        ProofSubcommand::Verify { id } => verify(data_dir, &id, json),
        ProofSubcommand::Export { subject_id, out } => export(data_dir, &subject_id, &out),
    }
}

fn load_signer(data_dir: &Path) -> anyhow::Result<Signer> {
    let config = super::load_config(data_dir)?;
    Signer::from_base64(
        config.signing_key.as_deref(),
        config.signing_key_id.as_deref(),
    )
    .context("failed to build signer")
}

fn commit(
    data_dir: &Path,
    action: Option<&str>,
    subject: Option<&str>,
    evidence: &[String],
    controller: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let signer = load_signer(data_dir)?;

    let record = match (action, subject) {
        (Some(action), _) => {
            let id = Uuid::parse_str(action).context("invalid action id")?;
            ledger::commit_for_action(&store, &signer, id, Utc::now())?
        }
        (None, Some(subject)) => {
            ledger::commit(&store, &signer, subject, evidence, controller, Utc::now())?
        }
        (None, None) => bail!("pass --action, or --subject with --evidence"),
    };

    if json {
        return print_json(&record);
    }
    println!("proof:     {}", record.id);
    println!("root:      {}", record.root);
    match &record.signature {
        Some(signature) => println!("signature: {signature}"),
        None => println!("signature: (signing disabled)"),
    }
    println!("evidence:  {} hash(es)", record.evidence_count);
    Ok(())
}

fn verify(data_dir: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let signer = load_signer(data_dir)?;
    let id = Uuid::parse_str(id).context("invalid proof id")?;
    let check = ledger::verify(&store, &signer, id)?;

    if json {
        return print_json(&check);
    }
    println!("root matches:    {}", check.root_matches);
    match check.signature_valid {
        Some(valid) => println!("signature valid: {valid}"),
        None => println!("signature valid: (unsigned)"),
    }
    println!("ok:              {}", check.ok);
    Ok(())
}

fn export(data_dir: &Path, subject_id: &str, out: &Path) -> anyhow::Result<()> {
    let store = super::open_store(data_dir)?;
    let bytes = bundle::export_bundle(&store, subject_id, Utc::now())?;
    std::fs::write(out, &bytes).with_context(|| format!("failed to write {}", out.display()))?;
    println!("wrote {}", out.display());
    Ok(())
}
