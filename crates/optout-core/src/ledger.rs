//! The proof ledger: tamper-evident commitments over evidence hashes.
//!
//! A commit collapses a subject's evidence set into one Merkle root, signs
//! it when a key is configured, and persists the record. Records are
//! immutable once written. Verification recomputes the root from the stored
//! evidence and, independently, checks the signature against the *stored*
//! root, so a caller can tell "evidence tampered" apart from "signature
//! forged". The two booleans are never collapsed into one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OptoutError, Result};
use crate::merkle;
use crate::signer::Signer;
use crate::store::{Store, Transition};
use crate::types::ActionStatus;

/// Merkle construction identifier recorded on every proof record.
pub const MERKLE_ALGORITHM: &str = "sha256-merkle";

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofRecord {
    pub id: Uuid,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_key: Option<String>,
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub algorithm: String,
    /// Canonical leaves the root was computed over.
    pub evidence: Vec<String>,
    pub evidence_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Outcome of verifying a proof record. `signature_valid` is `None` when
/// the record is unsigned or no key is configured to check it with.
#[derive(Debug, Clone, Serialize)]
pub struct ProofCheck {
    pub ok: bool,
    pub root_matches: bool,
    pub signature_valid: Option<bool>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Commit an evidence set for a subject. Fails on an empty set.
pub fn commit(
    store: &Store,
    signer: &Signer,
    subject_id: &str,
    evidence_hashes: &[String],
    controller_key: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ProofRecord> {
    let leaves = merkle::canonical_leaves(evidence_hashes)?;
    let root = merkle::merkle_root(&leaves)?;
    let signature = signer.sign(&root)?;
    let record = ProofRecord {
        id: Uuid::new_v4(),
        subject_id: subject_id.to_string(),
        controller_key: controller_key.map(str::to_string),
        root,
        signature,
        key_id: signer.key_id().map(str::to_string),
        algorithm: MERKLE_ALGORITHM.to_string(),
        evidence_count: leaves.len(),
        evidence: leaves,
        created_at: now,
    };
    store.insert_proof(&record)?;
    tracing::info!(
        proof_id = %record.id,
        subject_id,
        evidence = record.evidence_count,
        signed = record.signature.is_some(),
        "proof committed"
    );
    Ok(record)
}

/// Commit a verified action's evidence and settle it as resolved.
///
/// Links the record back to the action. Only `verified` actions qualify;
/// anything else is an invalid transition.
pub fn commit_for_action(
    store: &Store,
    signer: &Signer,
    action_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ProofRecord> {
    let action = store.get_action(action_id)?;
    if action.status != ActionStatus::Verified {
        return Err(OptoutError::InvalidTransition {
            from: action.status.to_string(),
            to: ActionStatus::Resolved.to_string(),
        });
    }
    let record = commit(
        store,
        signer,
        &action.subject_id,
        &action.evidence_hashes,
        Some(&action.controller_key),
        now,
    )?;
    let outcome = store.update_action_if(action_id, &[ActionStatus::Verified], now, |a| {
        a.status = ActionStatus::Resolved;
        a.proof_id = Some(record.id);
    })?;
    if let Transition::Skipped { actual } = outcome {
        tracing::warn!(
            %action_id,
            actual = %actual,
            "action moved while committing proof; record kept, action not settled"
        );
    }
    Ok(record)
}

/// Verify a stored record. Root and signature checks are independent.
pub fn verify(store: &Store, signer: &Signer, proof_id: Uuid) -> Result<ProofCheck> {
    let record = store.get_proof(proof_id)?;
    let recomputed = merkle::merkle_root(&record.evidence)?;
    let root_matches = recomputed == record.root;
    let signature_valid = match &record.signature {
        None => None,
        Some(signature) => signer.verify(&record.root, signature)?,
    };
    let ok = root_matches && signature_valid.unwrap_or(true);
    Ok(ProofCheck {
        ok,
        root_matches,
        signature_valid,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
