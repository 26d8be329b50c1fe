//! Dead-letter queue: durable parking for exhausted dispatches.
//!
//! An entry is parked when a dispatch runs out of transient retries. It
//! stays until an operator (or a timer-driven sweep) retries it; retries
//! re-resolve the delivery target because controller endpoints drift while
//! entries sit parked. Entries are marked resolved, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::attempt::DispatchAttempt;
use crate::breaker;
use crate::channel;
use crate::dispatch::{DispatchReceipt, Dispatcher};
use crate::error::{OptoutError, Result};
use crate::idempotency::{IdempotencyRecord, IdempotencyStatus};
use crate::policy;
use crate::profile::ProfileRegistry;
use crate::store::Store;
use crate::types::{ActionStatus, Channel, ErrorCode};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: Uuid,
    pub action_id: Uuid,
    pub controller_key: String,
    pub subject_id: String,
    pub channel: Channel,
    /// The idempotency key of the originating dispatch, so a successful
    /// retry can settle the cached outcome.
    pub dispatch_key: String,
    /// Rendered request payload at park time, for operator triage.
    pub payload: serde_json::Value,
    pub error_code: ErrorCode,
    pub error_note: String,
    #[serde(default)]
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DlqEntry {
    pub fn new(
        action: &Action,
        dispatch_key: String,
        payload: serde_json::Value,
        code: ErrorCode,
        note: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_id: action.id,
            controller_key: action.controller_key.clone(),
            subject_id: action.subject_id.clone(),
            channel: action.channel,
            dispatch_key,
            payload,
            error_code: code,
            error_note: note,
            retries: 0,
            created_at: now,
            resolved_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// Queue operations
// ---------------------------------------------------------------------------

/// Open entries, oldest first, capped at `limit`.
pub fn list(store: &Store, limit: usize) -> Result<Vec<DlqEntry>> {
    Ok(store
        .list_dlq()?
        .into_iter()
        .filter(DlqEntry::is_open)
        .take(limit)
        .collect())
}

pub fn open_count(store: &Store) -> Result<u64> {
    Ok(store.list_dlq()?.iter().filter(|e| e.is_open()).count() as u64)
}

/// Retry one parked entry through the executor's send path.
///
/// The target is re-resolved from the current registry. A cancelled action
/// is refused outright. Success marks the entry resolved, moves the action
/// to `sent`, and settles the cached idempotency outcome; failure bumps the
/// entry's retry counter and leaves it parked.
pub fn retry(
    store: &Store,
    registry: &ProfileRegistry,
    dispatcher: &Dispatcher,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<DispatchReceipt> {
    let mut entry = store.get_dlq(id)?;
    if !entry.is_open() {
        return Err(OptoutError::DlqEntryResolved(id.to_string()));
    }
    let action = store.get_action(entry.action_id)?;
    if action.status == ActionStatus::Cancelled {
        return Err(OptoutError::ActionCancelled(action.id.to_string()));
    }
    if action.status.is_terminal() {
        // Resolved through some other path while parked; close the entry.
        entry.resolved_at = Some(now);
        store.update_dlq(&entry)?;
        return Ok(DispatchReceipt::sent(
            action.id,
            action.channel,
            action.provider_id.clone(),
            Some("action already settled; entry closed".to_string()),
        ));
    }

    let profile = registry.get(&entry.controller_key)?;
    let target = channel::resolve_target(profile)?;
    let region = action.locale.as_deref().and_then(policy::region_of_locale);
    let policy = policy::resolve(registry, &entry.controller_key, region.as_deref())?;

    match dispatcher.deliver(&target, &profile.name, &action.subject, &policy) {
        Ok(delivery) => {
            store.update_action_if(
                action.id,
                &[ActionStatus::Prepared, ActionStatus::Sent],
                now,
                |a| {
                    a.status = ActionStatus::Sent;
                    a.channel = target.channel();
                    a.provider_id = delivery.provider_id.clone();
                    a.last_error = None;
                },
            )?;
            store.append_attempt(&DispatchAttempt::success(
                action.id,
                target.channel(),
                delivery.provider_id.clone(),
                delivery.note.clone(),
                now,
            ))?;
            entry.resolved_at = Some(now);
            store.update_dlq(&entry)?;
            store.idempotency_set(
                &entry.dispatch_key,
                &IdempotencyRecord {
                    status: IdempotencyStatus::Sent,
                    action_id: action.id,
                    provider_id: delivery.provider_id.clone(),
                    error_code: None,
                    first_seen: now,
                },
            )?;
            tracing::info!(
                dlq_id = %entry.id,
                controller = %entry.controller_key,
                "dlq retry delivered"
            );
            Ok(DispatchReceipt::sent(
                action.id,
                target.channel(),
                delivery.provider_id,
                delivery.note,
            ))
        }
        Err(err) => {
            entry.retries += 1;
            entry.error_code = err.code;
            entry.error_note = err.note.clone();
            store.update_dlq(&entry)?;
            store.append_attempt(&DispatchAttempt::failure(
                action.id,
                target.channel(),
                err.code,
                err.note.clone(),
                now,
            ))?;
            store.update_action_if(action.id, &[ActionStatus::Prepared], now, |a| {
                a.retries += 1;
                a.last_error = Some(err.to_string());
            })?;
            if err.transient {
                breaker::record_failure(store, &entry.controller_key, err.code, &err.note, now)?;
            }
            tracing::warn!(
                dlq_id = %entry.id,
                controller = %entry.controller_key,
                code = %err.code,
                retries = entry.retries,
                "dlq retry failed, entry stays parked"
            );
            Ok(DispatchReceipt::rejected(
                Some(action.id),
                err.code.as_str(),
                Some(err.note),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

const CSV_HEADER: &str =
    "id,created_at,channel,controller_key,subject_id,error_code,error_note,retries,payload_json";

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render the open entries as CSV, oldest first. Zero rows still yields the
/// header, never an error.
pub fn export_csv(store: &Store) -> Result<String> {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for entry in store.list_dlq()?.into_iter().filter(DlqEntry::is_open) {
        let payload = serde_json::to_string(&entry.payload)?;
        let row = [
            entry.id.to_string(),
            entry.created_at.to_rfc3339(),
            entry.channel.as_str().to_string(),
            entry.controller_key.clone(),
            entry.subject_id.clone(),
            entry.error_code.as_str().to_string(),
            entry.error_note.clone(),
            entry.retries.to_string(),
            payload,
        ];
        let encoded: Vec<String> = row.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&encoded.join(","));
        out.push('\n');
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
