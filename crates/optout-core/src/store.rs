//! Durable storage for the dispatch orchestrator, on redb.
//!
//! # Table design
//!
//! Time-keyed tables (`actions`, `dlq`, `failures`, `proofs`) use a 24-byte
//! composite key:
//! ```text
//! [ timestamp_ms: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//! Because the timestamp occupies the high bytes in big-endian encoding,
//! byte ordering equals timestamp ordering, so trailing-window and due-date
//! queries are single range scans.
//!
//! `attempts` prefixes the action uuid instead (16 + 8 + 4 bytes with a
//! per-action sequence suffix) so one action's audit trail is one prefix
//! scan, already in attempt order.
//!
//! `idempotency` keys are the 64-byte ASCII hex of the dispatch key. The
//! insert-at-most-once invariant lives here: `idempotency_ensure` checks
//! and inserts inside a single write transaction, and redb's single-writer
//! property makes every conditional update in this module a per-row
//! compare-and-set without in-process locks.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::action::Action;
use crate::attempt::{DispatchAttempt, FailureEvent};
use crate::dlq::DlqEntry;
use crate::error::{OptoutError, Result};
use crate::idempotency::{Ensure, IdempotencyRecord};
use crate::ledger::ProofRecord;
use crate::types::ActionStatus;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Key: 24-byte composite (created_at ms big-endian ++ uuid). Value: JSON Action.
const ACTIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("actions");
/// Key: 28-byte composite (action uuid ++ at ms big-endian ++ seq). Value: JSON DispatchAttempt.
const ATTEMPTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("attempts");
/// Key: dispatch key hex bytes. Value: JSON IdempotencyRecord.
const IDEMPOTENCY: TableDefinition<&[u8], &[u8]> = TableDefinition::new("idempotency");
/// Key: 24-byte composite (created_at ms big-endian ++ uuid). Value: JSON DlqEntry.
const DLQ: TableDefinition<&[u8], &[u8]> = TableDefinition::new("dlq");
/// Key: 24-byte composite (at ms big-endian ++ uuid). Value: JSON FailureEvent.
const FAILURES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("failures");
/// Key: 24-byte composite (created_at ms big-endian ++ uuid). Value: JSON ProofRecord.
const PROOFS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("proofs");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn ts_uuid_key(ts: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

/// Lower bound for a range scan starting at `ts` (uuid suffix zeroed).
fn ts_lower_bound(ts: DateTime<Utc>) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key
}

fn attempt_key(action_id: Uuid, ts: DateTime<Utc>, seq: u32) -> [u8; 28] {
    let mut key = [0u8; 28];
    key[..16].copy_from_slice(action_id.as_bytes());
    let ms = ts.timestamp_millis().max(0) as u64;
    key[16..24].copy_from_slice(&ms.to_be_bytes());
    key[24..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// Inclusive bounds covering every attempt row for one action.
fn attempt_bounds(action_id: Uuid) -> ([u8; 28], [u8; 28]) {
    let mut lower = [0u8; 28];
    lower[..16].copy_from_slice(action_id.as_bytes());
    let mut upper = [0xffu8; 28];
    upper[..16].copy_from_slice(action_id.as_bytes());
    (lower, upper)
}

// ---------------------------------------------------------------------------
// Transition outcome
// ---------------------------------------------------------------------------

/// Result of a conditional action update.
#[derive(Debug)]
pub enum Transition {
    /// The row was in an expected status and the update was applied.
    Applied(Action),
    /// The row was not in an expected status; nothing was written.
    Skipped { actual: ActionStatus },
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistent store for actions, attempts, idempotency claims, the DLQ,
/// breaker failure events, and proof records.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the redb database at `path`, ensuring all tables exist.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(|e| OptoutError::Store(e.to_string()))?;
        let wt = db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        wt.open_table(ACTIONS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        wt.open_table(ATTEMPTS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        wt.open_table(IDEMPOTENCY)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        wt.open_table(DLQ)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        wt.open_table(FAILURES)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        wt.open_table(PROOFS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    pub fn insert_action(&self, action: &Action) -> Result<()> {
        let key = ts_uuid_key(action.created_at, action.id);
        let value = serde_json::to_vec(action).map_err(|e| OptoutError::Store(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(ACTIONS)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(())
    }

    pub fn get_action(&self, id: Uuid) -> Result<Action> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(ACTIONS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let action: Action =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            if action.id == id {
                return Ok(action);
            }
        }
        Err(OptoutError::ActionNotFound(id.to_string()))
    }

    /// List actions, newest first, optionally filtered by status.
    pub fn list_actions(&self, status: Option<ActionStatus>) -> Result<Vec<Action>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(ACTIONS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let action: Action =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            if status.map_or(true, |s| action.status == s) {
                result.push(action);
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    /// Actions in any of `statuses`, oldest first (sweep processing order).
    pub fn actions_in_status(&self, statuses: &[ActionStatus]) -> Result<Vec<Action>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(ACTIONS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let action: Action =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            if statuses.contains(&action.status) {
                result.push(action);
            }
        }
        Ok(result)
    }

    pub fn count_actions_by_status(&self) -> Result<BTreeMap<String, u64>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(ACTIONS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let mut counts = BTreeMap::new();
        for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let action: Action =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            *counts.entry(action.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Conditionally update an action inside one write transaction.
    ///
    /// The row is loaded, its status checked against `expected`, and `mutate`
    /// applied only on a match. Concurrent sweeps over overlapping status
    /// sets stay correct because the losing update observes the new status
    /// and skips.
    pub fn update_action_if(
        &self,
        id: Uuid,
        expected: &[ActionStatus],
        now: DateTime<Utc>,
        mutate: impl FnOnce(&mut Action),
    ) -> Result<Transition> {
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let outcome;
        {
            let mut table = wt
                .open_table(ACTIONS)
                .map_err(|e| OptoutError::Store(e.to_string()))?;

            let mut found: Option<Action> = None;
            {
                for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
                    let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
                    let action: Action = serde_json::from_slice(v.value())
                        .map_err(|e| OptoutError::Store(e.to_string()))?;
                    if action.id == id {
                        found = Some(action);
                        break;
                    }
                }
            }

            let Some(mut action) = found else {
                return Err(OptoutError::ActionNotFound(id.to_string()));
            };

            if !expected.contains(&action.status) {
                return Ok(Transition::Skipped {
                    actual: action.status,
                });
            }

            mutate(&mut action);
            action.updated_at = now;

            let key = ts_uuid_key(action.created_at, action.id);
            let value =
                serde_json::to_vec(&action).map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            outcome = Transition::Applied(action);
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(outcome)
    }

    /// Conditional status transition.
    pub fn transition_action(
        &self,
        id: Uuid,
        expected: &[ActionStatus],
        to: ActionStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        self.update_action_if(id, expected, now, |action| action.status = to)
    }

    // -----------------------------------------------------------------------
    // Attempts
    // -----------------------------------------------------------------------

    /// Append an attempt row, assigning the next per-action sequence number.
    pub fn append_attempt(&self, attempt: &DispatchAttempt) -> Result<u32> {
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let seq;
        {
            let mut table = wt
                .open_table(ATTEMPTS)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            let (lower, upper) = attempt_bounds(attempt.action_id);
            let existing = {
                let mut n: u32 = 0;
                for entry in table
                    .range(lower.as_slice()..=upper.as_slice())
                    .map_err(|e| OptoutError::Store(e.to_string()))?
                {
                    entry.map_err(|e| OptoutError::Store(e.to_string()))?;
                    n += 1;
                }
                n
            };
            seq = existing + 1;

            let mut stored = attempt.clone();
            stored.seq = seq;
            let key = attempt_key(stored.action_id, stored.at, seq);
            let value =
                serde_json::to_vec(&stored).map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(seq)
    }

    /// All attempts for an action, in creation order.
    pub fn attempts_for(&self, action_id: Uuid) -> Result<Vec<DispatchAttempt>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(ATTEMPTS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let (lower, upper) = attempt_bounds(action_id);
        let mut result = Vec::new();
        for entry in table
            .range(lower.as_slice()..=upper.as_slice())
            .map_err(|e| OptoutError::Store(e.to_string()))?
        {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let attempt: DispatchAttempt =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            result.push(attempt);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Idempotency
    // -----------------------------------------------------------------------

    /// Claim `key` or surface the prior record. Check and insert run inside
    /// one write transaction; a duplicate is a signal, never an error.
    pub fn idempotency_ensure(&self, key: &str, record: &IdempotencyRecord) -> Result<Ensure> {
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(IDEMPOTENCY)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            let existing: Option<IdempotencyRecord> = match table
                .get(key.as_bytes())
                .map_err(|e| OptoutError::Store(e.to_string()))?
            {
                Some(guard) => Some(
                    serde_json::from_slice(guard.value())
                        .map_err(|e| OptoutError::Store(e.to_string()))?,
                ),
                None => None,
            };
            if let Some(prior) = existing {
                return Ok(Ensure::Exists(prior));
            }
            let value =
                serde_json::to_vec(record).map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_bytes(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(Ensure::Claimed)
    }

    /// Overwrite the record under `key` (outcome caching, claim takeover).
    pub fn idempotency_set(&self, key: &str, record: &IdempotencyRecord) -> Result<()> {
        let value = serde_json::to_vec(record).map_err(|e| OptoutError::Store(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(IDEMPOTENCY)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_bytes(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(())
    }

    pub fn idempotency_get(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(IDEMPOTENCY)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        match table
            .get(key.as_bytes())
            .map_err(|e| OptoutError::Store(e.to_string()))?
        {
            Some(guard) => Ok(Some(
                serde_json::from_slice(guard.value())
                    .map_err(|e| OptoutError::Store(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Release a claim (breaker rejection is not an outcome worth caching).
    pub fn idempotency_remove(&self, key: &str) -> Result<()> {
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(IDEMPOTENCY)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .remove(key.as_bytes())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dead-letter queue
    // -----------------------------------------------------------------------

    pub fn push_dlq(&self, entry: &DlqEntry) -> Result<()> {
        let key = ts_uuid_key(entry.created_at, entry.id);
        let value = serde_json::to_vec(entry).map_err(|e| OptoutError::Store(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(DLQ)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(())
    }

    pub fn get_dlq(&self, id: Uuid) -> Result<DlqEntry> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(DLQ)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let parked: DlqEntry =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            if parked.id == id {
                return Ok(parked);
            }
        }
        Err(OptoutError::DlqEntryNotFound(id.to_string()))
    }

    pub fn update_dlq(&self, entry: &DlqEntry) -> Result<()> {
        let key = ts_uuid_key(entry.created_at, entry.id);
        let value = serde_json::to_vec(entry).map_err(|e| OptoutError::Store(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(DLQ)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(())
    }

    /// All DLQ entries, oldest first.
    pub fn list_dlq(&self) -> Result<Vec<DlqEntry>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(DLQ)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let parked: DlqEntry =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            result.push(parked);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Breaker failure events
    // -----------------------------------------------------------------------

    pub fn record_failure(&self, event: &FailureEvent) -> Result<()> {
        let key = ts_uuid_key(event.at, event.id);
        let value = serde_json::to_vec(event).map_err(|e| OptoutError::Store(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(FAILURES)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(())
    }

    /// Failure count for one controller since `since`. One range scan; the
    /// key prefix is the timestamp, so older events are never touched.
    pub fn count_failures_since(&self, controller_key: &str, since: DateTime<Utc>) -> Result<u64> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(FAILURES)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let lower = ts_lower_bound(since);
        let mut count = 0u64;
        for entry in table
            .range(lower.as_slice()..)
            .map_err(|e| OptoutError::Store(e.to_string()))?
        {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let event: FailureEvent =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            if event.controller_key == controller_key {
                count += 1;
            }
        }
        Ok(count)
    }

    /// All failure events since `since`, for per-controller grouping.
    pub fn failures_since(&self, since: DateTime<Utc>) -> Result<Vec<FailureEvent>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(FAILURES)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let lower = ts_lower_bound(since);
        let mut result = Vec::new();
        for entry in table
            .range(lower.as_slice()..)
            .map_err(|e| OptoutError::Store(e.to_string()))?
        {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let event: FailureEvent =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            result.push(event);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Proof records
    // -----------------------------------------------------------------------

    pub fn insert_proof(&self, record: &ProofRecord) -> Result<()> {
        let key = ts_uuid_key(record.created_at, record.id);
        let value = serde_json::to_vec(record).map_err(|e| OptoutError::Store(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(PROOFS)
                .map_err(|e| OptoutError::Store(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| OptoutError::Store(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        Ok(())
    }

    pub fn get_proof(&self, id: Uuid) -> Result<ProofRecord> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(PROOFS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let record: ProofRecord =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            if record.id == id {
                return Ok(record);
            }
        }
        Err(OptoutError::ProofNotFound(id.to_string()))
    }

    /// Proof records for a subject, oldest first.
    pub fn proofs_for_subject(&self, subject_id: &str) -> Result<Vec<ProofRecord>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let table = rt
            .open_table(PROOFS)
            .map_err(|e| OptoutError::Store(e.to_string()))?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(|e| OptoutError::Store(e.to_string()))? {
            let (_, v) = entry.map_err(|e| OptoutError::Store(e.to_string()))?;
            let record: ProofRecord =
                serde_json::from_slice(v.value()).map_err(|e| OptoutError::Store(e.to_string()))?;
            if record.subject_id == subject_id {
                result.push(record);
            }
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
