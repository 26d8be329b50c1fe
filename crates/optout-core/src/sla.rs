//! SLA sweep: flag sent actions that have outrun their window.
//!
//! Invoked by an external timer, never by an in-process scheduler. Safe to
//! re-run and to overlap with itself or the verification sweep: only `sent`
//! actions are candidates, and the transition is a conditional update keyed
//! on that prior status, so a second run finds nothing left to flag.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::profile::ProfileRegistry;
use crate::store::{Store, Transition};
use crate::types::ActionStatus;

#[derive(Debug, Clone, Serialize)]
pub struct SlaReport {
    pub scanned: u64,
    pub flagged: u64,
}

/// Scan `sent` actions and move overdue ones to `escalate_pending`.
///
/// The effective window prefers the controller's current profile value and
/// falls back to the snapshot taken at dispatch time. Per-item errors are
/// logged and skipped; one bad row never aborts the sweep.
pub fn run_sla_sweep(
    store: &Store,
    registry: &ProfileRegistry,
    now: DateTime<Utc>,
) -> Result<SlaReport> {
    let candidates = store.actions_in_status(&[ActionStatus::Sent])?;
    let mut report = SlaReport {
        scanned: 0,
        flagged: 0,
    };
    for action in candidates {
        report.scanned += 1;
        let window = registry
            .get(&action.controller_key)
            .ok()
            .and_then(|p| p.sla_days)
            .unwrap_or(action.sla_days);
        let due_at = action.due_at(window);
        if now <= due_at {
            continue;
        }
        match store.transition_action(
            action.id,
            &[ActionStatus::Sent],
            ActionStatus::EscalatePending,
            now,
        ) {
            Ok(Transition::Applied(_)) => {
                report.flagged += 1;
                tracing::info!(
                    action_id = %action.id,
                    controller = %action.controller_key,
                    due = %due_at,
                    "action overdue, flagged for escalation"
                );
            }
            Ok(Transition::Skipped { actual }) => {
                tracing::debug!(
                    action_id = %action.id,
                    actual = %actual,
                    "overdue action changed status mid-sweep"
                );
            }
            Err(e) => {
                tracing::warn!(action_id = %action.id, error = %e, "sla transition failed, skipping");
            }
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
