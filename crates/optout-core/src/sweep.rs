//! Verification sweep: re-check whether dispatched removals actually took.
//!
//! For a bounded batch of `sent` and `escalate_pending` actions the sweep
//! probes the controller's public surface, stores the capture's hash as
//! evidence, and settles the action: `verified` when the subject's data is
//! gone, `needs_review` when it still shows. Transitions are conditional on
//! the status observed at scan time, so an overlapping SLA sweep cannot be
//! clobbered.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::merkle;
use crate::profile::ProfileRegistry;
use crate::store::{Store, Transition};
use crate::transport::PresenceProbe;
use crate::types::ActionStatus;

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub checked: u64,
    pub verified: u64,
    pub needs_review: u64,
}

/// Probe up to `limit` due actions and settle each one.
///
/// Per-item failures (probe errors, missing profiles, malformed capture
/// hashes) are logged and skipped; the batch always runs to completion.
pub fn run_verification_sweep(
    store: &Store,
    registry: &ProfileRegistry,
    probe: &dyn PresenceProbe,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<VerifyReport> {
    let candidates =
        store.actions_in_status(&[ActionStatus::Sent, ActionStatus::EscalatePending])?;
    let mut report = VerifyReport {
        checked: 0,
        verified: 0,
        needs_review: 0,
    };
    for action in candidates.into_iter().take(limit) {
        report.checked += 1;

        let profile = match registry.get(&action.controller_key) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(action_id = %action.id, error = %e, "no profile for action, skipping");
                continue;
            }
        };
        let signal = match probe.probe(profile, &action.subject) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(
                    action_id = %action.id,
                    controller = %action.controller_key,
                    error = %e,
                    "probe failed, skipping"
                );
                continue;
            }
        };
        let capture_hash = match merkle::normalize_evidence_hash(&signal.capture_hash) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(action_id = %action.id, error = %e, "probe returned a bad capture hash");
                continue;
            }
        };

        let next = if signal.data_found {
            ActionStatus::NeedsReview
        } else {
            ActionStatus::Verified
        };
        // Evidence append and transition share one conditional write, keyed
        // on the status this scan observed.
        let observed = action.status;
        let outcome = store.update_action_if(action.id, &[observed], now, |a| {
            if !a.evidence_hashes.contains(&capture_hash) {
                a.evidence_hashes.push(capture_hash.clone());
            }
            a.status = next;
        })?;
        match outcome {
            Transition::Applied(_) => {
                if signal.data_found {
                    report.needs_review += 1;
                } else {
                    report.verified += 1;
                }
                tracing::info!(
                    action_id = %action.id,
                    controller = %action.controller_key,
                    data_found = signal.data_found,
                    confidence = signal.confidence,
                    status = %next,
                    "verification settled"
                );
            }
            Transition::Skipped { actual } => {
                tracing::debug!(
                    action_id = %action.id,
                    actual = %actual,
                    "action changed status mid-sweep, not settled"
                );
            }
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::merkle::sha256_hex;
    use crate::profile::ControllerProfile;
    use crate::subject::Subject;
    use crate::transport::{DeliveryError, PresenceSignal};
    use crate::types::{Channel, ErrorCode};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedProbe {
        signals: Mutex<VecDeque<std::result::Result<PresenceSignal, DeliveryError>>>,
    }

    impl ScriptedProbe {
        fn new(signals: Vec<std::result::Result<PresenceSignal, DeliveryError>>) -> Self {
            Self {
                signals: Mutex::new(signals.into()),
            }
        }
    }

    impl PresenceProbe for ScriptedProbe {
        fn probe(
            &self,
            _profile: &ControllerProfile,
            _subject: &Subject,
        ) -> std::result::Result<PresenceSignal, DeliveryError> {
            self.signals
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DeliveryError::permanent(ErrorCode::ProbeFailed, "script empty")))
        }
    }

    fn gone(hash: &str) -> std::result::Result<PresenceSignal, DeliveryError> {
        Ok(PresenceSignal {
            data_found: false,
            confidence: 0.8,
            capture_hash: hash.to_string(),
        })
    }

    fn still_there(hash: &str) -> std::result::Result<PresenceSignal, DeliveryError> {
        Ok(PresenceSignal {
            data_found: true,
            confidence: 0.9,
            capture_hash: hash.to_string(),
        })
    }

    fn open_tmp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn action_in(store: &Store, status: ActionStatus, created: DateTime<Utc>) -> Action {
        let subject = Subject {
            name: Some("Rahul".to_string()),
            email: Some("rahul@example.com".to_string()),
            phone: None,
        };
        let action = Action::new("naukri", subject, Channel::Email, None, 30, created);
        store.insert_action(&action).unwrap();
        if status != ActionStatus::Draft {
            store
                .transition_action(action.id, &[ActionStatus::Draft], status, created)
                .unwrap();
        }
        store.get_action(action.id).unwrap()
    }

    #[test]
    fn data_gone_settles_verified_with_evidence() {
        let (_dir, store) = open_tmp();
        let registry = ProfileRegistry::seed();
        let now = Utc::now();
        let action = action_in(&store, ActionStatus::Sent, now);
        let hash = sha256_hex(b"capture-1");
        let probe = ScriptedProbe::new(vec![gone(&hash)]);

        let report = run_verification_sweep(&store, &registry, &probe, 10, now).unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.verified, 1);
        assert_eq!(report.needs_review, 0);

        let settled = store.get_action(action.id).unwrap();
        assert_eq!(settled.status, ActionStatus::Verified);
        assert_eq!(settled.evidence_hashes, vec![hash]);
    }

    #[test]
    fn data_still_present_settles_needs_review() {
        let (_dir, store) = open_tmp();
        let registry = ProfileRegistry::seed();
        let now = Utc::now();
        let action = action_in(&store, ActionStatus::Sent, now);
        let hash = sha256_hex(b"capture-2");
        let probe = ScriptedProbe::new(vec![still_there(&hash)]);

        let report = run_verification_sweep(&store, &registry, &probe, 10, now).unwrap();
        assert_eq!(report.needs_review, 1);
        assert_eq!(
            store.get_action(action.id).unwrap().status,
            ActionStatus::NeedsReview
        );
    }

    #[test]
    fn escalate_pending_actions_are_probed_too() {
        let (_dir, store) = open_tmp();
        let registry = ProfileRegistry::seed();
        let now = Utc::now();
        let action = action_in(&store, ActionStatus::EscalatePending, now);
        let hash = sha256_hex(b"capture-3");
        let probe = ScriptedProbe::new(vec![gone(&hash)]);

        let report = run_verification_sweep(&store, &registry, &probe, 10, now).unwrap();
        assert_eq!(report.verified, 1);
        assert_eq!(
            store.get_action(action.id).unwrap().status,
            ActionStatus::Verified
        );
    }

    #[test]
    fn limit_bounds_the_batch() {
        let (_dir, store) = open_tmp();
        let registry = ProfileRegistry::seed();
        let now = Utc::now();
        for i in 0..3 {
            action_in(&store, ActionStatus::Sent, now - chrono::Duration::minutes(i));
        }
        let hash = sha256_hex(b"capture-4");
        let probe = ScriptedProbe::new(vec![gone(&hash), gone(&hash), gone(&hash)]);

        let report = run_verification_sweep(&store, &registry, &probe, 2, now).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.verified, 2);
    }

    #[test]
    fn probe_error_skips_the_item_and_continues() {
        let (_dir, store) = open_tmp();
        let registry = ProfileRegistry::seed();
        let now = Utc::now();
        let failing = action_in(&store, ActionStatus::Sent, now - chrono::Duration::minutes(2));
        let passing = action_in(&store, ActionStatus::Sent, now - chrono::Duration::minutes(1));
        let hash = sha256_hex(b"capture-5");
        let probe = ScriptedProbe::new(vec![
            Err(DeliveryError::transient(ErrorCode::SendTimeout, "probe t/o")),
            gone(&hash),
        ]);

        let report = run_verification_sweep(&store, &registry, &probe, 10, now).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.verified, 1);
        assert_eq!(store.get_action(failing.id).unwrap().status, ActionStatus::Sent);
        assert_eq!(
            store.get_action(passing.id).unwrap().status,
            ActionStatus::Verified
        );
    }

    #[test]
    fn bad_capture_hash_is_rejected_without_settling() {
        let (_dir, store) = open_tmp();
        let registry = ProfileRegistry::seed();
        let now = Utc::now();
        let action = action_in(&store, ActionStatus::Sent, now);
        let probe = ScriptedProbe::new(vec![gone("not-a-hash")]);

        let report = run_verification_sweep(&store, &registry, &probe, 10, now).unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.verified, 0);
        let untouched = store.get_action(action.id).unwrap();
        assert_eq!(untouched.status, ActionStatus::Sent);
        assert!(untouched.evidence_hashes.is_empty());
    }
}
