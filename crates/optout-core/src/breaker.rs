//! Per-controller circuit breaker over a trailing failure window.
//!
//! Breaker state is derived, never stored: a controller is open when the
//! `failures` table holds at least `failure_threshold` events for it inside
//! the trailing `window_minutes`. Successes are not recorded, so the breaker
//! closes on its own as failures age out of the window.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::attempt::FailureEvent;
use crate::error::Result;
use crate::store::Store;
use crate::types::ErrorCode;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn default_failure_threshold() -> u64 {
    8
}

fn default_window_minutes() -> i64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failures within the window that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u64,
    /// Trailing window length in minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_minutes: default_window_minutes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BreakerDecision {
    pub allow: bool,
    pub recent_failures: u64,
}

/// Decide whether a dispatch to `controller_key` may proceed.
///
/// A store error fails open: the dispatch is allowed and the error logged.
/// An unreadable failure window must not take the whole pipeline down.
pub fn check(
    store: &Store,
    config: &BreakerConfig,
    controller_key: &str,
    now: DateTime<Utc>,
) -> BreakerDecision {
    let since = now - Duration::minutes(config.window_minutes);
    match store.count_failures_since(controller_key, since) {
        Ok(recent_failures) => BreakerDecision {
            allow: recent_failures < config.failure_threshold,
            recent_failures,
        },
        Err(e) => {
            tracing::warn!(
                controller = controller_key,
                error = %e,
                "breaker window query failed, allowing dispatch"
            );
            BreakerDecision {
                allow: true,
                recent_failures: 0,
            }
        }
    }
}

/// Record one delivery failure for the breaker window. Breaker-open
/// rejections are never fed back through here.
pub fn record_failure(
    store: &Store,
    controller_key: &str,
    code: ErrorCode,
    note: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    store.record_failure(&FailureEvent::new(controller_key, code, note, now))
}

// ---------------------------------------------------------------------------
// Status view
// ---------------------------------------------------------------------------

/// Per-controller breaker snapshot for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerState {
    pub controller_key: String,
    pub recent_failures: u64,
    pub open: bool,
}

/// Breaker state for every controller with at least one failure in the
/// window, sorted by controller key.
pub fn state(store: &Store, config: &BreakerConfig, now: DateTime<Utc>) -> Result<Vec<BreakerState>> {
    let since = now - Duration::minutes(config.window_minutes);
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for event in store.failures_since(since)? {
        *counts.entry(event.controller_key).or_insert(0) += 1;
    }
    Ok(counts
        .into_iter()
        .map(|(controller_key, recent_failures)| BreakerState {
            open: recent_failures >= config.failure_threshold,
            controller_key,
            recent_failures,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as CDur;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn fail_n(store: &Store, controller: &str, n: u64, at: DateTime<Utc>) {
        for _ in 0..n {
            record_failure(store, controller, ErrorCode::Http5xx, "503", at).unwrap();
        }
    }

    #[test]
    fn closed_below_threshold() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let config = BreakerConfig::default();
        fail_n(&store, "naukri", 7, now - CDur::minutes(1));

        let decision = check(&store, &config, "naukri", now);
        assert!(decision.allow);
        assert_eq!(decision.recent_failures, 7);
    }

    #[test]
    fn opens_at_threshold() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let config = BreakerConfig::default();
        fail_n(&store, "naukri", 8, now - CDur::minutes(1));

        let decision = check(&store, &config, "naukri", now);
        assert!(!decision.allow);
        assert_eq!(decision.recent_failures, 8);
    }

    #[test]
    fn failures_age_out_of_the_window() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let config = BreakerConfig::default();
        fail_n(&store, "naukri", 8, now - CDur::minutes(20));

        let decision = check(&store, &config, "naukri", now);
        assert!(decision.allow);
        assert_eq!(decision.recent_failures, 0);
    }

    #[test]
    fn controllers_are_isolated() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let config = BreakerConfig::default();
        fail_n(&store, "naukri", 8, now - CDur::minutes(1));

        assert!(!check(&store, &config, "naukri", now).allow);
        assert!(check(&store, &config, "shine", now).allow);
    }

    #[test]
    fn state_reports_open_and_closed_controllers() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let config = BreakerConfig::default();
        fail_n(&store, "naukri", 8, now - CDur::minutes(1));
        fail_n(&store, "shine", 2, now - CDur::minutes(1));

        let snapshot = state(&store, &config, now).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].controller_key, "naukri");
        assert!(snapshot[0].open);
        assert_eq!(snapshot[1].controller_key, "shine");
        assert!(!snapshot[1].open);
        assert_eq!(snapshot[1].recent_failures, 2);
    }

    #[test]
    fn custom_threshold_is_honored() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let config = BreakerConfig {
            failure_threshold: 2,
            window_minutes: 15,
        };
        fail_n(&store, "naukri", 2, now - CDur::minutes(1));
        assert!(!check(&store, &config, "naukri", now).allow);
    }
}
