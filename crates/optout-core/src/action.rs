//! The durable lifecycle record of one removal request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OptoutError, Result};
use crate::store::{Store, Transition};
use crate::subject::Subject;
use crate::types::{ActionStatus, Channel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub controller_key: String,
    pub subject_id: String,
    pub subject: Subject,
    pub channel: Channel,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// SLA window in days, effective at dispatch time. The SLA sweep prefers
    /// the controller's current value and falls back to this snapshot.
    pub sla_days: u32,
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_id: Option<Uuid>,
    /// Capture hashes appended by the verification sweep. Raw captures are
    /// never stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_hashes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Action {
    pub fn new(
        controller_key: impl Into<String>,
        subject: Subject,
        channel: Channel,
        locale: Option<String>,
        sla_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let subject_id = subject.subject_id();
        Self {
            id: Uuid::new_v4(),
            controller_key: controller_key.into(),
            subject_id,
            subject,
            channel,
            status: ActionStatus::Draft,
            locale,
            sla_days,
            retries: 0,
            last_error: None,
            provider_id: None,
            proof_id: None,
            evidence_hashes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Due date for SLA purposes, given an effective window in days.
    pub fn due_at(&self, sla_days: u32) -> DateTime<Utc> {
        self.created_at + chrono::Duration::days(i64::from(sla_days))
    }
}

/// Operator cancel. Valid from any non-terminal status; the row stays in
/// place with a terminal status, it is never deleted.
pub fn cancel(store: &Store, id: Uuid, now: DateTime<Utc>) -> Result<Action> {
    let non_terminal: Vec<ActionStatus> = ActionStatus::all()
        .iter()
        .copied()
        .filter(|s| !s.is_terminal())
        .collect();
    match store.transition_action(id, &non_terminal, ActionStatus::Cancelled, now)? {
        Transition::Applied(action) => Ok(action),
        Transition::Skipped { actual } => Err(OptoutError::InvalidTransition {
            from: actual.to_string(),
            to: ActionStatus::Cancelled.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_action_starts_in_draft() {
        let subject = Subject {
            name: None,
            email: Some("rahul@example.com".to_string()),
            phone: None,
        };
        let now = Utc::now();
        let action = Action::new("naukri", subject, Channel::Email, None, 30, now);
        assert_eq!(action.status, ActionStatus::Draft);
        assert_eq!(action.retries, 0);
        assert_eq!(action.subject_id.len(), 16);
        assert_eq!(action.created_at, now);
    }

    #[test]
    fn due_at_adds_whole_days() {
        let subject = Subject {
            name: Some("Rahul".to_string()),
            email: None,
            phone: None,
        };
        let now = Utc::now();
        let action = Action::new("naukri", subject, Channel::Email, None, 30, now);
        assert_eq!(action.due_at(30), now + chrono::Duration::days(30));
        assert_eq!(action.due_at(45), now + chrono::Duration::days(45));
    }

    #[test]
    fn serde_round_trip() {
        let subject = Subject {
            name: Some("Rahul".to_string()),
            email: Some("rahul@example.com".to_string()),
            phone: None,
        };
        let action = Action::new("naukri", subject, Channel::Email, Some("en-IN".into()), 30, Utc::now());
        let json = serde_json::to_string(&action).unwrap();
        let parsed: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, action.id);
        assert_eq!(parsed.status, ActionStatus::Draft);
        assert_eq!(parsed.sla_days, 30);
    }

    #[test]
    fn cancel_is_terminal_and_rejects_a_second_cancel() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("t.db")).unwrap();
        let subject = Subject {
            name: Some("Rahul".to_string()),
            email: None,
            phone: None,
        };
        let now = Utc::now();
        let action = Action::new("naukri", subject, Channel::Email, None, 30, now);
        store.insert_action(&action).unwrap();

        let cancelled = cancel(&store, action.id, now).unwrap();
        assert_eq!(cancelled.status, ActionStatus::Cancelled);
        assert!(matches!(
            cancel(&store, action.id, now),
            Err(OptoutError::InvalidTransition { .. })
        ));
    }
}
