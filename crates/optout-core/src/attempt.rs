//! Append-only delivery audit rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Channel, ErrorCode};

/// One execution try for an action. Many attempts may belong to one action;
/// rows are never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchAttempt {
    pub id: Uuid,
    pub action_id: Uuid,
    /// Per-action sequence number, assigned by the store on append.
    #[serde(default)]
    pub seq: u32,
    pub channel: Channel,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Redacted response note. Raw provider responses are never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl DispatchAttempt {
    pub fn success(
        action_id: Uuid,
        channel: Channel,
        provider_id: Option<String>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_id,
            seq: 0,
            channel,
            ok: true,
            error_code: None,
            note,
            provider_id,
            at: now,
        }
    }

    pub fn failure(
        action_id: Uuid,
        channel: Channel,
        code: ErrorCode,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_id,
            seq: 0,
            channel,
            ok: false,
            error_code: Some(code),
            note: Some(note.into()),
            provider_id: None,
            at: now,
        }
    }
}

/// One failure signal for the circuit breaker's trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    pub id: Uuid,
    pub controller_key: String,
    pub code: ErrorCode,
    pub note: String,
    pub at: DateTime<Utc>,
}

impl FailureEvent {
    pub fn new(
        controller_key: impl Into<String>,
        code: ErrorCode,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            controller_key: controller_key.into(),
            code,
            note: note.into(),
            at: now,
        }
    }
}
