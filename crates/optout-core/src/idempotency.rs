//! Idempotency keys and cached dispatch outcomes.
//!
//! The key is a SHA-256 over a canonical, timestamp-free serialization of
//! (controller key, normalized subject identity, request kind, locale).
//! Storage enforces insert-at-most-once; a second insert surfaces as
//! `Ensure::Exists` carrying the prior record so the caller can replay the
//! recorded outcome instead of sending again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merkle::sha256_hex;
use crate::subject::Subject;

/// What a dispatch call does once it owns (or fails to claim) a key.
#[derive(Debug)]
pub enum Ensure {
    /// First time seen; the caller proceeds with delivery.
    Claimed,
    /// A prior dispatch holds this key; its record is returned for replay.
    Exists(IdempotencyRecord),
}

/// Outcome state cached under an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// Claimed, delivery not yet concluded.
    InProgress,
    /// Delivered; `provider_id` carries the cached receipt.
    Sent,
    /// Transient failure exhausted retries; a DLQ entry owns redelivery.
    Queued,
    /// Non-transient failure recorded. Does not block a fresh dispatch.
    Failed,
}

impl IdempotencyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IdempotencyStatus::InProgress => "in_progress",
            IdempotencyStatus::Sent => "sent",
            IdempotencyStatus::Queued => "queued",
            IdempotencyStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub status: IdempotencyStatus,
    pub action_id: uuid::Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<crate::types::ErrorCode>,
    pub first_seen: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn in_progress(action_id: uuid::Uuid, now: DateTime<Utc>) -> Self {
        Self {
            status: IdempotencyStatus::InProgress,
            action_id,
            provider_id: None,
            error_code: None,
            first_seen: now,
        }
    }
}

/// Derive the dispatch key. Pure function of the request's semantic content;
/// timestamps and display-only fields never participate.
pub fn dispatch_key(controller_key: &str, subject: &Subject, locale: Option<&str>) -> String {
    let identity = subject.normalized();
    let canonical = serde_json::json!({
        "controller": controller_key,
        "subject": {
            "name": identity.name.as_deref().map(str::to_lowercase),
            "email": identity.email,
            "phone": identity.phone,
        },
        "kind": "data_removal",
        "locale": locale.map(str::to_lowercase),
    });
    // serde_json orders object keys deterministically and the structure is
    // fixed, so this serialization is canonical.
    sha256_hex(canonical.to_string().as_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
