//! Delivery capabilities behind traits.
//!
//! The executor talks to a `Mailer`, a `FormClient`, and a `PresenceProbe`
//! and never learns which wire sits behind them. Production implementations
//! speak HTTP through reqwest with explicit timeouts; tests swap in
//! scripted fakes. Failures travel as `DeliveryError` values carrying a
//! stable code and a transience flag, because the retry loop and the DLQ
//! care about *what kind* of failure occurred, not just that one did.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OptoutError, Result};
use crate::merkle::sha256_hex;
use crate::profile::ControllerProfile;
use crate::subject::Subject;
use crate::types::ErrorCode;

// ---------------------------------------------------------------------------
// Delivery errors
// ---------------------------------------------------------------------------

/// A failed delivery step. `transient` decides whether the retry loop may
/// try again; the code and note end up on the attempt row (redacted, notes
/// never carry raw response bodies).
#[derive(Debug, Clone)]
pub struct DeliveryError {
    pub code: ErrorCode,
    pub note: String,
    pub transient: bool,
}

impl DeliveryError {
    pub fn transient(code: ErrorCode, note: impl Into<String>) -> Self {
        Self {
            code,
            note: note.into(),
            transient: true,
        }
    }

    pub fn permanent(code: ErrorCode, note: impl Into<String>) -> Self {
        Self {
            code,
            note: note.into(),
            transient: false,
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.note)
    }
}

impl std::error::Error for DeliveryError {}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Receipt from a webform, portal, or API submission.
#[derive(Debug, Clone)]
pub struct FormReceipt {
    pub status: u16,
    pub provider_id: Option<String>,
}

/// Outcome of probing a controller's public surface for a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSignal {
    pub data_found: bool,
    pub confidence: f64,
    /// SHA-256 of the capture. The capture itself is never persisted.
    pub capture_hash: String,
}

pub trait Mailer: Send + Sync {
    /// Send one message, returning the provider's message id.
    fn send(&self, to: &str, subject: &str, body: &str)
        -> std::result::Result<String, DeliveryError>;
}

pub trait FormClient: Send + Sync {
    /// Submit form-encoded fields (webform and portal targets).
    fn submit(
        &self,
        url: &str,
        fields: &BTreeMap<String, String>,
    ) -> std::result::Result<FormReceipt, DeliveryError>;

    /// Post a JSON body (api targets).
    fn call(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<FormReceipt, DeliveryError>;
}

pub trait PresenceProbe: Send + Sync {
    fn probe(
        &self,
        profile: &ControllerProfile,
        subject: &Subject,
    ) -> std::result::Result<PresenceSignal, DeliveryError>;
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn classify_request_error(e: &reqwest::Error) -> DeliveryError {
    if e.is_timeout() {
        DeliveryError::transient(ErrorCode::SendTimeout, "request timed out")
    } else if e.is_builder() {
        // Unparseable endpoint url; retrying cannot help.
        DeliveryError::permanent(ErrorCode::MalformedTarget, e.to_string())
    } else {
        DeliveryError::transient(ErrorCode::ConnectFailed, e.to_string())
    }
}

fn classify_status(status: u16) -> Option<DeliveryError> {
    match status {
        429 => Some(DeliveryError::transient(
            ErrorCode::RateLimited,
            "upstream returned 429",
        )),
        s if s >= 500 => Some(DeliveryError::transient(
            ErrorCode::Http5xx,
            format!("upstream returned {s}"),
        )),
        s if s >= 400 => Some(DeliveryError::permanent(
            ErrorCode::Http4xx,
            format!("upstream returned {s}"),
        )),
        _ => None,
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .map_err(|e| OptoutError::Transport(e.to_string()))
}

// ---------------------------------------------------------------------------
// HTTP mailer
// ---------------------------------------------------------------------------

/// Mailer that posts JSON to a configured relay endpoint. Without a relay
/// URL every send fails permanently with `not_configured`.
pub struct HttpMailer {
    client: reqwest::blocking::Client,
    relay_url: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(relay_url: Option<String>, from: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            relay_url,
            from: from.into(),
        })
    }
}

impl Mailer for HttpMailer {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<String, DeliveryError> {
        let Some(relay) = &self.relay_url else {
            return Err(DeliveryError::permanent(
                ErrorCode::NotConfigured,
                "no mail relay url configured",
            ));
        };
        let response = self
            .client
            .post(relay)
            .json(&serde_json::json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send()
            .map_err(|e| classify_request_error(&e))?;
        if let Some(err) = classify_status(response.status().as_u16()) {
            return Err(err);
        }
        // Relays that return {"id": ...} get credited; otherwise the
        // attempt row carries a locally generated reference.
        let id = response
            .json::<serde_json::Value>()
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
            .unwrap_or_else(|| format!("local-{}", Uuid::new_v4()));
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// HTTP form client
// ---------------------------------------------------------------------------

pub struct HttpFormClient {
    client: reqwest::blocking::Client,
}

impl HttpFormClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    fn receipt(
        response: reqwest::blocking::Response,
    ) -> std::result::Result<FormReceipt, DeliveryError> {
        let status = response.status().as_u16();
        if let Some(err) = classify_status(status) {
            return Err(err);
        }
        let provider_id = response
            .json::<serde_json::Value>()
            .ok()
            .and_then(|v| {
                v.get("id")
                    .or_else(|| v.get("reference"))
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
            });
        Ok(FormReceipt {
            status,
            provider_id,
        })
    }
}

impl FormClient for HttpFormClient {
    fn submit(
        &self,
        url: &str,
        fields: &BTreeMap<String, String>,
    ) -> std::result::Result<FormReceipt, DeliveryError> {
        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .map_err(|e| classify_request_error(&e))?;
        Self::receipt(response)
    }

    fn call(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<FormReceipt, DeliveryError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|e| classify_request_error(&e))?;
        Self::receipt(response)
    }
}

// ---------------------------------------------------------------------------
// HTTP presence probe
// ---------------------------------------------------------------------------

/// Probe that fetches the controller's public profile or search surface and
/// scans the capture for the subject's identifiers. Only the capture's hash
/// leaves this function.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

impl PresenceProbe for HttpProbe {
    fn probe(
        &self,
        profile: &ControllerProfile,
        subject: &Subject,
    ) -> std::result::Result<PresenceSignal, DeliveryError> {
        let Some(url) = &profile.probe_url else {
            return Err(DeliveryError::permanent(
                ErrorCode::NotConfigured,
                format!("controller '{}' has no probe url", profile.key),
            ));
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| classify_request_error(&e))?;
        if let Some(err) = classify_status(response.status().as_u16()) {
            return Err(err);
        }
        let capture = response
            .text()
            .map_err(|e| DeliveryError::transient(ErrorCode::ProbeFailed, e.to_string()))?;
        let capture_hash = sha256_hex(capture.as_bytes());

        let haystack = capture.to_lowercase();
        let normalized = subject.normalized();
        let email_hit = normalized
            .email
            .as_deref()
            .map(|e| haystack.contains(e))
            .unwrap_or(false);
        let name_hit = normalized
            .name
            .as_deref()
            .map(|n| haystack.contains(&n.to_lowercase()))
            .unwrap_or(false);

        // An email match is near-certain identification; a bare name match
        // is weak; absence is good but a page can hide data behind search.
        let signal = if email_hit {
            PresenceSignal {
                data_found: true,
                confidence: 0.9,
                capture_hash,
            }
        } else if name_hit {
            PresenceSignal {
                data_found: true,
                confidence: 0.6,
                capture_hash,
            }
        } else {
            PresenceSignal {
                data_found: false,
                confidence: 0.8,
                capture_hash,
            }
        };
        Ok(signal)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
