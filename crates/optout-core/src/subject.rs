//! Data-subject identity and normalization.
//!
//! Subjects arrive from the trigger surface with any mix of name, email, and
//! phone. Normalization produces the canonical identity the idempotency key
//! and presence probes operate on, so formatting differences ("Rahul " vs
//! "rahul") never cause a duplicate external send.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{OptoutError, Result};

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// Identity of the person a removal request is filed for. Every field is
/// optional but at least one must be present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Subject {
    pub fn validate(&self) -> Result<()> {
        let normalized = self.normalized();
        if normalized.name.is_none() && normalized.email.is_none() && normalized.phone.is_none() {
            return Err(OptoutError::InvalidSubject(
                "at least one of name, email, phone is required".to_string(),
            ));
        }
        if let Some(email) = &normalized.email {
            if !email_re().is_match(email) {
                return Err(OptoutError::InvalidSubject(format!(
                    "malformed email address: {email}"
                )));
            }
        }
        Ok(())
    }

    /// Canonical form: trimmed, email lowercased, phone reduced to digits.
    /// Empty-after-normalization fields collapse to `None`.
    pub fn normalized(&self) -> Subject {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Subject {
            name: clean(&self.name),
            email: clean(&self.email).map(|e| e.to_lowercase()),
            phone: clean(&self.phone).map(|p| p.chars().filter(|c| c.is_ascii_digit()).collect()),
        }
    }

    /// Stable identifier derived from the normalized identity. Two requests
    /// for the same person always land on the same subject id.
    pub fn subject_id(&self) -> String {
        let normalized = self.normalized();
        let canonical = format!(
            "{}|{}|{}",
            normalized.name.as_deref().unwrap_or("").to_lowercase(),
            normalized.email.as_deref().unwrap_or(""),
            normalized.phone.as_deref().unwrap_or("")
        );
        let digest = crate::merkle::sha256_hex(canonical.as_bytes());
        digest[..16].to_string()
    }

    /// Short display form for logs and tables.
    pub fn display(&self) -> String {
        self.email
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.phone.clone())
            .unwrap_or_else(|| "(empty)".to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
