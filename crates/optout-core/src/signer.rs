//! Root signing for the proof ledger.
//!
//! Running unsigned is a deliberate configuration, not a degraded one: with
//! no key configured the ledger commits unsigned records and verification
//! reports the signature check as not applicable. A present-but-broken key
//! is an error, never a silent fallback to unsigned.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{OptoutError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Identifier recorded on signed records and in exported bundles.
pub const SIGNING_ALGORITHM: &str = "hmac-sha256";

pub enum Signer {
    Disabled,
    HmacSha256 { key: Vec<u8>, key_id: String },
}

impl Signer {
    /// Build from an optional base64 key. `None` or an empty value selects
    /// the disabled mode; a malformed or short key is rejected.
    pub fn from_base64(key_b64: Option<&str>, key_id: Option<&str>) -> Result<Self> {
        let Some(raw) = key_b64.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Signer::Disabled);
        };
        let key = base64::engine::general_purpose::STANDARD
            .decode(raw)
            .map_err(|e| OptoutError::SigningKeyInvalid(e.to_string()))?;
        if key.len() < 16 {
            return Err(OptoutError::SigningKeyInvalid(
                "key must decode to at least 16 bytes".to_string(),
            ));
        }
        Ok(Signer::HmacSha256 {
            key,
            key_id: key_id.unwrap_or("default").to_string(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Signer::HmacSha256 { .. })
    }

    pub fn key_id(&self) -> Option<&str> {
        match self {
            Signer::Disabled => None,
            Signer::HmacSha256 { key_id, .. } => Some(key_id),
        }
    }

    /// Sign the ASCII hex of a root. `None` when signing is disabled.
    pub fn sign(&self, root_hex: &str) -> Result<Option<String>> {
        match self {
            Signer::Disabled => Ok(None),
            Signer::HmacSha256 { key, .. } => {
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| OptoutError::SigningKeyInvalid(e.to_string()))?;
                mac.update(root_hex.as_bytes());
                Ok(Some(hex::encode(mac.finalize().into_bytes())))
            }
        }
    }

    /// Check a signature against a root. `None` when no key is configured,
    /// `Some(false)` for a wrong or malformed signature.
    pub fn verify(&self, root_hex: &str, signature_hex: &str) -> Result<Option<bool>> {
        match self {
            Signer::Disabled => Ok(None),
            Signer::HmacSha256 { key, .. } => {
                let Ok(signature) = hex::decode(signature_hex) else {
                    return Ok(Some(false));
                };
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| OptoutError::SigningKeyInvalid(e.to_string()))?;
                mac.update(root_hex.as_bytes());
                Ok(Some(mac.verify_slice(&signature).is_ok()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
