//! Controller profiles and the on-disk registry.
//!
//! A profile describes one third-party data holder: which channels it
//! supports, the endpoint for each, its SLA window, and the verification
//! evidence it demands. Profiles are operator-maintained (YAML) and
//! read-only to the dispatch path.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{OptoutError, Result};
use crate::types::{Channel, VerifyLevel};

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Validate a controller key slug.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 64 || !key_re().is_match(key) {
        return Err(OptoutError::InvalidControllerKey(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ControllerProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerProfile {
    pub key: String,
    pub name: String,
    /// ISO country/region code ("IN", "US-CA", "DE"). Used when the request
    /// locale does not carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub channels: Vec<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_channel: Option<Channel>,
    /// Controller-specific SLA override in days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webform_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Public surface the verification sweep probes for continued presence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_url: Option<String>,
    #[serde(default)]
    pub verify_level: VerifyLevel,
}

impl ControllerProfile {
    pub fn endpoint_for(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Email => self.email.as_deref(),
            Channel::Webform => self.webform_url.as_deref(),
            Channel::Portal => self.portal_url.as_deref(),
            Channel::Api => self.api_url.as_deref(),
        }
    }

    /// A profile is dispatchable only if at least one channel endpoint exists.
    pub fn is_dispatchable(&self) -> bool {
        Channel::all().iter().any(|c| self.endpoint_for(*c).is_some())
    }
}

// ---------------------------------------------------------------------------
// ProfileRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    controllers: Vec<ControllerProfile>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ControllerProfile>,
}

impl ProfileRegistry {
    /// Load the registry from `path`, falling back to the built-in seed set
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::seed());
        }
        let data = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_yaml::from_str(&data)?;
        let mut registry = Self::default();
        for profile in file.controllers {
            validate_key(&profile.key)?;
            registry.profiles.insert(profile.key.clone(), profile);
        }
        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = RegistryFile {
            version: 1,
            controllers: self.profiles.values().cloned().collect(),
        };
        let data = serde_yaml::to_string(&file)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn get(&self, key: &str) -> Result<&ControllerProfile> {
        self.profiles
            .get(key)
            .ok_or_else(|| OptoutError::UnknownController(key.to_string()))
    }

    pub fn list(&self) -> Vec<&ControllerProfile> {
        self.profiles.values().collect()
    }

    pub fn insert(&mut self, profile: ControllerProfile) -> Result<()> {
        validate_key(&profile.key)?;
        self.profiles.insert(profile.key.clone(), profile);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Built-in starter profiles for common controllers.
    pub fn seed() -> Self {
        let mut registry = Self::default();
        let seeds = vec![
            ControllerProfile {
                key: "naukri".to_string(),
                name: "Naukri".to_string(),
                region: Some("IN".to_string()),
                channels: vec![Channel::Email],
                preferred_channel: None,
                sla_days: Some(30),
                email: Some("privacy@naukri.com".to_string()),
                email_subject: Some("Data removal request for {name}".to_string()),
                webform_url: None,
                portal_url: None,
                api_url: None,
                probe_url: Some("https://www.naukri.com/mnjuser/profile".to_string()),
                verify_level: VerifyLevel::Email,
            },
            ControllerProfile {
                key: "shine".to_string(),
                name: "Shine Jobs".to_string(),
                region: Some("IN".to_string()),
                channels: vec![Channel::Email],
                preferred_channel: None,
                sla_days: Some(30),
                email: Some("privacy@shine.com".to_string()),
                email_subject: None,
                webform_url: None,
                portal_url: None,
                api_url: None,
                probe_url: None,
                verify_level: VerifyLevel::Email,
            },
            ControllerProfile {
                key: "whitepages".to_string(),
                name: "Whitepages".to_string(),
                region: Some("US".to_string()),
                channels: vec![Channel::Webform],
                preferred_channel: None,
                sla_days: None,
                email: None,
                email_subject: None,
                webform_url: Some("https://www.whitepages.com/suppression-requests".to_string()),
                portal_url: None,
                api_url: None,
                probe_url: Some("https://www.whitepages.com/name".to_string()),
                verify_level: VerifyLevel::None,
            },
            ControllerProfile {
                key: "spokeo".to_string(),
                name: "Spokeo".to_string(),
                region: Some("US".to_string()),
                channels: vec![Channel::Email, Channel::Webform],
                preferred_channel: Some(Channel::Webform),
                sla_days: None,
                email: Some("support@spokeo.com".to_string()),
                email_subject: None,
                webform_url: Some("https://www.spokeo.com/optout".to_string()),
                portal_url: None,
                api_url: None,
                probe_url: Some("https://www.spokeo.com/search".to_string()),
                verify_level: VerifyLevel::None,
            },
            ControllerProfile {
                key: "acxiom".to_string(),
                name: "Acxiom".to_string(),
                region: Some("US".to_string()),
                channels: vec![Channel::Portal],
                preferred_channel: None,
                sla_days: Some(45),
                email: None,
                email_subject: None,
                webform_url: None,
                portal_url: Some("https://isapps.acxiom.com/optout/optout.aspx".to_string()),
                api_url: None,
                probe_url: None,
                verify_level: VerifyLevel::Document,
            },
        ];
        for profile in seeds {
            registry.profiles.insert(profile.key.clone(), profile);
        }
        registry
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
