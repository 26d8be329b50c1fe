//! Legal/communication policy resolution.
//!
//! Merge order, weakest to strongest: global defaults, then the controller
//! profile, then the region rule. Pure lookup with no side effects.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::profile::ProfileRegistry;
use crate::types::{Channel, VerifyLevel};

pub const DEFAULT_SLA_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub sla_days: u32,
    pub required_fields: Vec<String>,
    pub legal_basis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_channel: Option<Channel>,
}

struct RegionRule {
    sla_days: u32,
    legal_basis: &'static str,
}

/// Region rules for the jurisdictions we routinely dispatch into. Region
/// codes are uppercased before lookup; EU member states share the GDPR rule.
fn region_rule(region: &str) -> Option<RegionRule> {
    const EU_MEMBERS: &[&str] = &[
        "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
        "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
    ];
    let code = region.to_uppercase();
    if code == "EU" || EU_MEMBERS.contains(&code.as_str()) {
        return Some(RegionRule {
            sla_days: 30,
            legal_basis: "GDPR Article 17 (right to erasure)",
        });
    }
    match code.as_str() {
        "UK" | "GB" => Some(RegionRule {
            sla_days: 30,
            legal_basis: "UK GDPR Article 17 (right to erasure)",
        }),
        "US-CA" => Some(RegionRule {
            sla_days: 45,
            legal_basis: "CCPA/CPRA Section 1798.105 (right to delete)",
        }),
        "IN" => Some(RegionRule {
            sla_days: 30,
            legal_basis: "DPDP Act 2023 Section 12 (right to erasure)",
        }),
        "BR" => Some(RegionRule {
            sla_days: 15,
            legal_basis: "LGPD Article 18 (elimination of personal data)",
        }),
        _ => None,
    }
}

/// Resolve the effective policy for a controller in a region.
///
/// `region` falls back to the profile's own region when absent. Fails with
/// `UnknownController` when the key has no profile.
pub fn resolve(registry: &ProfileRegistry, controller_key: &str, region: Option<&str>) -> Result<Policy> {
    let profile = registry.get(controller_key)?;

    let mut policy = Policy {
        sla_days: DEFAULT_SLA_DAYS,
        required_fields: vec!["name".to_string(), "email".to_string()],
        legal_basis: "applicable data protection law".to_string(),
        preferred_channel: None,
    };

    // Controller overrides.
    if let Some(days) = profile.sla_days {
        policy.sla_days = days;
    }
    policy.preferred_channel = profile.preferred_channel;
    if profile.verify_level == VerifyLevel::Document {
        policy.required_fields.push("id_document".to_string());
    }

    // Region overrides win over the controller's own defaults.
    let effective_region = region.or(profile.region.as_deref());
    if let Some(rule) = effective_region.and_then(region_rule) {
        policy.sla_days = rule.sla_days;
        policy.legal_basis = rule.legal_basis.to_string();
    }

    Ok(policy)
}

/// Extract a region code from a locale tag.
///
/// "en-IN" yields "IN"; an uppercase subdivision code like "US-CA" passes
/// through whole; a bare uppercase country code ("DE") passes through; a
/// bare language tag ("en") yields nothing.
pub fn region_of_locale(locale: &str) -> Option<String> {
    let tag = locale.trim();
    if tag.is_empty() {
        return None;
    }
    let parts: Vec<&str> = tag.split('-').collect();
    if parts.len() == 2 && parts[0].len() == 2 && parts[0].chars().all(|c| c.is_ascii_uppercase()) {
        return Some(tag.to_uppercase());
    }
    let last = parts.last().copied().unwrap_or("");
    if last.len() == 2 && last.chars().all(|c| c.is_ascii_uppercase()) {
        return Some(last.to_string());
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
