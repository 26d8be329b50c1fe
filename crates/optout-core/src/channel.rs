//! Channel resolution: profile to concrete delivery target.
//!
//! Selection is deliberately conservative. A single supported channel is
//! used as-is; several require an explicit `preferred_channel`; a chosen
//! channel without its endpoint is a hard failure. The resolver never falls
//! back to another channel on its own; fallbacks are policy, not magic.

use serde::{Deserialize, Serialize};

use crate::error::{OptoutError, Result};
use crate::profile::ControllerProfile;
use crate::types::Channel;

// ---------------------------------------------------------------------------
// ChannelTarget
// ---------------------------------------------------------------------------

/// One concrete delivery target. Tagged so the dispatcher must handle every
/// kind exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelTarget {
    Email { to: String, subject_template: String },
    Webform { url: String },
    Portal { url: String },
    Api { url: String },
}

const DEFAULT_EMAIL_SUBJECT: &str = "Personal data removal request";

impl ChannelTarget {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelTarget::Email { .. } => Channel::Email,
            ChannelTarget::Webform { .. } => Channel::Webform,
            ChannelTarget::Portal { .. } => Channel::Portal,
            ChannelTarget::Api { .. } => Channel::Api,
        }
    }

    /// Display label for receipts and logs, e.g. `email:privacy@naukri.com`.
    pub fn label(&self) -> String {
        match self {
            ChannelTarget::Email { to, .. } => format!("email:{to}"),
            ChannelTarget::Webform { url } => format!("webform:{url}"),
            ChannelTarget::Portal { url } => format!("portal:{url}"),
            ChannelTarget::Api { url } => format!("api:{url}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Pick the delivery channel for a profile and bind its endpoint.
pub fn resolve_target(profile: &ControllerProfile) -> Result<ChannelTarget> {
    let channel = match profile.channels.as_slice() {
        [] => return Err(OptoutError::NoHandlerFound(profile.key.clone())),
        [only] => *only,
        _ => profile
            .preferred_channel
            .filter(|c| profile.channels.contains(c))
            .ok_or_else(|| OptoutError::NoHandlerFound(profile.key.clone()))?,
    };

    let endpoint = profile
        .endpoint_for(channel)
        .ok_or_else(|| OptoutError::MissingEndpoint {
            controller: profile.key.clone(),
            channel: channel.as_str().to_string(),
        })?
        .to_string();

    Ok(match channel {
        Channel::Email => ChannelTarget::Email {
            to: endpoint,
            subject_template: profile
                .email_subject
                .clone()
                .unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT.to_string()),
        },
        Channel::Webform => ChannelTarget::Webform { url: endpoint },
        Channel::Portal => ChannelTarget::Portal { url: endpoint },
        Channel::Api => ChannelTarget::Api { url: endpoint },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
