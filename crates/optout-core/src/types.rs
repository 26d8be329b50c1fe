use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Delivery mechanism for a removal request. Closed set: the dispatcher
/// matches exhaustively so a new channel cannot be added without handling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Webform,
    Portal,
    Api,
}

impl Channel {
    pub fn all() -> &'static [Channel] {
        &[Channel::Email, Channel::Webform, Channel::Portal, Channel::Api]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Webform => "webform",
            Channel::Portal => "portal",
            Channel::Api => "api",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = crate::error::OptoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Channel::Email),
            "webform" => Ok(Channel::Webform),
            "portal" => Ok(Channel::Portal),
            "api" => Ok(Channel::Api),
            _ => Err(crate::error::OptoutError::InvalidChannel(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a removal request.
///
/// Transitions: `draft → prepared → sent → {verified | needs_review |
/// escalate_pending} → resolved`, with `cancelled` reachable from any
/// non-terminal status. Delivery failures do not advance the status; a
/// parked DLQ entry leaves its action in `prepared` until a retry lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Draft,
    Prepared,
    Sent,
    Verified,
    NeedsReview,
    EscalatePending,
    Resolved,
    Cancelled,
}

impl ActionStatus {
    pub fn all() -> &'static [ActionStatus] {
        &[
            ActionStatus::Draft,
            ActionStatus::Prepared,
            ActionStatus::Sent,
            ActionStatus::Verified,
            ActionStatus::NeedsReview,
            ActionStatus::EscalatePending,
            ActionStatus::Resolved,
            ActionStatus::Cancelled,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Draft => "draft",
            ActionStatus::Prepared => "prepared",
            ActionStatus::Sent => "sent",
            ActionStatus::Verified => "verified",
            ActionStatus::NeedsReview => "needs_review",
            ActionStatus::EscalatePending => "escalate_pending",
            ActionStatus::Resolved => "resolved",
            ActionStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionStatus::Resolved | ActionStatus::Cancelled)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = crate::error::OptoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ActionStatus::Draft),
            "prepared" => Ok(ActionStatus::Prepared),
            "sent" => Ok(ActionStatus::Sent),
            "verified" => Ok(ActionStatus::Verified),
            "needs_review" => Ok(ActionStatus::NeedsReview),
            "escalate_pending" => Ok(ActionStatus::EscalatePending),
            "resolved" => Ok(ActionStatus::Resolved),
            "cancelled" => Ok(ActionStatus::Cancelled),
            _ => Err(crate::error::OptoutError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// VerifyLevel
// ---------------------------------------------------------------------------

/// Identity-verification evidence a controller demands before honoring a
/// removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyLevel {
    #[default]
    None,
    Email,
    Document,
}

impl VerifyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            VerifyLevel::None => "none",
            VerifyLevel::Email => "email",
            VerifyLevel::Document => "document",
        }
    }
}

impl fmt::Display for VerifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Stable snake_case codes carried in attempts, DLQ entries, and receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BreakerOpen,
    SendTimeout,
    RateLimited,
    #[serde(rename = "http_4xx")]
    Http4xx,
    #[serde(rename = "http_5xx")]
    Http5xx,
    ConnectFailed,
    MalformedTarget,
    NotConfigured,
    ProbeFailed,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BreakerOpen => "breaker_open",
            ErrorCode::SendTimeout => "send_timeout",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::Http4xx => "http_4xx",
            ErrorCode::Http5xx => "http_5xx",
            ErrorCode::ConnectFailed => "connect_failed",
            ErrorCode::MalformedTarget => "malformed_target",
            ErrorCode::NotConfigured => "not_configured",
            ErrorCode::ProbeFailed => "probe_failed",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn channel_round_trips_through_str() {
        for c in Channel::all() {
            assert_eq!(Channel::from_str(c.as_str()).unwrap(), *c);
        }
    }

    #[test]
    fn channel_serde_uses_snake_case() {
        let json = serde_json::to_string(&Channel::Webform).unwrap();
        assert_eq!(json, "\"webform\"");
    }

    #[test]
    fn unknown_channel_is_rejected() {
        assert!(Channel::from_str("fax").is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in ActionStatus::all() {
            assert_eq!(ActionStatus::from_str(s.as_str()).unwrap(), *s);
        }
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&ActionStatus::EscalatePending).unwrap();
        assert_eq!(json, "\"escalate_pending\"");
    }

    #[test]
    fn terminal_statuses() {
        assert!(ActionStatus::Resolved.is_terminal());
        assert!(ActionStatus::Cancelled.is_terminal());
        assert!(!ActionStatus::Sent.is_terminal());
        assert!(!ActionStatus::EscalatePending.is_terminal());
    }

    #[test]
    fn error_code_strings_are_snake_case() {
        assert_eq!(ErrorCode::BreakerOpen.as_str(), "breaker_open");
        assert_eq!(ErrorCode::Http5xx.as_str(), "http_5xx");
        let json = serde_json::to_string(&ErrorCode::SendTimeout).unwrap();
        assert_eq!(json, "\"send_timeout\"");
    }

    #[test]
    fn http_status_codes_keep_the_underscore_in_json() {
        let json = serde_json::to_string(&ErrorCode::Http4xx).unwrap();
        assert_eq!(json, "\"http_4xx\"");
        let back: ErrorCode = serde_json::from_str("\"http_5xx\"").unwrap();
        assert_eq!(back, ErrorCode::Http5xx);
    }
}
