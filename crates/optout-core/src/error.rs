use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptoutError {
    #[error("unknown controller: {0}")]
    UnknownController(String),

    #[error("no delivery channel resolvable for controller: {0}")]
    NoHandlerFound(String),

    #[error("controller '{controller}' has no {channel} endpoint configured")]
    MissingEndpoint { controller: String, channel: String },

    #[error("invalid controller key '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidControllerKey(String),

    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    #[error("invalid evidence hash '{0}': expected 64 hex characters")]
    InvalidEvidenceHash(String),

    #[error("evidence set is empty: nothing to commit")]
    EmptyEvidenceSet,

    #[error("proof not found: {0}")]
    ProofNotFound(String),

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("dlq entry not found: {0}")]
    DlqEntryNotFound(String),

    #[error("dlq entry already resolved: {0}")]
    DlqEntryResolved(String),

    #[error("action is cancelled: {0}")]
    ActionCancelled(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid action status: {0}")]
    InvalidStatus(String),

    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    #[error("invalid signing key: {0}")]
    SigningKeyInvalid(String),

    #[error("bundle export failed: {0}")]
    Bundle(String),

    #[error("transport setup failed: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OptoutError>;
