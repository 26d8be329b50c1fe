pub mod action;
pub mod attempt;
pub mod breaker;
pub mod bundle;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod dlq;
pub mod error;
pub mod idempotency;
pub mod io;
pub mod ledger;
pub mod merkle;
pub mod policy;
pub mod profile;
pub mod retry;
pub mod signer;
pub mod sla;
pub mod store;
pub mod subject;
pub mod sweep;
pub mod transport;
pub mod types;

pub use error::{OptoutError, Result};
