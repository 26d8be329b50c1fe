pub mod actions;
pub mod dispatch;
pub mod dlq;
pub mod proof;
pub mod sla;
pub mod status;
pub mod sweep;
