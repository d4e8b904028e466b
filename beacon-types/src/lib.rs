//! This crate provides the protocol data model used by the beacon telemetry
//! SDK: events, transactions, breadcrumbs, sessions, attachments and the
//! envelope container that groups them for delivery.
//!
//! The types in here are plain data plus serde; all processing logic (scope
//! handling, sampling, the capture pipeline) lives in `beacon-core`.

#![warn(missing_docs)]

pub mod protocol;
mod utils;

pub use uuid::Uuid;

pub use crate::utils::ts_seconds_float;

/// Generates a random v4 uuid, used for event and session identifiers.
pub fn random_uuid() -> Uuid {
    Uuid::new_v4()
}
