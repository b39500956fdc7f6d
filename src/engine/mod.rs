//! Adherence & alert engine.
//!
//! Pure computations over snapshots handed in by the persistence layer.
//! Nothing in here touches the database, the network or the wall clock:
//! every entry point takes an explicit `now`, and the only mutations are the
//! ones that return the change they made so the caller can persist it.

pub mod adherence;
pub mod daily;
pub mod digest;
pub mod error;
pub mod period;
pub mod reconcile;
pub mod reminder;
pub mod schedule;
pub mod thresholds;

pub use error::EngineError;

#[cfg(test)]
pub(crate) mod fixtures;
