//! Local/remote window synchronization.
//!
//! The local store owns windows; the mirror holds copies. Reconciliation
//! happens once after login, then each local mutation is mirrored as a
//! single-record push.

pub mod synchronizer;
pub mod types;

#[cfg(test)]
mod synchronizer_tests;

pub use synchronizer::Synchronizer;
pub use types::{PushOutcome, SyncOutcome, SyncState};
