//! Maintenance tasks for the node repository.
//!
//! Each task is a periodic control loop: idempotent, tolerant of losing
//! write races to concurrent activity, and independent per node — one
//! node's failure never aborts the rest of a pass.

mod failed_expirer;
mod worker;

pub use failed_expirer::{ExpiryOutcome, FailedExpirer, FailedExpirerPolicy};
pub use worker::MaintenanceWorker;
