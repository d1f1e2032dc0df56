//! Resident mode: cron scheduling and signal handling.

pub mod scheduler;
pub mod shutdown;

pub use scheduler::{BackupScheduler, RunState};
pub use shutdown::ShutdownCoordinator;
