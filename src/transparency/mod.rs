//! Transparency module for the Timesheet Agent.
//!
//! Tracks and exposes what the agent polled, segmented and recorded, so a
//! user can audit its activity.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, PersistedStats, SharedTransparencyLog,
    TransparencyLog, TransparencyStats,
};
