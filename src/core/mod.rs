//! Core functionality for the Timesheet Agent.
//!
//! This module contains:
//! - Segment types and duration arithmetic
//! - The title-change tracker state machine
//! - Finalization (classify, persist) on the poll thread or a worker
//! - The poll loop that drives them

pub mod agent;
pub mod clock;
pub mod finalize;
pub mod segment;
pub mod tracker;

// Re-export commonly used types
pub use agent::{Agent, AgentOptions, RunSummary};
pub use clock::{Clock, ManualClock, SystemClock};
pub use finalize::{AgentError, Finalizer, InlineSink, PersistedSegment, QueuedSink, SegmentSink};
pub use segment::{title_preview, ActivitySegment, ClosedSegment, OpenSegment};
pub use tracker::ActivityTracker;
