//! Title-change segmentation.
//!
//! The tracker is a pure state machine: it is fed one observation per poll
//! tick and hands back the segment that the observation closed, if any.
//! It performs no I/O and reads no clock of its own.

use crate::core::segment::{ClosedSegment, OpenSegment};
use chrono::{DateTime, Utc};

/// Tracks the currently open segment.
///
/// `Idle` until the first non-empty title is observed, `Tracking` from then
/// on. It never returns to `Idle` except through [`ActivityTracker::finish`].
#[derive(Debug, Default)]
pub struct ActivityTracker {
    open: Option<OpenSegment>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one poll result observed at `now`.
    ///
    /// Returns the segment closed by a title change. Empty observations and
    /// repeats of the open title never close anything.
    pub fn observe(&mut self, observed: Option<&str>, now: DateTime<Utc>) -> Option<ClosedSegment> {
        let title = match observed {
            Some(t) if !t.is_empty() => t,
            _ => return None,
        };

        match self.open.take() {
            None => {
                tracing::debug!(title, "tracking first window");
                self.open = Some(OpenSegment::new(title, now));
                None
            }
            Some(open) if open.title == title => {
                self.open = Some(open);
                None
            }
            Some(open) => {
                tracing::debug!(from = %open.title, to = title, "window title changed");
                self.open = Some(OpenSegment::new(title, now));
                Some(open.close(now))
            }
        }
    }

    /// Close the open segment at `now`, leaving the tracker idle.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<ClosedSegment> {
        self.open.take().map(|open| open.close(now))
    }

    /// The segment currently accumulating time.
    pub fn open_segment(&self) -> Option<&OpenSegment> {
        self.open.as_ref()
    }

    /// Whether a segment is open.
    pub fn is_tracking(&self) -> bool {
        self.open.is_some()
    }
}
