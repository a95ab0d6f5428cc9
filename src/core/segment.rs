//! Activity segments: contiguous intervals with a constant window title.

use crate::classifier::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A segment whose end is not yet known. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSegment {
    /// Title observed for the whole segment
    pub title: String,
    /// When the title was first observed
    pub started_at: DateTime<Utc>,
}

impl OpenSegment {
    pub fn new(title: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            started_at,
        }
    }

    /// Close the segment at `end`.
    ///
    /// A wall clock that stepped backwards is clamped to the start so the
    /// recorded interval is never negative.
    pub fn close(self, end: DateTime<Utc>) -> ClosedSegment {
        let end_time = if end < self.started_at {
            self.started_at
        } else {
            end
        };
        ClosedSegment {
            title: self.title,
            start_time: self.started_at,
            end_time,
        }
    }
}

/// A finished segment awaiting classification and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedSegment {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ClosedSegment {
    /// Whole seconds elapsed, rounded down.
    pub fn duration_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds().max(0)
    }

    /// Attach a category, producing the unit of record.
    pub fn with_category(self, category: Category) -> ActivitySegment {
        let duration_sec = self.duration_secs();
        ActivitySegment {
            start_time: self.start_time,
            end_time: self.end_time,
            window_title: self.title,
            category,
            duration_sec,
        }
    }
}

/// A classified, closed segment: one row of `activity_logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySegment {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub window_title: String,
    pub category: Category,
    pub duration_sec: i64,
}

/// Shorten a title for console output, on character boundaries.
pub fn title_preview(title: &str, max_chars: usize) -> String {
    let mut chars = title.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_duration_is_floored() {
        let open = OpenSegment::new("Editor", at(0));
        let closed = open.close(at(9) + Duration::milliseconds(999));
        assert_eq!(closed.duration_secs(), 9);
    }

    #[test]
    fn test_backwards_clock_is_clamped() {
        let open = OpenSegment::new("Editor", at(10));
        let closed = open.close(at(4));
        assert_eq!(closed.end_time, closed.start_time);
        assert_eq!(closed.duration_secs(), 0);
    }

    #[test]
    fn test_with_category_carries_fields() {
        let segment = OpenSegment::new("Docs", at(0))
            .close(at(6))
            .with_category(Category::Work);
        assert_eq!(segment.window_title, "Docs");
        assert_eq!(segment.duration_sec, 6);
        assert_eq!(segment.category, Category::Work);
        assert_eq!(segment.start_time, at(0));
        assert_eq!(segment.end_time, at(6));
    }

    #[test]
    fn test_title_preview() {
        assert_eq!(title_preview("short", 30), "short");
        assert_eq!(title_preview("abcdef", 3), "abc...");
        // Multi-byte titles must not be split mid-character.
        assert_eq!(title_preview("강의 노트 정리", 2), "강의...");
    }
}
