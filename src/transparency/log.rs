//! Transparency log of what the agent observed and recorded.
//!
//! Counters are shared between the poll loop and the finalize worker, and
//! are persisted across runs so `timesheet-agent status` can show totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Collection statistics for the current run.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Identifier of this agent run
    session_id: Uuid,
    /// Window polls performed
    polls: AtomicU64,
    /// Polls that returned no title
    empty_polls: AtomicU64,
    /// Segments closed by the tracker
    segments_closed: AtomicU64,
    /// Segments committed to the store
    segments_persisted: AtomicU64,
    /// Segments stored with an error category
    classification_failures: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            polls: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            segments_closed: AtomicU64::new(0),
            segments_persisted: AtomicU64::new(0),
            classification_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log that continues previously saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    /// Record one poll and whether it carried a title.
    pub fn record_poll(&self, had_title: bool) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        if !had_title {
            self.empty_polls.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a segment closed by a title change or shutdown flush.
    pub fn record_segment_closed(&self) {
        self.segments_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed segment.
    pub fn record_segment_persisted(&self, classification_failed: bool) {
        self.segments_persisted.fetch_add(1, Ordering::Relaxed);
        if classification_failed {
            self.classification_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            session_id: self.session_id,
            polls: self.polls.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            segments_closed: self.segments_closed.load(Ordering::Relaxed),
            segments_persisted: self.segments_persisted.load(Ordering::Relaxed),
            classification_failures: self.classification_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics ({}):\n\
             - Window polls: {} ({} without a title)\n\
             - Segments closed: {}\n\
             - Segments recorded: {}\n\
             - Classification failures: {}\n\
             - Session duration: {} seconds",
            stats.session_id,
            stats.polls,
            stats.empty_polls,
            stats.segments_closed,
            stats.segments_persisted,
            stats.classification_failures,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                polls: stats.polls,
                empty_polls: stats.empty_polls,
                segments_closed: stats.segments_closed,
                segments_persisted: stats.segments_persisted,
                classification_failures: stats.classification_failures,
                last_session_id: Some(stats.session_id),
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = PersistedStats::read(path)?;

                self.polls.store(persisted.polls, Ordering::Relaxed);
                self.empty_polls
                    .store(persisted.empty_polls, Ordering::Relaxed);
                self.segments_closed
                    .store(persisted.segments_closed, Ordering::Relaxed);
                self.segments_persisted
                    .store(persisted.segments_persisted, Ordering::Relaxed);
                self.classification_failures
                    .store(persisted.classification_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub session_id: Uuid,
    pub polls: u64,
    pub empty_polls: u64,
    pub segments_closed: u64,
    pub segments_persisted: u64,
    pub classification_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStats {
    pub polls: u64,
    pub empty_polls: u64,
    pub segments_closed: u64,
    pub segments_persisted: u64,
    pub classification_failures: u64,
    #[serde(default)]
    pub last_session_id: Option<Uuid>,
    pub last_updated: DateTime<Utc>,
}

impl PersistedStats {
    /// Read saved totals, e.g. for a status report.
    pub fn read(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
