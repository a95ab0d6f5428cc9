//! Finalize closed segments: classify, persist, report.
//!
//! Two sinks share the same [`Finalizer`]:
//! - [`InlineSink`] runs it on the poll thread, so a slow classification
//!   delays the next poll.
//! - [`QueuedSink`] hands segments to a single worker thread through a
//!   bounded channel. The poll loop keeps its cadence; a full queue blocks
//!   it until the worker catches up. One worker keeps records in closure
//!   order.

use crate::classifier::Classifier;
use crate::core::segment::{title_preview, ActivitySegment, ClosedSegment};
use crate::store::{RecordId, RecordStore, StoreError};
use crate::transparency::SharedTransparencyLog;
use chrono::Local;
use crossbeam_channel::{bounded, Sender};
use std::thread::{self, JoinHandle};

/// A segment that has been committed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSegment {
    pub id: RecordId,
    pub segment: ActivitySegment,
}

/// Errors that stop the agent.
#[derive(Debug)]
pub enum AgentError {
    /// The record store rejected a write
    Store(StoreError),
    /// The finalize worker could not be started or died
    Worker(String),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Store(e) => write!(f, "{e}"),
            AgentError::Worker(msg) => write!(f, "Finalize worker error: {msg}"),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Store(e) => Some(e),
            AgentError::Worker(_) => None,
        }
    }
}

impl From<StoreError> for AgentError {
    fn from(e: StoreError) -> Self {
        AgentError::Store(e)
    }
}

/// Classifies a closed segment and appends it to the store.
pub struct Finalizer<C, S> {
    classifier: C,
    store: S,
    log: SharedTransparencyLog,
    preview_chars: usize,
    progress: bool,
}

impl<C: Classifier, S: RecordStore> Finalizer<C, S> {
    pub fn new(classifier: C, store: S, log: SharedTransparencyLog) -> Self {
        Self {
            classifier,
            store,
            log,
            preview_chars: 30,
            progress: true,
        }
    }

    /// Characters of the title shown in progress lines.
    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    /// Print a line to stdout for every persisted segment.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Classify and persist one segment.
    ///
    /// Classification problems are recorded in the category; only store
    /// failures are returned.
    pub fn finalize(&mut self, closed: ClosedSegment) -> Result<PersistedSegment, StoreError> {
        let category = self.classifier.classify(&closed.title);
        let segment = closed.with_category(category);

        let id = self.store.append(&segment).map_err(|e| {
            tracing::error!(title = %segment.window_title, "failed to persist segment: {e}");
            e
        })?;

        self.log
            .record_segment_persisted(segment.category.is_error());
        tracing::info!(
            id = id.0,
            category = %segment.category,
            duration_sec = segment.duration_sec,
            "segment recorded"
        );

        if self.progress {
            println!(
                "[{}] {} {} | {} ({}s)",
                segment.end_time.with_timezone(&Local).format("%H:%M:%S"),
                id,
                segment.category,
                title_preview(&segment.window_title, self.preview_chars),
                segment.duration_sec
            );
        }

        Ok(PersistedSegment { id, segment })
    }

    /// Give back the store, e.g. to inspect it after a run.
    pub fn into_store(self) -> S {
        self.store
    }
}

/// Destination for segments closed by the poll loop.
pub trait SegmentSink {
    /// Accept a closed segment for classification and persistence.
    fn submit(&mut self, closed: ClosedSegment) -> Result<(), AgentError>;

    /// Finish all accepted segments. No further submits are allowed.
    fn close(&mut self) -> Result<(), AgentError>;

    /// Report a failure that happened since the last call, without blocking.
    fn check(&mut self) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Finalizes on the calling thread.
pub struct InlineSink<C, S> {
    finalizer: Finalizer<C, S>,
}

impl<C: Classifier, S: RecordStore> InlineSink<C, S> {
    pub fn new(finalizer: Finalizer<C, S>) -> Self {
        Self { finalizer }
    }

    pub fn into_finalizer(self) -> Finalizer<C, S> {
        self.finalizer
    }
}

impl<C: Classifier, S: RecordStore> SegmentSink for InlineSink<C, S> {
    fn submit(&mut self, closed: ClosedSegment) -> Result<(), AgentError> {
        self.finalizer.finalize(closed)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Finalizes on a dedicated worker thread.
pub struct QueuedSink {
    sender: Option<Sender<ClosedSegment>>,
    worker: Option<JoinHandle<Result<(), StoreError>>>,
}

impl QueuedSink {
    /// Spawn the worker. At most `capacity` segments wait in the queue.
    pub fn spawn<C, S>(finalizer: Finalizer<C, S>, capacity: usize) -> Result<Self, AgentError>
    where
        C: Classifier + Send + 'static,
        S: RecordStore + Send + 'static,
    {
        let (sender, receiver) = bounded::<ClosedSegment>(capacity.max(1));
        let mut finalizer = finalizer;

        let worker = thread::Builder::new()
            .name("timesheet-finalize".into())
            .spawn(move || {
                for closed in receiver.iter() {
                    if let Err(e) = finalizer.finalize(closed) {
                        let dropped = receiver.len();
                        if dropped > 0 {
                            tracing::error!(dropped, "discarding queued segments after store failure");
                        }
                        return Err(e);
                    }
                }
                Ok(())
            })
            .map_err(|e| AgentError::Worker(format!("failed to spawn worker: {e}")))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Segments waiting for the worker.
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    fn join_worker(&mut self) -> Result<(), AgentError> {
        match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result.map_err(AgentError::Store),
                Err(_) => Err(AgentError::Worker("worker thread panicked".to_string())),
            },
            None => Ok(()),
        }
    }
}

impl SegmentSink for QueuedSink {
    fn submit(&mut self, closed: ClosedSegment) -> Result<(), AgentError> {
        if let Err(e) = self.check() {
            tracing::error!(title = %closed.title, "segment discarded, worker has stopped");
            return Err(e);
        }

        let sender = match self.sender.as_ref() {
            Some(sender) => sender,
            None => {
                tracing::error!(title = %closed.title, "segment discarded, sink is closed");
                return Err(AgentError::Worker("sink already closed".to_string()));
            }
        };

        if let Err(err) = sender.send(closed) {
            tracing::error!(title = %err.0.title, "segment discarded, worker hung up");
            self.sender = None;
            self.join_worker()?;
            return Err(AgentError::Worker("worker stopped unexpectedly".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), AgentError> {
        // Dropping the sender ends the worker's receive loop once drained.
        self.sender = None;
        self.join_worker()
    }

    fn check(&mut self) -> Result<(), AgentError> {
        let finished = match self.worker.as_ref() {
            Some(worker) => worker.is_finished(),
            None => return Ok(()),
        };
        if !finished {
            return Ok(());
        }

        self.sender = None;
        self.join_worker()?;
        Err(AgentError::Worker("worker is not running".to_string()))
    }
}

impl Drop for QueuedSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("finalize worker ended with error: {e}");
        }
    }
}
