//! The poll loop: query the window, feed the tracker, hand off closed
//! segments, sleep, repeat.

use crate::core::clock::Clock;
use crate::core::finalize::{AgentError, SegmentSink};
use crate::core::tracker::ActivityTracker;
use crate::transparency::SharedTransparencyLog;
use crate::window::WindowSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Granularity at which a sleeping loop notices a stop request.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(100);

/// Loop settings.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Interval between window polls
    pub poll_interval: Duration,
    /// Finalize the open segment when the loop stops
    pub flush_on_exit: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            flush_on_exit: true,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Poll ticks performed
    pub polls: u64,
    /// Segments handed to the sink, including a shutdown flush
    pub segments_closed: u64,
    /// Whether the open segment was flushed on exit
    pub flushed_on_exit: bool,
}

/// The monitoring agent.
pub struct Agent<W, C, K> {
    source: W,
    clock: C,
    sink: K,
    tracker: ActivityTracker,
    options: AgentOptions,
    log: SharedTransparencyLog,
    summary: RunSummary,
}

impl<W, C, K> Agent<W, C, K>
where
    W: WindowSource,
    C: Clock,
    K: SegmentSink,
{
    pub fn new(source: W, clock: C, sink: K, options: AgentOptions, log: SharedTransparencyLog) -> Self {
        Self {
            source,
            clock,
            sink,
            tracker: ActivityTracker::new(),
            options,
            log,
            summary: RunSummary::default(),
        }
    }

    /// One poll tick.
    ///
    /// A sink that failed since the previous tick stops the loop before the
    /// window is polled again.
    pub fn tick(&mut self) -> Result<(), AgentError> {
        self.sink.check()?;

        let observed = self.source.current_window();
        let now = self.clock.now();

        self.summary.polls += 1;
        self.log.record_poll(observed.is_some());

        if let Some(closed) = self.tracker.observe(observed.as_deref(), now) {
            self.log.record_segment_closed();
            self.summary.segments_closed += 1;
            self.sink.submit(closed)?;
        }
        Ok(())
    }

    /// Poll until `running` is cleared, then shut down.
    ///
    /// A store failure stops the loop; the sink is still closed so segments
    /// already handed off get their chance to land.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RunSummary, AgentError> {
        tracing::info!(interval_ms = self.options.poll_interval.as_millis() as u64, "agent started");

        let mut outcome: Result<(), AgentError> = Ok(());
        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.tick() {
                outcome = Err(e);
                break;
            }
            self.pause(running);
        }

        let shutdown = self.shutdown(outcome.is_ok());
        if let (Err(_), Err(e)) = (&outcome, &shutdown) {
            tracing::error!("shutdown after failure also failed: {e}");
        }
        outcome.and(shutdown)
    }

    /// Sleep for one poll interval, waking early if asked to stop.
    fn pause(&self, running: &AtomicBool) {
        let mut remaining = self.options.poll_interval;
        while !remaining.is_zero() && running.load(Ordering::SeqCst) {
            let step = remaining.min(STOP_CHECK_SLICE);
            self.clock.sleep(step);
            remaining -= step;
        }
    }

    fn shutdown(&mut self, flush: bool) -> Result<RunSummary, AgentError> {
        let mut flush_result = Ok(());

        if flush && self.options.flush_on_exit {
            if let Some(closed) = self.tracker.finish(self.clock.now()) {
                tracing::info!(title = %closed.title, "flushing open segment");
                self.log.record_segment_closed();
                self.summary.segments_closed += 1;
                self.summary.flushed_on_exit = true;
                flush_result = self.sink.submit(closed);
            }
        } else if let Some(open) = self.tracker.open_segment() {
            tracing::info!(title = %open.title, "open segment not recorded");
        }

        let close_result = self.sink.close();
        flush_result.and(close_result)?;

        tracing::info!(
            polls = self.summary.polls,
            segments = self.summary.segments_closed,
            "agent stopped"
        );
        Ok(self.summary.clone())
    }

    /// The tracker, for inspection between ticks.
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// Give back the sink after a run.
    pub fn into_sink(self) -> K {
        self.sink
    }
}
