//! The loopback session: an unbounded sequence of trials.
//!
//! Each cycle runs a trial, updates the statistics, reports, and appends to
//! the optional sink before the next cycle starts. The session moves
//! `Running -> Draining -> Stopped`; draining always terminates the live
//! status line and closes the port, whatever ended the run.

use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::port::Port;
use crate::report::{Reporter, error_line, status_line};
use crate::sink::RecordSink;
use crate::stats::Statistics;
use crate::trial::{TrialTiming, run_trial};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Trials are being executed.
    Running,
    /// The run ended; output and port are being released.
    Draining,
    /// Terminal state.
    Stopped,
}

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired.
    Cancelled,
    /// The configured number of trials completed.
    TrialLimit,
}

/// Outcome of [`Session::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Final counters.
    pub stats: Statistics,
    /// What ended the run.
    pub reason: StopReason,
}

/// Drives trials against one port.
pub struct Session {
    payload: Payload,
    timing: TrialTiming,
    cancel: CancelToken,
    sink: Option<Box<dyn RecordSink>>,
    trial_limit: Option<u64>,
    stats: Statistics,
    state: SessionState,
    reason: Option<StopReason>,
}

impl Session {
    /// Create a session without a log sink and without a trial limit.
    pub fn new(payload: Payload, timing: TrialTiming, cancel: CancelToken) -> Self {
        Self {
            payload,
            timing,
            cancel,
            sink: None,
            trial_limit: None,
            stats: Statistics::new(),
            state: SessionState::Running,
            reason: None,
        }
    }

    /// Persist every trial to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Stop after `limit` trials.
    #[must_use]
    pub fn with_trial_limit(mut self, limit: u64) -> Self {
        self.trial_limit = Some(limit);
        self
    }

    /// Counters so far; valid after `run` returns, including on error.
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run trials until cancellation, the trial limit, or a fault.
    ///
    /// The port is closed before returning on every path. A session runs
    /// once; calling `run` again after it stopped touches nothing and repeats
    /// the first outcome, or fails with [`Error::PortClosed`] when the first
    /// run ended in a fault.
    pub fn run<P, R>(&mut self, port: &mut P, reporter: &mut R) -> Result<RunSummary>
    where
        P: Port + ?Sized,
        R: Reporter + ?Sized,
    {
        if self.state != SessionState::Running {
            return match self.reason {
                Some(reason) => Ok(RunSummary {
                    stats: self.stats,
                    reason,
                }),
                None => Err(Error::PortClosed),
            };
        }

        info!(
            "Starting loopback on {} with {}-byte payload",
            port.name(),
            self.payload.len()
        );

        let result = self.run_cycles(port, reporter);

        self.state = SessionState::Draining;
        debug!("Draining session after {} trials", self.stats.total_sent());
        let finished = reporter.finish();
        if let Err(e) = port.close() {
            warn!("Failed to close {}: {e}", port.name());
        }
        self.state = SessionState::Stopped;

        let reason = result?;
        finished?;
        self.reason = Some(reason);
        info!("Loopback stopped ({reason:?}): {}", self.stats);
        Ok(RunSummary {
            stats: self.stats,
            reason,
        })
    }

    fn run_cycles<P, R>(&mut self, port: &mut P, reporter: &mut R) -> Result<StopReason>
    where
        P: Port + ?Sized,
        R: Reporter + ?Sized,
    {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            if self
                .trial_limit
                .is_some_and(|limit| self.stats.total_sent() >= limit)
            {
                return Ok(StopReason::TrialLimit);
            }

            let seq_no = self.stats.total_sent() + 1;
            let record = match run_trial(port, &self.payload, seq_no, &self.timing, &self.cancel)
            {
                Ok(record) => record,
                Err(Error::Interrupted) => {
                    debug!("Trial #{seq_no} abandoned by cancellation");
                    return Ok(StopReason::Cancelled);
                },
                Err(e) => return Err(e),
            };

            self.stats.record(record.outcome());

            if let Some(line) = error_line(&record) {
                reporter.append_line(&line)?;
            }
            if let Some(sink) = self.sink.as_mut() {
                sink.append(&record)?;
            }
            reporter.set_status(&status_line(&self.stats))?;

            if !self.timing.loop_delay.is_zero() {
                self.cancel.sleep(self.timing.loop_delay);
            }
        }
    }
}
