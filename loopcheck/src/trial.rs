//! Trial engine: one send / wait / read / classify cycle.

use std::time::Duration;

use chrono::{DateTime, Local};
use log::trace;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::payload::{Payload, to_hex};
use crate::port::{DEFAULT_READ_TIMEOUT, Port};

/// Default wait between writing the payload and reading the response.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(100);

/// Timestamp format shared by the error log and the CSV sink.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Classification of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Outcome {
    /// Response equals the payload.
    Match,
    /// Nothing came back.
    NoResponse,
    /// Something came back, but not the payload.
    Mismatch,
}

impl Outcome {
    /// Classify a response against the transmitted bytes.
    pub fn classify(tx: &[u8], rx: &[u8]) -> Self {
        if rx.is_empty() {
            Self::NoResponse
        } else if rx != tx {
            Self::Mismatch
        } else {
            Self::Match
        }
    }

    /// Whether this outcome counts as an error.
    pub fn is_error(self) -> bool {
        self != Self::Match
    }

    /// Label used on screen and in the CSV log; empty for a match.
    pub fn label(self) -> &'static str {
        match self {
            Self::Match => "",
            Self::NoResponse => "NO RESPONSE",
            Self::Mismatch => "DATA MISMATCH",
        }
    }
}

/// Timing of a trial cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialTiming {
    /// Wait after the write before reading.
    pub send_delay: Duration,
    /// Bound on the read itself.
    pub read_timeout: Duration,
    /// Pause between cycles.
    pub loop_delay: Duration,
}

impl Default for TrialTiming {
    fn default() -> Self {
        Self {
            send_delay: DEFAULT_SEND_DELAY,
            read_timeout: DEFAULT_READ_TIMEOUT,
            loop_delay: Duration::ZERO,
        }
    }
}

/// Result of one trial. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialRecord {
    seq_no: u64,
    timestamp: DateTime<Local>,
    tx: Vec<u8>,
    rx: Vec<u8>,
    outcome: Outcome,
}

impl TrialRecord {
    /// Build a record, classifying `rx` against `tx`.
    pub fn new(seq_no: u64, timestamp: DateTime<Local>, tx: Vec<u8>, rx: Vec<u8>) -> Self {
        let outcome = Outcome::classify(&tx, &rx);
        Self {
            seq_no,
            timestamp,
            tx,
            rx,
            outcome,
        }
    }

    /// Sequence number, starting at 1.
    pub fn seq_no(&self) -> u64 {
        self.seq_no
    }

    /// Timestamp rendered with millisecond precision.
    pub fn timestamp_text(&self) -> String {
        self.timestamp
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    /// Bytes sent.
    pub fn tx(&self) -> &[u8] {
        &self.tx
    }

    /// Bytes received.
    pub fn rx(&self) -> &[u8] {
        &self.rx
    }

    /// Classification.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Uppercase hex of the sent bytes.
    pub fn tx_hex(&self) -> String {
        to_hex(&self.tx)
    }

    /// Uppercase hex of the received bytes; empty when nothing came back.
    pub fn rx_hex(&self) -> String {
        to_hex(&self.rx)
    }
}

/// Run one loopback trial.
///
/// Writes the payload once, waits `timing.send_delay`, then drains the
/// response with a read bounded by `timing.read_timeout`. Transport faults
/// and cancellation before any response byte are returned as errors; an
/// empty or different response is a normal [`Outcome`].
pub fn run_trial<P: Port + ?Sized>(
    port: &mut P,
    payload: &Payload,
    seq_no: u64,
    timing: &TrialTiming,
    cancel: &CancelToken,
) -> Result<TrialRecord> {
    let timestamp = Local::now();

    port.write_payload(payload.as_bytes())?;
    // A cancel here still lets the read collect an already buffered response
    cancel.sleep(timing.send_delay);
    let rx = port.read_available(timing.read_timeout, cancel)?;

    let record = TrialRecord::new(seq_no, timestamp, payload.as_bytes().to_vec(), rx);
    trace!(
        "trial #{seq_no}: rx={} outcome={:?}",
        record.rx_hex(),
        record.outcome()
    );
    Ok(record)
}
