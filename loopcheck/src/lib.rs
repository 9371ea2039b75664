//! # loopcheck
//!
//! Continuous loopback integrity testing for point-to-point serial links.
//!
//! A session repeatedly writes a fixed payload, reads back whatever the link
//! returns within a bounded window, and classifies each trial:
//!
//! - **Match**: the response equals the payload
//! - **NoResponse**: nothing came back
//! - **Mismatch**: something came back, but not the payload
//!
//! Running counters are rendered as a live status line, failed trials scroll
//! above it, and every trial can be appended to a CSV log.
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//! - `serde`: Serialization support for statistics and outcomes
//!
//! ## Example
//!
//! ```rust
//! use loopcheck::{CancelToken, Payload, Session, StopReason, TerminalReporter, TrialTiming};
//! use loopcheck::port::{Reply, ScriptedPort};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let payload: Payload = "5A 00 00 00 00 00 F6 96 00 00".parse()?;
//!     let timing = TrialTiming {
//!         send_delay: Duration::ZERO,
//!         read_timeout: Duration::from_millis(10),
//!         loop_delay: Duration::ZERO,
//!     };
//!
//!     let mut port = ScriptedPort::new("loop0").with_replies([Reply::Echo, Reply::Silence]);
//!     let mut reporter = TerminalReporter::new(Vec::new());
//!     let mut session = Session::new(payload, timing, CancelToken::new()).with_trial_limit(2);
//!
//!     let summary = session.run(&mut port, &mut reporter)?;
//!     assert_eq!(summary.reason, StopReason::TrialLimit);
//!     assert_eq!(summary.stats.no_response_count(), 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod payload;
pub mod port;
pub mod report;
pub mod session;
pub mod sink;
pub mod stats;
pub mod trial;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    cancel::CancelToken,
    error::{Error, Result},
    payload::{DEFAULT_PAYLOAD_HEX, FormatError, Payload, parse_hex, to_hex},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    report::{Reporter, TerminalReporter, error_line, error_log_header, status_line},
    session::{RunSummary, Session, SessionState, StopReason},
    sink::{CsvLog, RecordSink},
    stats::{Percentages, Statistics},
    trial::{Outcome, TrialRecord, TrialTiming, run_trial},
};
