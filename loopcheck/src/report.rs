//! Console reporting: a scrolling error log above a live status line.
//!
//! The live status line is rewritten in place with a carriage return and no
//! newline. Error lines must never land on top of it, so a reporter tracks
//! whether the status line currently occupies the cursor row and breaks the
//! line before appending.

use std::io::{self, Write};

use crate::stats::Statistics;
use crate::trial::{Outcome, TrialRecord};

/// Minimum width of the status line; shorter renders are padded so they fully
/// erase longer previous ones.
pub const STATUS_WIDTH: usize = 100;

/// Output surface for a running session.
pub trait Reporter {
    /// Append a permanent line above the live status line.
    fn append_line(&mut self, text: &str) -> io::Result<()>;

    /// Replace the live status line.
    fn set_status(&mut self, text: &str) -> io::Result<()>;

    /// Terminate the live status line so later output starts on a fresh row.
    fn finish(&mut self) -> io::Result<()>;
}

/// Render the live status line for `stats`, padded to [`STATUS_WIDTH`].
pub fn status_line(stats: &Statistics) -> String {
    let pct = stats.percentages();
    let text = format!(
        "[STATUS] Sent: {} | Errors: {:.1}% ({}) | NoResp: {:.1}% ({}) | Mismatch: {:.1}% ({})",
        stats.total_sent(),
        pct.error_pct,
        stats.total_errors(),
        pct.no_response_pct,
        stats.no_response_count(),
        pct.mismatch_pct,
        stats.mismatch_count(),
    );
    format!("{text:<STATUS_WIDTH$}")
}

/// Column header printed above the error log.
pub fn error_log_header() -> String {
    format!(
        "  {:<25} | {:<6} | {:<15} | DETAILS",
        "[TIMESTAMP]", "#MSG", "ERROR TYPE"
    )
}

/// Render the error-log line for a failed trial; `None` for a match.
pub fn error_line(record: &TrialRecord) -> Option<String> {
    let detail = match record.outcome() {
        Outcome::Match => return None,
        Outcome::NoResponse => "Buffer empty".to_string(),
        Outcome::Mismatch => format!("Rx: {}", record.rx_hex()),
    };
    Some(format!(
        "  [{}] | #{:<5} | {:<15} | {detail}",
        record.timestamp_text(),
        record.seq_no(),
        record.outcome().label(),
    ))
}

/// Reporter writing plain text to a terminal (or any writer).
pub struct TerminalReporter<W: Write> {
    out: W,
    status_active: bool,
}

impl<W: Write> TerminalReporter<W> {
    /// Wrap a writer.
    pub fn new(out: W) -> Self {
        Self {
            out,
            status_active: false,
        }
    }

    /// Whether the live status line currently occupies the cursor row.
    pub fn status_active(&self) -> bool {
        self.status_active
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TerminalReporter<io::Stdout> {
    /// Reporter on standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Reporter for TerminalReporter<W> {
    fn append_line(&mut self, text: &str) -> io::Result<()> {
        if self.status_active {
            self.out.write_all(b"\n")?;
            self.status_active = false;
        }
        self.out.write_all(text.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    fn set_status(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "\r{text}")?;
        self.status_active = true;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.status_active {
            self.out.write_all(b"\n")?;
            self.status_active = false;
        }
        self.out.flush()
    }
}
