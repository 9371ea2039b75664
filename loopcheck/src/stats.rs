//! Running loopback statistics.

use std::fmt;

use crate::trial::Outcome;

/// Counters accumulated over a session.
///
/// Invariant: `total_errors == no_response_count + mismatch_count <= total_sent`.
/// The fields are only mutated through [`Statistics::record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Statistics {
    total_sent: u64,
    total_errors: u64,
    no_response_count: u64,
    mismatch_count: u64,
}

/// Error rates derived from [`Statistics`], in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Percentages {
    /// All errors.
    pub error_pct: f64,
    /// Trials with no response.
    pub no_response_pct: f64,
    /// Trials with a mismatched response.
    pub mismatch_pct: f64,
}

impl Statistics {
    /// Fresh counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one completed trial.
    pub fn record(&mut self, outcome: Outcome) {
        self.total_sent += 1;
        match outcome {
            Outcome::Match => {},
            Outcome::NoResponse => {
                self.no_response_count += 1;
                self.total_errors += 1;
            },
            Outcome::Mismatch => {
                self.mismatch_count += 1;
                self.total_errors += 1;
            },
        }
    }

    /// Trials sent.
    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }

    /// Trials that did not match.
    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }

    /// Trials with an empty response.
    pub fn no_response_count(&self) -> u64 {
        self.no_response_count
    }

    /// Trials with a non-empty but different response.
    pub fn mismatch_count(&self) -> u64 {
        self.mismatch_count
    }

    /// Error rates; all zero before the first trial.
    pub fn percentages(&self) -> Percentages {
        if self.total_sent == 0 {
            return Percentages::default();
        }
        let total = self.total_sent as f64;
        Percentages {
            error_pct: self.total_errors as f64 / total * 100.0,
            no_response_pct: self.no_response_count as f64 / total * 100.0,
            mismatch_pct: self.mismatch_count as f64 / total * 100.0,
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = self.percentages();
        write!(
            f,
            "Sent: {} | Errors: {} ({:.1}%) | No response: {} ({:.1}%) | Mismatch: {} ({:.1}%)",
            self.total_sent,
            self.total_errors,
            pct.error_pct,
            self.no_response_count,
            pct.no_response_pct,
            self.mismatch_count,
            pct.mismatch_pct,
        )
    }
}
