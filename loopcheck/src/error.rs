//! Error types for loopcheck.

use std::io;
use thiserror::Error;

use crate::payload::FormatError;

/// Result type for loopcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for loopcheck operations.
///
/// Protocol outcomes (no response, data mismatch) are never errors; they are
/// carried in [`TrialRecord::outcome`](crate::TrialRecord). Everything here
/// aborts the session.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error outside the transport (log file, report output).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port control error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Malformed payload hex string.
    #[error("Invalid payload: {0}")]
    Format(#[from] FormatError),

    /// The endpoint could not be opened.
    #[error("Cannot open port {port}: {source}")]
    TransportOpen {
        /// Port name/path.
        port: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Read or write on the channel failed.
    #[error("Transport fault: {0}")]
    Transport(#[source] io::Error),

    /// The channel accepted fewer bytes than the payload.
    #[error("Transport fault: partial write ({written} of {expected} bytes)")]
    PartialWrite {
        /// Bytes accepted by the port.
        written: usize,
        /// Payload length.
        expected: usize,
    },

    /// I/O was attempted on a port that has already been closed.
    #[error("Transport fault: port is closed")]
    PortClosed,

    /// A blocking wait was cut short by cancellation.
    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    /// Whether this error indicates the channel itself is unusable.
    pub fn is_transport_fault(&self) -> bool {
        match self {
            Self::Transport(_) | Self::PartialWrite { .. } | Self::PortClosed => true,
            #[cfg(feature = "native")]
            Self::Serial(_) => true,
            _ => false,
        }
    }
}
