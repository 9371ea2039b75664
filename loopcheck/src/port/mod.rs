//! Port abstraction for the loopback channel.
//!
//! The trial engine talks to the link only through the [`Port`] trait, which
//! keeps the send/read/classify logic independent of the concrete transport:
//!
//! ```text
//! +------------------+
//! |   Trial engine   |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |    Port trait    |
//! +--------+---------+
//!          |
//!    +-----+---------------+
//!    v                     v
//! +--+---------------+  +--+---------------+
//! | NativePort       |  | ScriptedPort     |
//! |  (serialport)    |  |  (in-memory)     |
//! +------------------+  +------------------+
//! ```
//!
//! ## Example
//!
//! ```rust
//! use loopcheck::port::{Port, ScriptedPort, Reply};
//! use loopcheck::CancelToken;
//! use std::time::Duration;
//!
//! let mut port = ScriptedPort::new("loop0").with_replies([Reply::Echo]);
//! port.write_payload(b"\x5A\x00").unwrap();
//! let rx = port.read_available(Duration::from_millis(100), &CancelToken::new()).unwrap();
//! assert_eq!(rx, b"\x5A\x00");
//! ```

#[cfg(feature = "native")]
pub mod native;
pub mod scripted;

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default bound on a single read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Poll interval while waiting for response bytes.
///
/// Once bytes have arrived, the read ends at the first poll that finds no new
/// input, i.e. after one quiet interval of this length.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Serial port configuration.
///
/// The link is always 8 data bits, no parity, one stop bit, no flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM17").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Bound on each read call.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
}

/// Duplex byte channel used by the trial engine.
///
/// `read_available` and `write_payload` have default implementations built
/// on `Read`, `Write` and [`Port::bytes_to_read`].
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Number of received bytes waiting in the input buffer.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Discard pending input and output.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Whether the port is still open.
    fn is_open(&self) -> bool;

    /// Close the port and release the device.
    ///
    /// Idempotent: closing an already closed port is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Write the whole payload in one call.
    ///
    /// A short write is reported as [`Error::PartialWrite`] rather than
    /// retried.
    fn write_payload(&mut self, buf: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::PortClosed);
        }
        let written = self.write(buf).map_err(Error::Transport)?;
        if written != buf.len() {
            return Err(Error::PartialWrite {
                written,
                expected: buf.len(),
            });
        }
        self.flush().map_err(Error::Transport)
    }

    /// Drain whatever the link has returned.
    ///
    /// Waits up to `timeout` for the first byte, then keeps reading until the
    /// input stays quiet for [`READ_POLL_INTERVAL`]. Returns an empty vector
    /// when nothing arrived. Returns [`Error::Interrupted`] if `cancel` fires
    /// before any byte arrived.
    fn read_available(&mut self, timeout: Duration, cancel: &CancelToken) -> Result<Vec<u8>> {
        if !self.is_open() {
            return Err(Error::PortClosed);
        }

        let deadline = Instant::now() + timeout;
        let mut rx = Vec::new();

        loop {
            let pending = self.bytes_to_read()?;
            if pending > 0 {
                let start = rx.len();
                rx.resize(start + pending, 0);
                let n = match self.read(&mut rx[start..]) {
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::TimedOut => 0,
                    Err(e) => return Err(Error::Transport(e)),
                };
                rx.truncate(start + n);
            } else if !rx.is_empty() {
                return Ok(rx);
            } else if cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(rx);
            }
            thread::sleep(READ_POLL_INTERVAL.min(deadline - now));
        }
    }
}

impl<P: Port + ?Sized> Port for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        (**self).bytes_to_read()
    }

    fn clear_buffers(&mut self) -> Result<()> {
        (**self).clear_buffers()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn write_payload(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_payload(buf)
    }

    fn read_available(&mut self, timeout: Duration, cancel: &CancelToken) -> Result<Vec<u8>> {
        (**self).read_available(timeout, cancel)
    }
}

/// Trait for listing available serial ports.
///
/// This is separated from `Port` because it's a static operation that
/// doesn't require an open port instance.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
pub use scripted::{Reply, ScriptedPort};
