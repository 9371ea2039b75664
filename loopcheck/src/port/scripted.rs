//! In-memory port with scripted replies.
//!
//! Each payload written to a [`ScriptedPort`] consumes the next [`Reply`]
//! from its script, which decides what the "remote side" sends back. Once
//! the script is exhausted the fallback reply (echo by default) is used, so
//! an unscripted port behaves like a perfect loopback plug.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::mem;
use std::time::Duration;

use log::trace;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::port::Port;

/// What the scripted remote does in response to one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Return exactly the bytes written.
    Echo,
    /// Return nothing.
    Silence,
    /// Return these bytes instead of the written ones.
    Bytes(Vec<u8>),
    /// Accept only this many bytes of the write.
    PartialWrite(usize),
    /// Fail the write with an I/O error.
    WriteFault,
    /// Accept the write, then fail the following read.
    ReadFault,
    /// Accept the write, then request cancellation while the read waits.
    CancelDuringRead,
}

/// Deterministic in-memory port.
#[derive(Debug)]
pub struct ScriptedPort {
    name: String,
    script: VecDeque<Reply>,
    fallback: Reply,
    pending: Vec<u8>,
    fail_next_read: bool,
    cancel_next_read: bool,
    writes: Vec<Vec<u8>>,
    open: bool,
    close_count: usize,
}

impl ScriptedPort {
    /// Create an open port that echoes everything.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: VecDeque::new(),
            fallback: Reply::Echo,
            pending: Vec::new(),
            fail_next_read: false,
            cancel_next_read: false,
            writes: Vec::new(),
            open: true,
            close_count: 0,
        }
    }

    /// Queue replies for the next writes, in order.
    #[must_use]
    pub fn with_replies(mut self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.script.extend(replies);
        self
    }

    /// Reply used once the script is exhausted.
    #[must_use]
    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    /// Every buffer accepted by `write`, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// How many times the port actually transitioned from open to closed.
    pub fn close_count(&self) -> usize {
        self.close_count
    }

    fn next_reply(&mut self) -> Reply {
        self.script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }

        let reply = self.next_reply();
        trace!("{}: write {} bytes, reply {reply:?}", self.name, buf.len());

        let accepted = match reply {
            Reply::Echo => {
                self.pending.extend_from_slice(buf);
                buf.len()
            },
            Reply::Silence => buf.len(),
            Reply::Bytes(bytes) => {
                self.pending.extend_from_slice(&bytes);
                buf.len()
            },
            Reply::PartialWrite(n) => n.min(buf.len()),
            Reply::WriteFault => {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device disconnected",
                ));
            },
            Reply::ReadFault => {
                self.fail_next_read = true;
                buf.len()
            },
            Reply::CancelDuringRead => {
                self.cancel_next_read = true;
                buf.len()
            },
        };

        self.writes.push(buf[..accepted].to_vec());
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for ScriptedPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        Ok(self.pending.len())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.close_count += 1;
            self.pending.clear();
        }
        Ok(())
    }

    /// Returns the scripted response immediately instead of waiting out the
    /// timeout.
    fn read_available(&mut self, _timeout: Duration, cancel: &CancelToken) -> Result<Vec<u8>> {
        if !self.open {
            return Err(Error::PortClosed);
        }
        if mem::take(&mut self.fail_next_read) {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }
        if mem::take(&mut self.cancel_next_read) {
            cancel.cancel();
        }
        if self.pending.is_empty() && cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }
        Ok(mem::take(&mut self.pending))
    }
}
