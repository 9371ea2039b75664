//! Loopback payload and its hexadecimal codec.
//!
//! The payload is configured as a hex string such as
//! `"5A 00 00 00 00 00 F6 96 00 00"`. Whitespace anywhere between digits is
//! ignored and digits are case-insensitive.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default loopback payload.
pub const DEFAULT_PAYLOAD_HEX: &str = "5A 00 00 00 00 00 F6 96 00 00";

/// Error parsing a payload hex string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// No hex digits at all.
    #[error("payload is empty")]
    Empty,

    /// Digits do not pair up into whole bytes.
    #[error("odd number of hex digits ({digits})")]
    OddDigitCount {
        /// Number of hex digits found.
        digits: usize,
    },

    /// A character that is neither a hex digit nor whitespace.
    #[error("invalid hex character {ch:?} at position {position}")]
    InvalidDigit {
        /// Offending character.
        ch: char,
        /// Character index in the input string.
        position: usize,
    },
}

/// Immutable, non-empty byte sequence sent on every trial.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Payload(Box<[u8]>);

impl Payload {
    /// Build a payload from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, FormatError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(FormatError::Empty);
        }
        Ok(Self(bytes.into_boxed_slice()))
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Uppercase hex without separators.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Payload {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s)
    }
}

impl Default for Payload {
    fn default() -> Self {
        parse_hex(DEFAULT_PAYLOAD_HEX).expect("built-in payload is valid hex")
    }
}

/// Space-separated uppercase byte groups, e.g. `5A 00 F6`.
impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Parse a whitespace-insensitive, case-insensitive hex string into a payload.
pub fn parse_hex(s: &str) -> Result<Payload, FormatError> {
    let mut nibbles = Vec::with_capacity(s.len());
    for (position, ch) in s.chars().enumerate() {
        if ch.is_ascii_whitespace() {
            continue;
        }
        let value = ch
            .to_digit(16)
            .ok_or(FormatError::InvalidDigit { ch, position })?;
        // to_digit(16) is at most 15
        #[allow(clippy::cast_possible_truncation)]
        nibbles.push(value as u8);
    }

    if nibbles.is_empty() {
        return Err(FormatError::Empty);
    }
    if nibbles.len() % 2 != 0 {
        return Err(FormatError::OddDigitCount {
            digits: nibbles.len(),
        });
    }

    let bytes: Vec<u8> = nibbles
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect();
    Payload::from_bytes(bytes)
}

/// Render bytes as uppercase hex without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}
