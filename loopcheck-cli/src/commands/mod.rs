//! Command implementations.
//!
//! The loopback run and the port listing each live in their own module.

pub(crate) mod ports;
pub(crate) mod run;
