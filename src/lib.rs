//! A userspace TCP protocol engine: reliable, in-order, flow-controlled
//! byte streams over an unreliable datagram substrate.
//!
//! The crate is the protocol core only: it consumes and produces
//! [`tcp::Segment`]s and leaves framing, checksums, and I/O to the
//! layer below. Time advances only through explicit `tick` calls, so
//! every behavior is deterministic and testable.

pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(test)]
mod test;

pub use error::{Error, Result};
pub use stream::{ByteStream, Reassembler};
pub use tcp::{Config, Connection, Receiver, Segment, Sender, SeqNum};
