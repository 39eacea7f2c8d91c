//! 32-bit wrapping sequence numbers and their 64-bit absolute form.
//!
//! Peers exchange 32-bit sequence numbers that wrap around, while the
//! engines reason about a 64-bit absolute count of bytes (SYN and FIN
//! included) since the start of a direction's stream. Converting back
//! from 32 to 64 bits is ambiguous, since numbers differing by exactly
//! 2^32 look identical, so [`unwrap`] disambiguates against a
//! *checkpoint*: a recent absolute number known to be correct.

use std::fmt;

const FACTOR: u64 = 1 << 32;

/// A 32-bit sequence number as carried on the wire.
///
/// Ordering is deliberately not implemented: comparisons only make
/// sense in absolute space, after [`unwrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SeqNum(u32);

impl SeqNum {
    pub fn new(raw: u32) -> Self {
        SeqNum(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn wrapping_add(self, n: u32) -> Self {
        SeqNum(self.0.wrapping_add(n))
    }

    pub fn wrapping_sub(self, n: u32) -> Self {
        SeqNum(self.0.wrapping_sub(n))
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transform an absolute sequence number into its wrapping form.
///
/// ```
/// use riptide::tcp::seq::{wrap, SeqNum};
/// assert_eq!(wrap(17, SeqNum::new(5)), SeqNum::new(22));
/// assert_eq!(wrap(3 * (1u64 << 32) + 17, SeqNum::new(5)), SeqNum::new(22));
/// ```
pub fn wrap(abs: u64, isn: SeqNum) -> SeqNum {
    isn.wrapping_add(abs as u32)
}

/// Transform a wrapping sequence number into the absolute number
/// closest to `checkpoint`.
///
/// The candidate sharing the checkpoint's 2^32-wide window is compared
/// against its neighbors one window below and above; whichever lies
/// closest to the checkpoint wins, ties going to the candidate itself.
///
/// ```
/// use riptide::tcp::seq::{unwrap, wrap, SeqNum};
/// let isn = SeqNum::new(1 << 31);
/// let abs = (1u64 << 33) + 12345;
/// assert_eq!(unwrap(wrap(abs, isn), isn, abs), abs);
/// ```
pub fn unwrap(n: SeqNum, isn: SeqNum, checkpoint: u64) -> u64 {
    let offset = n.raw().wrapping_sub(isn.raw()) as u64;
    let candidate = checkpoint / FACTOR * FACTOR + offset;
    let dist = |x: u64| x.abs_diff(checkpoint);

    if candidate > checkpoint {
        if let Some(below) = candidate.checked_sub(FACTOR) {
            if dist(below) < dist(candidate) {
                return below;
            }
        }
    } else if candidate < checkpoint {
        if let Some(above) = candidate.checked_add(FACTOR) {
            if dist(above) < dist(candidate) {
                return above;
            }
        }
    }
    candidate
}
