use thiserror::Error;

/// Errors surfaced to the caller.
///
/// These cover *local misuse* of the API (writing after the input was
/// ended, reading more than is buffered, driving a dead connection) and
/// malformed wire input handed to [`crate::tcp::Segment::parse`].
/// Protocol-level junk from the peer, like stale acknowledgments or
/// segments that arrive before a SYN, is never an error; the engines
/// drop it silently.
#[derive(Debug, Error)]
pub enum Error {
    /// The producer declared end-of-input and then wrote again.
    #[error("write on a stream whose input has ended")]
    WriteAfterEnd,

    /// A read-side operation asked for more bytes than are buffered.
    #[error("requested {requested} bytes but only {available} are buffered")]
    ShortBuffer { requested: usize, available: usize },

    /// The connection has already ended, cleanly or otherwise.
    #[error("connection is no longer active")]
    ConnectionClosed,

    /// The byte slice did not contain a well-formed TCP header.
    #[error("malformed TCP header: {0}")]
    Malformed(#[from] etherparse::err::tcp::HeaderSliceError),
}

pub type Result<T> = std::result::Result<T, Error>;
