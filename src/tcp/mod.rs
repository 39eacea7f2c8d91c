mod connection;
mod receiver;
mod segment;
mod sender;
pub mod seq;

pub use self::connection::Connection;
pub use self::receiver::Receiver;
pub use self::segment::Segment;
pub use self::sender::Sender;
pub use self::seq::SeqNum;

/// Most payload bytes one segment will carry.
pub const MAX_PAYLOAD_SIZE: usize = 1000;
/// Default capacity of the outbound and inbound byte streams.
pub const DEFAULT_CAPACITY: usize = 64_000;
/// Default initial retransmission timeout, in milliseconds.
pub const TIMEOUT_DEFAULT: u64 = 1000;
/// Default retransmission attempts before a connection gives up.
pub const MAX_RETX_ATTEMPTS: u32 = 8;

/// Connection parameters, fixed at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the outbound byte stream, in bytes.
    pub send_capacity: usize,
    /// Capacity of the inbound buffers; bounds the advertised window.
    pub recv_capacity: usize,
    /// Initial retransmission timeout, in milliseconds.
    pub rt_timeout: u64,
    /// Consecutive retransmissions tolerated before declaring the
    /// link dead.
    pub max_retx_attempts: u32,
    /// Pin the initial sequence number; when unset, one is drawn at
    /// random per connection.
    pub fixed_isn: Option<SeqNum>,
    /// Whether to linger after both streams finish, absorbing the
    /// peer's late retransmissions.
    pub linger_after_streams_finish: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            send_capacity: DEFAULT_CAPACITY,
            recv_capacity: DEFAULT_CAPACITY,
            rt_timeout: TIMEOUT_DEFAULT,
            max_retx_attempts: MAX_RETX_ATTEMPTS,
            fixed_isn: None,
            linger_after_streams_finish: true,
        }
    }
}
