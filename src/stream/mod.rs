mod buffer;
mod reassembler;

pub use self::buffer::ByteStream;
pub use self::reassembler::Reassembler;
