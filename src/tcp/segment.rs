//! TCP segment representation.

use std::fmt;

use etherparse::{TcpHeader, TcpHeaderSlice};

use crate::error::Result;
use crate::tcp::seq::SeqNum;

/// One TCP segment: a header plus its payload bytes.
///
/// The engines only read and write the sequencing fields (seqno, ackno,
/// window, SYN/FIN/RST/ACK flags); ports and checksum are the business
/// of whatever frames the segment onto the wire.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    pub header: TcpHeader,
    pub payload: Vec<u8>,
}

impl Segment {
    /// A flag-less, payload-less segment at `seqno`.
    pub fn empty(seqno: SeqNum) -> Self {
        let mut header = TcpHeader::default();
        header.sequence_number = seqno.raw();
        Segment {
            header,
            payload: Vec::new(),
        }
    }

    /// A bare SYN at `seqno`.
    pub fn syn(seqno: SeqNum) -> Self {
        let mut seg = Segment::empty(seqno);
        seg.header.syn = true;
        seg
    }

    pub fn with_payload(seqno: SeqNum, payload: Vec<u8>) -> Self {
        let mut seg = Segment::empty(seqno);
        seg.payload = payload;
        seg
    }

    pub fn seqno(&self) -> SeqNum {
        SeqNum::new(self.header.sequence_number)
    }

    pub fn ackno(&self) -> SeqNum {
        SeqNum::new(self.header.acknowledgment_number)
    }

    /// How much of the sequence space this segment occupies: the
    /// payload length, plus one for SYN and one for FIN.
    pub fn len_in_sequence_space(&self) -> usize {
        self.payload.len() + self.header.syn as usize + self.header.fin as usize
    }

    /// Serialize as a bare TCP header followed by the payload.
    ///
    /// The checksum field is left at zero; computing it needs the IP
    /// pseudo-header, which belongs to the layer below.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.payload.len() + 20);
        self.header
            .write(&mut buf)
            .expect("serializing to a Vec cannot fail");
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a bare TCP header plus payload. No checksum validation.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header = TcpHeaderSlice::from_slice(buf)?;
        let payload = buf[header.slice().len()..].to_vec();
        Ok(Segment {
            header: header.to_header(),
            payload,
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        write!(
            f,
            "{}{}{}{} seq={} ack={} win={} len={}",
            if h.syn { 'S' } else { '-' },
            if h.ack { 'A' } else { '-' },
            if h.fin { 'F' } else { '-' },
            if h.rst { 'R' } else { '-' },
            h.sequence_number,
            h.acknowledgment_number,
            h.window_size,
            self.payload.len()
        )
    }
}
