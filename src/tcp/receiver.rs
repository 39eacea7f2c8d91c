//! The receiving half of a connection.
//!
//! Feeds inbound segments to a [`Reassembler`] and computes the two
//! numbers reported back to the peer: the acknowledgment number (first
//! byte not yet received) and the advertised window.

use crate::stream::{ByteStream, Reassembler};
use crate::tcp::segment::Segment;
use crate::tcp::seq::{self, SeqNum};

pub struct Receiver {
    reassembler: Reassembler,
    capacity: usize,
    got_syn: bool,
    got_fin: bool,
    /// The peer's initial sequence number, valid once `got_syn`.
    isn: SeqNum,
    /// Absolute sequence number of the FIN, valid once `got_fin`.
    fin_seqno: u64,
    /// Highest absolute sequence number seen, for unwrapping.
    checkpoint: u64,
}

impl Receiver {
    /// `capacity` bounds the inbound buffers (reassembled-but-unread
    /// plus pending bytes) and thereby the advertised window.
    pub fn new(capacity: usize) -> Self {
        Receiver {
            reassembler: Reassembler::new(capacity),
            capacity,
            got_syn: false,
            got_fin: false,
            isn: SeqNum::new(0),
            fin_seqno: 0,
            checkpoint: 0,
        }
    }

    /// Take in a segment: everything before the SYN is ignored, the
    /// payload is clipped to the advertised window, and the rest goes
    /// to the reassembler.
    pub fn segment_received(&mut self, seg: &Segment) {
        let header = &seg.header;

        if !self.got_syn {
            if !header.syn {
                return;
            }
            self.got_syn = true;
            self.isn = seg.seqno();
            log::debug!("[rcv] ← {seg} (isn={})", self.isn);
        }

        let abs_seqno = seq::unwrap(seg.seqno(), self.isn, self.checkpoint);
        let stream_index = if abs_seqno != 0 {
            self.checkpoint = abs_seqno;
            abs_seqno - 1
        } else if !header.syn {
            // claims the sequence number of the SYN without carrying one
            return;
        } else {
            0
        };

        if header.fin {
            let fin_seqno = stream_index + 1 + seg.payload.len() as u64;
            if !self.got_fin {
                self.got_fin = true;
                self.fin_seqno = fin_seqno;
                log::debug!("[rcv] ← {seg} (stream ends at {fin_seqno})");
            } else {
                debug_assert_eq!(self.fin_seqno, fin_seqno, "peer moved its FIN");
            }
        }

        let win_begin = self.abs_ackno();
        let win_end = win_begin + self.window_size() as u64;
        let data_end = stream_index + 1 + seg.payload.len() as u64;
        if data_end <= win_end {
            self.reassembler.push(&seg.payload, stream_index, header.fin);
        } else if stream_index + 1 < win_end {
            // the tail falls outside the window; so does any FIN,
            // which sits after the payload in sequence space
            let keep = (win_end - (stream_index + 1)) as usize;
            self.reassembler.push(&seg.payload[..keep], stream_index, false);
        }
        // else: entirely beyond the window, dropped
    }

    /// The acknowledgment number to report, or `None` before a SYN has
    /// been seen.
    pub fn ackno(&self) -> Option<SeqNum> {
        if !self.got_syn {
            return None;
        }
        Some(seq::wrap(self.abs_ackno(), self.isn))
    }

    /// Room left in the inbound buffer, the window advertised back to
    /// the peer.
    pub fn window_size(&self) -> usize {
        self.capacity - self.reassembler.stream_out().buffer_size()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    pub fn stream_out(&self) -> &ByteStream {
        self.reassembler.stream_out()
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        self.reassembler.stream_out_mut()
    }

    /// First absolute sequence number not yet received: the SYN plus
    /// every byte delivered to the output, plus the FIN once it has
    /// been reached.
    fn abs_ackno(&self) -> u64 {
        let mut ackno = 1 + self.reassembler.stream_out().bytes_written();
        if self.got_fin && ackno == self.fin_seqno {
            ackno += 1;
        }
        ackno
    }
}
