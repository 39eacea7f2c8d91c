//! The sending half of a connection.
//!
//! Turns an outgoing [`ByteStream`] into segments that honor the peer's
//! advertised window, keeps every sent segment until it is fully
//! acknowledged, and retransmits the oldest one when the retransmission
//! timer expires, doubling the timeout each consecutive time.

use std::collections::VecDeque;

use crate::stream::ByteStream;
use crate::tcp::segment::Segment;
use crate::tcp::seq::{self, SeqNum};
use crate::tcp::MAX_PAYLOAD_SIZE;

/// A sent segment awaiting acknowledgment, tagged with the absolute
/// sequence number of its first byte.
struct Outstanding {
    seg: Segment,
    seqno: u64,
}

impl Outstanding {
    fn end(&self) -> u64 {
        self.seqno + self.seg.len_in_sequence_space() as u64
    }
}

pub struct Sender {
    isn: SeqNum,
    segments_out: VecDeque<Segment>,
    /// Outgoing application bytes not yet turned into segments.
    stream: ByteStream,
    /// Absolute sequence number of the next byte to send.
    next_seqno: u64,
    sent_syn: bool,
    sent_fin: bool,
    /// Left edge of the peer's receive window.
    window_begin: u64,
    /// Effective window size; a genuine zero advertisement is booked as
    /// 1 so a probe segment can still go out.
    window_size: u64,
    /// Whether the peer's *real* advertised window was zero. Kept apart
    /// from `window_size`: a stall caused by the peer must not back off
    /// the retransmission timeout.
    peer_window_zero: bool,
    bytes_in_flight: u64,
    /// Sent-but-unacknowledged segments, oldest first.
    outstanding: VecDeque<Outstanding>,
    /// Highest acknowledged absolute sequence number, for unwrapping.
    checkpoint: u64,
    initial_rto: u64,
    rto: u64,
    countdown: u64,
    timing: bool,
    consecutive_retx: u32,
}

impl Sender {
    /// `capacity` bounds the outgoing byte stream, `retx_timeout` is
    /// the initial retransmission timeout in milliseconds, and
    /// `fixed_isn` pins the initial sequence number (otherwise one is
    /// drawn at random).
    pub fn new(capacity: usize, retx_timeout: u64, fixed_isn: Option<SeqNum>) -> Self {
        let isn = fixed_isn.unwrap_or_else(|| SeqNum::new(rand::random()));
        Sender {
            isn,
            segments_out: VecDeque::new(),
            stream: ByteStream::new(capacity),
            next_seqno: 0,
            sent_syn: false,
            sent_fin: false,
            window_begin: 0,
            window_size: 1,
            peer_window_zero: false,
            bytes_in_flight: 0,
            outstanding: VecDeque::new(),
            checkpoint: 0,
            initial_rto: retx_timeout,
            rto: retx_timeout,
            countdown: retx_timeout,
            timing: false,
            consecutive_retx: 0,
        }
    }

    pub fn stream_in(&self) -> &ByteStream {
        &self.stream
    }

    pub fn stream_in_mut(&mut self) -> &mut ByteStream {
        &mut self.stream
    }

    /// Emit as many segments as the window allows: first the SYN, then
    /// payload segments of at most [`MAX_PAYLOAD_SIZE`] bytes, with the
    /// FIN piggybacked on the last one if the window still has a
    /// sequence number to spare, or sent on its own once the stream has
    /// ended and drained.
    pub fn fill_window(&mut self) {
        if !self.sent_syn {
            let seg = Segment::syn(self.isn);
            log::debug!("[snd] → {seg}");
            self.send(seg);
            self.sent_syn = true;
            self.next_seqno = 1;
            return;
        }
        if self.sent_fin {
            return;
        }
        let window_end = self.window_begin + self.window_size;
        if window_end <= self.next_seqno {
            return;
        }
        let mut remaining = window_end - self.next_seqno;

        if self.stream.eof() {
            let mut seg = Segment::empty(self.next_seqno());
            seg.header.fin = true;
            log::debug!("[snd] → {seg}");
            self.send(seg);
            self.next_seqno += 1;
            self.sent_fin = true;
            return;
        }

        while remaining > 0 && !self.stream.buffer_empty() && !self.sent_fin {
            let max_read = remaining.min(MAX_PAYLOAD_SIZE as u64);
            let read_size = max_read.min(self.stream.buffer_size() as u64) as usize;
            let data = self
                .stream
                .read(read_size)
                .expect("read stays within the buffered length");
            let fin = self.stream.eof() && (read_size as u64) < remaining;
            let mut seg = Segment::with_payload(self.next_seqno(), data);
            if fin {
                seg.header.fin = true;
                self.sent_fin = true;
            }
            log::trace!("[snd] → {seg}");
            self.send(seg);
            let consumed = read_size as u64 + fin as u64;
            remaining -= consumed;
            self.next_seqno += consumed;
        }
    }

    /// Apply an acknowledgment and window update from the peer.
    ///
    /// An ackno beyond anything ever sent is ignored. Re-delivering the
    /// same ackno/window pair is idempotent.
    pub fn ack_received(&mut self, ackno: SeqNum, window: u16) {
        let abs_ackno = self.abs_ackno(ackno);
        if abs_ackno > self.next_seqno {
            log::trace!("[snd] ← ack={ackno} beyond next seqno, ignored");
            return;
        }
        self.window_begin = abs_ackno;
        self.peer_window_zero = window == 0;
        self.window_size = if self.peer_window_zero { 1 } else { window as u64 };

        while let Some(front) = self.outstanding.front() {
            if front.end() > abs_ackno {
                break;
            }
            self.bytes_in_flight -= front.seg.len_in_sequence_space() as u64;
            self.outstanding.pop_front();
        }

        if abs_ackno > 1 && abs_ackno > self.checkpoint {
            // genuine progress past the SYN ack: timer falls back to
            // the initial timeout and the retransmit streak ends
            self.rto = self.initial_rto;
            self.countdown = self.rto;
            self.timing = false;
            self.consecutive_retx = 0;
            if !self.outstanding.is_empty() {
                self.begin_timing();
            }
        }
        if abs_ackno > self.checkpoint {
            self.checkpoint = abs_ackno;
        }
        if self.outstanding.is_empty() {
            debug_assert_eq!(self.bytes_in_flight, 0);
            self.timing = false;
        }
    }

    /// Advance the retransmission timer by `ms` milliseconds. On
    /// expiry the oldest outstanding segment is resent unmodified and
    /// the timeout doubles, unless the stall is the peer's own doing
    /// (a genuinely zero advertised window).
    pub fn tick(&mut self, ms: u64) {
        if !self.timing {
            return;
        }
        if self.countdown > ms {
            self.countdown -= ms;
            return;
        }
        self.countdown = 0;
        let seg = self
            .outstanding
            .front()
            .expect("timer only runs while segments are outstanding")
            .seg
            .clone();
        log::debug!("[snd] ⏱ rto expired; → {seg} (retransmit)");
        self.segments_out.push_back(seg);
        self.consecutive_retx += 1;
        if !self.peer_window_zero {
            self.rto *= 2;
        }
        self.countdown = self.rto;
    }

    /// Queue a payload-less, flag-less segment at the next sequence
    /// number. Used for acknowledgments; consumes no sequence space and
    /// is never retransmitted.
    pub fn send_empty_segment(&mut self) {
        self.segments_out
            .push_back(Segment::empty(self.next_seqno()));
    }

    /// Sequence-space length of everything sent but not yet acknowledged.
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    /// Timer expirations in a row without an acknowledgment making
    /// progress; the connection uses this to declare the link dead.
    pub fn consecutive_retransmissions(&self) -> u32 {
        self.consecutive_retx
    }

    pub fn next_seqno_abs(&self) -> u64 {
        self.next_seqno
    }

    pub fn next_seqno(&self) -> SeqNum {
        seq::wrap(self.next_seqno, self.isn)
    }

    pub fn segments_out_mut(&mut self) -> &mut VecDeque<Segment> {
        &mut self.segments_out
    }

    pub(crate) fn abs_ackno(&self, ackno: SeqNum) -> u64 {
        seq::unwrap(ackno, self.isn, self.checkpoint)
    }

    fn send(&mut self, seg: Segment) {
        debug_assert!(seg.len_in_sequence_space() > 0);
        if !self.timing {
            self.begin_timing();
        }
        self.bytes_in_flight += seg.len_in_sequence_space() as u64;
        self.outstanding.push_back(Outstanding {
            seg: seg.clone(),
            seqno: self.next_seqno,
        });
        self.segments_out.push_back(seg);
    }

    fn begin_timing(&mut self) {
        self.countdown = self.rto;
        self.timing = true;
        self.consecutive_retx = 0;
    }
}
