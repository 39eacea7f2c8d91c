//! The connection state machine.
//!
//! One [`Sender`] and one [`Receiver`], one per direction, composed
//! into a bidirectional connection that drives the handshake, the data
//! phase, and the closing protocol. There is no explicit state enum;
//! the state is derived from the engines' progress, which is what
//! makes the close conditions worth spelling out (see the three
//! predicates at the bottom).

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::stream::ByteStream;
use crate::tcp::receiver::Receiver;
use crate::tcp::segment::Segment;
use crate::tcp::sender::Sender;
use crate::tcp::Config;

pub struct Connection {
    cfg: Config,
    sender: Sender,
    receiver: Receiver,
    /// Fully stamped segments ready for the layer below.
    segments_out: VecDeque<Segment>,
    time_since_last_segment_received: u64,
    active: bool,
    linger_after_streams_finish: bool,
    linger_begun: bool,
    sent_syn: bool,
    sent_fin: bool,
    fin_acked: bool,
    /// Absolute sequence number of our FIN, valid once `sent_fin`.
    fin_seqno: u64,
}

impl Connection {
    pub fn new(cfg: Config) -> Self {
        let sender = Sender::new(cfg.send_capacity, cfg.rt_timeout, cfg.fixed_isn);
        let receiver = Receiver::new(cfg.recv_capacity);
        Connection {
            linger_after_streams_finish: cfg.linger_after_streams_finish,
            cfg,
            sender,
            receiver,
            segments_out: VecDeque::new(),
            time_since_last_segment_received: 0,
            active: true,
            linger_begun: false,
            sent_syn: false,
            sent_fin: false,
            fin_acked: false,
            fin_seqno: 0,
        }
    }

    /// Initiate the handshake by sending our SYN.
    pub fn connect(&mut self) {
        self.sender.fill_window();
        self.flush();
    }

    /// Process one inbound segment. Ignored entirely once the
    /// connection is inactive.
    pub fn segment_received(&mut self, seg: &Segment) {
        if !self.active {
            return;
        }
        let header = &seg.header;

        if self.receiver.ackno().is_none() && !header.syn {
            // an RST answering our SYN means the peer refused us
            if header.rst
                && header.ack
                && self.sent_syn
                && self.sender.abs_ackno(seg.ackno()) == 1
            {
                log::warn!("[conn] ← {seg}; connection refused");
                self.end_uncleanly();
            }
            return;
        }
        self.time_since_last_segment_received = 0;

        if header.rst {
            log::warn!("[conn] ← {seg}; unclean shutdown");
            self.end_uncleanly();
            return;
        }

        self.receiver.segment_received(seg);
        self.check_no_linger_needed();

        // a zero-length segment one below the ackno is a keep-alive probe
        if seg.len_in_sequence_space() == 0 {
            if let Some(ackno) = self.receiver.ackno() {
                if seg.seqno() == ackno.wrapping_sub(1) {
                    log::trace!("[conn] ← keep-alive; answering");
                    self.sender.send_empty_segment();
                }
            }
        }

        if header.ack {
            self.sender.ack_received(seg.ackno(), header.window_size);
            if self.sent_fin && self.sender.abs_ackno(seg.ackno()) == self.fin_seqno + 1 {
                self.fin_acked = true;
            }
        }

        self.sender.fill_window();
        // every inbound segment that consumed sequence space gets an
        // answer, even when the sender has nothing of its own to say
        if self.sender.segments_out_mut().is_empty() && seg.len_in_sequence_space() != 0 {
            self.sender.send_empty_segment();
        }
        self.flush();
        self.try_finish();
    }

    /// Push application bytes into the outbound stream, returning how
    /// many were accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.active {
            return Err(Error::ConnectionClosed);
        }
        let len = self.sender.stream_in_mut().write(data)?;
        self.sender.fill_window();
        self.flush();
        self.try_finish();
        Ok(len)
    }

    /// Advance time by `ms` milliseconds: drives the retransmission
    /// timer, the dead-link limit, and the lingering countdown.
    pub fn tick(&mut self, ms: u64) {
        if !self.active {
            return;
        }
        self.time_since_last_segment_received += ms;

        self.sender.tick(ms);
        if self.sender.consecutive_retransmissions() > self.cfg.max_retx_attempts {
            log::warn!(
                "[conn] {} consecutive retransmissions; giving up",
                self.sender.consecutive_retransmissions()
            );
            self.send_rst();
            self.end_uncleanly();
            return;
        }
        self.flush();

        if self.linger_after_streams_finish && self.linger_begun {
            if self.time_since_last_segment_received >= 10 * self.cfg.rt_timeout {
                log::debug!("[conn] linger period over");
                self.linger_after_streams_finish = false;
                self.end_cleanly();
            }
        } else {
            self.try_finish();
        }
    }

    /// The application has no more data to send; a FIN will follow the
    /// remaining bytes out.
    pub fn end_input_stream(&mut self) -> Result<()> {
        if !self.active {
            return Err(Error::ConnectionClosed);
        }
        self.sender.stream_in_mut().end_input();
        self.sender.fill_window();
        self.flush();
        self.try_finish();
        Ok(())
    }

    /// Abandon the connection: a best-effort RST goes out and both
    /// streams are marked errored. Must be called before dropping a
    /// still-active connection if the peer is to learn of the abort;
    /// dropping without it releases everything but tells nobody.
    /// No-op when already inactive.
    pub fn abort(&mut self) {
        if !self.active {
            return;
        }
        log::warn!("[conn] aborted while active; → RST");
        self.send_rst();
        self.end_uncleanly();
    }

    /// `false` once the connection has fully ended, cleanly or not.
    pub fn active(&self) -> bool {
        self.active
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.receiver.unassembled_bytes()
    }

    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in().remaining_capacity()
    }

    pub fn time_since_last_segment_received(&self) -> u64 {
        self.time_since_last_segment_received
    }

    /// The inbound byte stream, where reassembled peer data is read.
    pub fn inbound_stream(&self) -> &ByteStream {
        self.receiver.stream_out()
    }

    pub fn inbound_stream_mut(&mut self) -> &mut ByteStream {
        self.receiver.stream_out_mut()
    }

    /// The outbound byte stream, to observe its eof/error state.
    pub fn outbound_stream(&self) -> &ByteStream {
        self.sender.stream_in()
    }

    /// Fully stamped segments awaiting the layer below.
    pub fn segments_out_mut(&mut self) -> &mut VecDeque<Segment> {
        &mut self.segments_out
    }

    /// Move everything the sender queued into the public queue,
    /// stamping each segment with the current ackno and advertised
    /// window on the way out.
    fn flush(&mut self) {
        while let Some(mut seg) = self.sender.segments_out_mut().pop_front() {
            if seg.header.syn {
                self.sent_syn = true;
            }
            debug_assert!(self.sent_syn, "no segment may leave before the SYN");
            if let Some(ackno) = self.receiver.ackno() {
                seg.header.ack = true;
                seg.header.acknowledgment_number = ackno.raw();
            }
            seg.header.window_size = self.clamped_window();
            if seg.header.fin {
                self.sent_fin = true;
                // SYN plus every payload byte read out of the stream
                self.fin_seqno = self.sender.stream_in().bytes_read() + 1;
            }
            log::trace!("[conn] → {seg}");
            self.segments_out.push_back(seg);
        }
    }

    fn clamped_window(&self) -> u16 {
        self.receiver.window_size().min(u16::MAX as usize) as u16
    }

    /// Best-effort RST: goes out unacked when the handshake never got
    /// far enough to have an ackno.
    fn send_rst(&mut self) {
        let mut seg = Segment::empty(self.sender.next_seqno());
        seg.header.rst = true;
        if let Some(ackno) = self.receiver.ackno() {
            seg.header.ack = true;
            seg.header.acknowledgment_number = ackno.raw();
            seg.header.window_size = self.clamped_window();
        }
        self.segments_out.push_back(seg);
    }

    /// Close condition 1: FIN received, reassembled, nothing pending.
    fn inbound_fully_received(&self) -> bool {
        self.receiver.stream_out().eof() && self.receiver.unassembled_bytes() == 0
    }

    /// Close condition 2: the application finished writing and
    /// everything, FIN included, has left and come back acknowledged
    /// out of flight.
    fn outbound_fully_sent(&self) -> bool {
        self.sender.stream_in().eof() && self.sent_fin && self.sender.bytes_in_flight() == 0
    }

    fn try_finish(&mut self) {
        // condition 3 is the FIN ack itself
        if self.inbound_fully_received() && self.outbound_fully_sent() && self.fin_acked {
            self.end_cleanly();
        }
    }

    /// If the peer's stream ended before ours did, the peer closed
    /// first and gains nothing from us waiting around afterwards.
    fn check_no_linger_needed(&mut self) {
        if self.receiver.stream_out().eof() && !self.sender.stream_in().eof() {
            self.linger_after_streams_finish = false;
        }
    }

    fn end_cleanly(&mut self) {
        if !self.linger_after_streams_finish {
            self.sender.stream_in_mut().end_input();
            self.receiver.stream_out_mut().end_input();
            self.active = false;
            log::debug!("[conn] closed cleanly");
        } else {
            self.linger_begun = true;
        }
    }

    fn end_uncleanly(&mut self) {
        self.sender.stream_in_mut().set_error();
        self.receiver.stream_out_mut().set_error();
        self.linger_begun = false;
        self.linger_after_streams_finish = false;
        self.active = false;
    }
}
