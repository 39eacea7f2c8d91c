//! End-to-end tests: two connections wired back to back, with the
//! test acting as the (lossless or lossy) wire between them.

use crate::tcp::{Config, Connection, Segment, SeqNum, TIMEOUT_DEFAULT};

const CLIENT_ISN: u32 = 1000;
const SERVER_ISN: u32 = 5000;

fn config(isn: u32) -> Config {
    Config {
        fixed_isn: Some(SeqNum::new(isn)),
        ..Config::default()
    }
}

fn pair() -> (Connection, Connection) {
    (
        Connection::new(config(CLIENT_ISN)),
        Connection::new(config(SERVER_ISN)),
    )
}

/// Shuttle queued segments both ways until neither side has more.
fn exchange(a: &mut Connection, b: &mut Connection) {
    loop {
        let mut moved = false;
        while let Some(seg) = a.segments_out_mut().pop_front() {
            b.segment_received(&seg);
            moved = true;
        }
        while let Some(seg) = b.segments_out_mut().pop_front() {
            a.segment_received(&seg);
            moved = true;
        }
        if !moved {
            break;
        }
    }
}

fn establish() -> (Connection, Connection) {
    let (mut client, mut server) = pair();
    client.connect();
    exchange(&mut client, &mut server);
    assert!(client.active() && server.active());
    assert_eq!(client.bytes_in_flight(), 0, "SYN must be acked");
    assert_eq!(server.bytes_in_flight(), 0, "SYN-ACK must be acked");
    (client, server)
}

#[test]
fn handshake_establishes_both_sides() {
    establish();
}

#[test]
fn data_flows_in_both_directions() {
    let (mut client, mut server) = establish();

    assert_eq!(client.write(b"hello").unwrap(), 5);
    exchange(&mut client, &mut server);
    assert_eq!(server.inbound_stream_mut().read(5).unwrap(), b"hello");
    assert_eq!(client.bytes_in_flight(), 0);

    assert_eq!(server.write(b"world!").unwrap(), 6);
    exchange(&mut client, &mut server);
    assert_eq!(client.inbound_stream_mut().read(6).unwrap(), b"world!");
    assert_eq!(server.bytes_in_flight(), 0);
}

#[test]
fn every_data_segment_is_acknowledged() {
    let (_, mut server) = establish();

    // hand-built data segment from the client's side of the wire
    let mut seg = Segment::with_payload(SeqNum::new(CLIENT_ISN + 1), b"x".to_vec());
    seg.header.ack = true;
    seg.header.acknowledgment_number = SERVER_ISN + 1;
    seg.header.window_size = 1000;
    server.segment_received(&seg);

    let reply = server
        .segments_out_mut()
        .pop_front()
        .expect("data must be answered within the same step");
    assert!(reply.header.ack);
    assert_eq!(reply.ackno(), SeqNum::new(CLIENT_ISN + 2));
    // the byte sits unread in the inbound buffer, shrinking the window
    assert_eq!(reply.header.window_size, 64_000 - 1);
}

#[test]
fn keep_alive_probe_gets_an_answer() {
    let (_, mut server) = establish();

    // zero-length segment one below the ackno
    let probe = Segment::empty(SeqNum::new(CLIENT_ISN));
    server.segment_received(&probe);

    let reply = server
        .segments_out_mut()
        .pop_front()
        .expect("keep-alive must be answered");
    assert!(reply.header.ack);
    assert_eq!(reply.ackno(), SeqNum::new(CLIENT_ISN + 1));
    assert_eq!(reply.len_in_sequence_space(), 0);
}

#[test]
fn close_initiated_by_one_side() {
    let (mut client, mut server) = establish();
    client.write(b"bye").unwrap();
    exchange(&mut client, &mut server);
    assert_eq!(server.inbound_stream_mut().read(3).unwrap(), b"bye");

    // client finishes first: FIN goes out, server acks it
    client.end_input_stream().unwrap();
    exchange(&mut client, &mut server);
    assert!(client.active(), "local FIN acked but peer still open");
    assert!(server.active());
    assert!(server.inbound_stream().eof());

    // the peer closed first, so the server must not linger
    server.end_input_stream().unwrap();
    exchange(&mut client, &mut server);
    assert!(!server.active(), "passive closer ends without lingering");
    assert!(client.inbound_stream().eof());
    assert!(client.active(), "active closer lingers");

    // lingering ends 10 retransmission timeouts after the last segment
    client.tick(10 * TIMEOUT_DEFAULT - 1);
    assert!(client.active());
    client.tick(1);
    assert!(!client.active());
    assert!(!client.inbound_stream().error());
    assert!(!client.outbound_stream().error());
}

#[test]
fn simultaneous_close_lingers_on_both_sides() {
    let (mut client, mut server) = establish();
    client.end_input_stream().unwrap();
    server.end_input_stream().unwrap();
    exchange(&mut client, &mut server);

    // neither side saw the peer's FIN before its own stream ended, so
    // both must absorb late retransmissions
    assert!(client.active() && server.active());
    client.tick(10 * TIMEOUT_DEFAULT);
    server.tick(10 * TIMEOUT_DEFAULT);
    assert!(!client.active() && !server.active());
    assert!(client.inbound_stream().eof() && server.inbound_stream().eof());
}

#[test]
fn connection_stays_active_until_all_close_conditions_hold() {
    let (mut client, mut server) = establish();
    client.end_input_stream().unwrap();

    // deliver the FIN but withhold the server's answer
    let fin = client.segments_out_mut().pop_front().expect("the FIN");
    assert!(fin.header.fin);
    server.segment_received(&fin);
    assert!(client.active(), "FIN not yet acked");

    // server acks; client's inbound stream still has no FIN
    while let Some(seg) = server.segments_out_mut().pop_front() {
        client.segment_received(&seg);
    }
    assert!(client.active(), "inbound stream still open");

    server.end_input_stream().unwrap();
    exchange(&mut client, &mut server);
    client.tick(10 * TIMEOUT_DEFAULT);
    assert!(!client.active() && !server.active());
}

#[test]
fn rst_tears_down_both_ends() {
    let (mut client, mut server) = establish();
    client.write(b"doomed").unwrap();
    client.abort();
    assert!(!client.active());
    assert!(client.inbound_stream().error());
    assert!(client.outbound_stream().error());

    let rst = client
        .segments_out_mut()
        .iter()
        .last()
        .expect("an RST was emitted")
        .clone();
    assert!(rst.header.rst);
    server.segment_received(&rst);
    assert!(!server.active());
    assert!(server.inbound_stream().error());
    assert!(server.outbound_stream().error());
    assert!(server.segments_out_mut().is_empty(), "an RST is not answered");
}

#[test]
fn retransmission_limit_kills_the_connection() {
    let mut client = Connection::new(config(CLIENT_ISN));
    client.connect();
    // the SYN disappears into the void, over and over
    client.segments_out_mut().clear();
    let attempts = Config::default().max_retx_attempts;
    for _ in 0..attempts {
        client.tick(1 << 20);
        client.segments_out_mut().clear();
    }
    assert!(client.active(), "still within the retransmission budget");
    // one expiry past the limit: RST out, unclean end
    client.tick(1 << 20);
    assert!(!client.active());
    let rst = client
        .segments_out_mut()
        .pop_front()
        .expect("a best-effort RST");
    assert!(rst.header.rst);
    assert!(!rst.header.ack, "no ackno exists before the handshake");
    assert!(client.outbound_stream().error());
}

#[test]
fn operations_on_a_dead_connection_fail_loudly() {
    let (mut client, mut server) = establish();
    client.abort();
    assert!(client.write(b"x").is_err());
    assert!(client.end_input_stream().is_err());

    // inbound segments are ignored outright
    server.write(b"ignored").unwrap();
    let n_before = client.inbound_stream().bytes_written();
    exchange(&mut client, &mut server);
    assert_eq!(client.inbound_stream().bytes_written(), n_before);
}

#[test]
fn lost_data_is_retransmitted_and_recovered() {
    let (mut client, mut server) = establish();
    client.write(b"precious").unwrap();

    // the wire eats the first copy
    client.segments_out_mut().clear();
    assert_eq!(client.bytes_in_flight(), 8);

    // first timeout resends it unmodified
    client.tick(TIMEOUT_DEFAULT);
    exchange(&mut client, &mut server);
    assert_eq!(server.inbound_stream_mut().read(8).unwrap(), b"precious");
    assert_eq!(client.bytes_in_flight(), 0);
}

#[test]
fn reordered_segments_still_deliver_in_order() {
    let (mut client, mut server) = establish();
    client.write(b"abc").unwrap();
    let first = client.segments_out_mut().pop_front().expect("first");
    client.write(b"def").unwrap();
    let second = client.segments_out_mut().pop_front().expect("second");

    server.segment_received(&second);
    assert_eq!(server.unassembled_bytes(), 3);
    server.segment_received(&first);
    assert_eq!(server.unassembled_bytes(), 0);
    assert_eq!(server.inbound_stream_mut().read(6).unwrap(), b"abcdef");
    exchange(&mut client, &mut server);
    assert_eq!(client.bytes_in_flight(), 0);
}
