//! Protocol-level tests against a hand-driven peer.
//!
//! The peer is a plain `tokio::net::UdpSocket` that crafts packets with the
//! codec directly, so each test controls exactly which DATA and ACK packets
//! the endpoint under test sees, and in what order.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use rdt_over_udp::checksum;
use rdt_over_udp::packet::{Packet, PacketType};
use rdt_over_udp::simulator::corrupt_byte;
use rdt_over_udp::{Connection, NetworkConfig, PAYLOAD_MAX, TWAIT};
use tokio::net::UdpSocket;
use tokio::time::timeout;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An endpoint and a raw peer socket, pointed at each other.
async fn setup() -> (Connection, UdpSocket) {
    let raw = UdpSocket::bind("127.0.0.1:0").await.expect("bind raw peer");
    let mut conn = Connection::create(NetworkConfig::default()).expect("create");
    conn.bind(0).expect("bind");
    conn.set_peer(raw.local_addr().unwrap());
    (conn, raw)
}

fn addr_of(conn: &Connection) -> SocketAddr {
    let port = conn.local_addr().unwrap().port();
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

/// Read one packet from the raw peer, failing the test after two seconds.
async fn next_packet(raw: &UdpSocket) -> Packet {
    let mut buf = vec![0u8; PAYLOAD_MAX + 64];
    let (n, _) = timeout(Duration::from_secs(2), raw.recv_from(&mut buf))
        .await
        .expect("peer saw nothing")
        .expect("peer recv");
    assert!(checksum::verify(&buf[..n]), "endpoint sent a corrupted packet");
    Packet::decode(&buf[..n]).expect("decode")
}

/// `true` if nothing arrives at the raw peer within `wait`.
async fn silent_for(raw: &UdpSocket, wait: Duration) -> bool {
    let mut buf = vec![0u8; PAYLOAD_MAX + 64];
    timeout(wait, raw.recv_from(&mut buf)).await.is_err()
}

async fn send_raw(raw: &UdpSocket, to: SocketAddr, pkt: &Packet) {
    raw.send_to(&pkt.encode(), to).await.expect("raw send");
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

#[tokio::test]
async fn in_order_data_is_delivered_once_and_acked() {
    let (mut conn, raw) = setup().await;
    let to = addr_of(&conn);

    send_raw(&raw, to, &Packet::data(0, b"first")).await;
    send_raw(&raw, to, &Packet::data(0, b"first")).await;
    send_raw(&raw, to, &Packet::data(1, b"second")).await;

    assert_eq!(conn.recv(PAYLOAD_MAX).await.unwrap(), b"first");
    assert_eq!(conn.recv(PAYLOAD_MAX).await.unwrap(), b"second");
    assert_eq!(conn.receiver.expected_seq_num, 2);

    // Accept 0, re-ack 0 for the duplicate, accept 1.
    let mut acks = Vec::new();
    for _ in 0..3 {
        let pkt = next_packet(&raw).await;
        acks.push((pkt.kind, pkt.seq, pkt.length));
    }
    assert_eq!(
        acks,
        [
            (PacketType::Ack, 0, 5),
            (PacketType::Ack, 0, 5),
            (PacketType::Ack, 1, 6),
        ]
    );
}

#[tokio::test]
async fn out_of_order_data_is_never_delivered() {
    let (mut conn, raw) = setup().await;
    let to = addr_of(&conn);

    send_raw(&raw, to, &Packet::data(3, b"future")).await;

    let pending = timeout(Duration::from_millis(100), conn.recv(PAYLOAD_MAX)).await;
    assert!(pending.is_err(), "out-of-order payload was delivered");
    assert_eq!(conn.receiver.expected_seq_num, 0);

    let reack = next_packet(&raw).await;
    assert_eq!(reack.kind, PacketType::Ack);
    assert_eq!(reack.seq, 255);
}

#[tokio::test]
async fn corrupted_and_ack_packets_are_skipped() {
    let (mut conn, raw) = setup().await;
    let to = addr_of(&conn);

    let mut damaged = Packet::data(0, b"payload").encode();
    corrupt_byte(&mut damaged, 8);
    raw.send_to(&damaged, to).await.unwrap();
    send_raw(&raw, to, &Packet::ack(4, 0)).await;
    raw.send_to(&[12, 0, 0], to).await.unwrap();
    send_raw(&raw, to, &Packet::data(0, b"payload")).await;

    assert_eq!(conn.recv(PAYLOAD_MAX).await.unwrap(), b"payload");

    let ack = next_packet(&raw).await;
    assert_eq!((ack.kind, ack.seq), (PacketType::Ack, 0));
    assert!(silent_for(&raw, Duration::from_millis(100)).await);
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

#[tokio::test]
async fn final_ack_alone_completes_the_batch() {
    let (mut conn, raw) = setup().await;
    let to = addr_of(&conn);

    let peer = async {
        let mut seqs = Vec::new();
        for _ in 0..3 {
            let pkt = next_packet(&raw).await;
            assert_eq!(pkt.kind, PacketType::Data);
            seqs.push(pkt.seq);
        }
        assert_eq!(seqs, [0, 1, 2]);
        send_raw(&raw, to, &Packet::ack(2, 500)).await;
    };

    let (sent, ()) = tokio::join!(conn.send(&[1u8; 2500]), peer);
    assert_eq!(sent.unwrap(), 2500);
}

#[tokio::test]
async fn partial_ack_limits_retransmission_to_unacked_segments() {
    let (mut conn, raw) = setup().await;
    let to = addr_of(&conn);

    let peer = async {
        for _ in 0..3 {
            next_packet(&raw).await;
        }
        send_raw(&raw, to, &Packet::ack(0, 1000)).await;

        // Let the ACK land, then skip ahead to a quiet gap between rounds.
        tokio::time::sleep(Duration::from_millis(120)).await;
        while !silent_for(&raw, Duration::from_millis(10)).await {}

        let mut seqs = vec![next_packet(&raw).await.seq, next_packet(&raw).await.seq];
        seqs.sort_unstable();
        assert_eq!(seqs, [1, 2]);

        send_raw(&raw, to, &Packet::ack(2, 500)).await;
    };

    let (sent, ()) = tokio::join!(conn.send(&[0u8; 2500]), peer);
    assert_eq!(sent.unwrap(), 2500);
}

#[tokio::test]
async fn stale_ack_is_ignored_while_sending() {
    let (mut conn, raw) = setup().await;
    let to = addr_of(&conn);
    conn.sender.next_seq_num = 10;

    let peer = async {
        let pkt = next_packet(&raw).await;
        assert_eq!(pkt.seq, 10);
        send_raw(&raw, to, &Packet::ack(9, 3)).await;
        send_raw(&raw, to, &Packet::ack(200, 3)).await;

        // The endpoint is still waiting, so it retransmits.
        let retry = next_packet(&raw).await;
        assert_eq!((retry.kind, retry.seq), (PacketType::Data, 10));
        send_raw(&raw, to, &Packet::ack(10, 3)).await;
    };

    let (sent, ()) = tokio::join!(conn.send(b"abc"), peer);
    assert_eq!(sent.unwrap(), 3);
    assert_eq!(conn.sender.next_seq_num, 11);
}

#[tokio::test]
async fn peer_retransmission_during_send_is_reacked() {
    let (mut conn, raw) = setup().await;
    let to = addr_of(&conn);
    conn.receiver.expected_seq_num = 8;

    let peer = async {
        let data = next_packet(&raw).await;
        assert_eq!(data.kind, PacketType::Data);

        // Pretend our ACK for segment 7 went missing.
        send_raw(&raw, to, &Packet::data(7, b"again")).await;
        let reack = loop {
            let pkt = next_packet(&raw).await;
            if pkt.kind == PacketType::Ack {
                break pkt;
            }
        };
        assert_eq!(reack.seq, 7);
        assert_eq!(reack.length, 5);

        send_raw(&raw, to, &Packet::ack(data.seq, data.length)).await;
    };

    let (sent, ()) = tokio::join!(conn.send(b"hello"), peer);
    assert_eq!(sent.unwrap(), 5);
    assert_eq!(conn.receiver.expected_seq_num, 8);
}

// ---------------------------------------------------------------------------
// Drain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn close_reacks_late_retransmission_and_restarts_wait() {
    let (mut conn, raw) = setup().await;
    let to = addr_of(&conn);

    send_raw(&raw, to, &Packet::data(0, b"last")).await;
    assert_eq!(conn.recv(PAYLOAD_MAX).await.unwrap(), b"last");
    assert_eq!(next_packet(&raw).await.seq, 0);

    let started = Instant::now();
    let closing = tokio::spawn(conn.close());

    // The final ACK "was lost": retransmit inside TWAIT.
    let delay = Duration::from_millis(100);
    tokio::time::sleep(delay).await;
    send_raw(&raw, to, &Packet::data(0, b"last")).await;

    let reack = next_packet(&raw).await;
    assert_eq!((reack.kind, reack.seq, reack.length), (PacketType::Ack, 0, 4));

    timeout(Duration::from_secs(5), closing)
        .await
        .expect("close hung")
        .unwrap()
        .expect("close failed");
    assert!(started.elapsed() >= delay + TWAIT);
}

#[tokio::test]
async fn close_returns_after_twait_of_silence() {
    let (conn, raw) = setup().await;

    let started = Instant::now();
    timeout(Duration::from_secs(5), conn.close())
        .await
        .expect("close hung")
        .expect("close failed");
    let elapsed = started.elapsed();
    assert!(elapsed >= TWAIT);
    assert!(silent_for(&raw, Duration::from_millis(50)).await);
}
