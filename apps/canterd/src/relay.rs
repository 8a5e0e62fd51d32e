//! The in-race UDP relay.
//!
//! Racers exchange position and effect traffic peer-to-peer through this
//! socket: every datagram fans out to all other endpoints that have sent
//! here before, prefixed with a 6-byte relay header whose last 16-bit word
//! is set to 1. Purely best effort; errors are logged and dropped.

use std::collections::HashSet;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, info};

const RELAY_HEADER_LEN: usize = 6;
const MAX_DATAGRAM: usize = 1024;

pub async fn run(socket: UdpSocket) {
    match socket.local_addr() {
        Ok(addr) => info!(addr = %addr, "p2p relay listening"),
        Err(e) => debug!(err = %e, "p2p relay local_addr unavailable"),
    }

    let mut peers: HashSet<SocketAddr> = HashSet::new();
    let mut buf = [0u8; MAX_DATAGRAM];
    let mut out = [0u8; RELAY_HEADER_LEN + MAX_DATAGRAM];

    // Relay header: three 16-bit words, the last always 1.
    out[4..6].copy_from_slice(&1u16.to_le_bytes());

    loop {
        let (len, sender) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                debug!(err = %e, "relay receive failed");
                continue;
            }
        };

        out[RELAY_HEADER_LEN..RELAY_HEADER_LEN + len].copy_from_slice(&buf[..len]);
        let datagram = &out[..RELAY_HEADER_LEN + len];

        for peer in &peers {
            if *peer == sender {
                continue;
            }
            if let Err(e) = socket.send_to(datagram, peer).await {
                debug!(peer = %peer, err = %e, "relay forward failed");
            }
        }

        peers.insert(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fans_out_to_other_senders_with_header() {
        let relay_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay_addr = relay_socket.local_addr().unwrap();
        tokio::spawn(run(relay_socket));

        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // First datagram registers `a`; nobody else is known yet.
        a.send_to(b"hello", relay_addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // `b` sends; `a` must receive it with the relay header prepended.
        b.send_to(b"position", relay_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let len = tokio::time::timeout(Duration::from_secs(2), a.recv(&mut buf))
            .await
            .expect("relay did not forward")
            .unwrap();

        assert_eq!(len, RELAY_HEADER_LEN + b"position".len());
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);
        assert_eq!(&buf[4..6], &1u16.to_le_bytes());
        assert_eq!(&buf[RELAY_HEADER_LEN..len], b"position");
    }

    #[tokio::test]
    async fn does_not_echo_to_the_sender() {
        let relay_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay_addr = relay_socket.local_addr().unwrap();
        tokio::spawn(run(relay_socket));

        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        a.send_to(b"first", relay_addr).await.unwrap();
        a.send_to(b"second", relay_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let echoed = tokio::time::timeout(Duration::from_millis(300), a.recv(&mut buf)).await;
        assert!(echoed.is_err(), "sender must not receive its own datagram");
    }
}
