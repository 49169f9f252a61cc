//! # Transport Layer
//!
//! Non-blocking UDP socket for the server and client binaries.
//!
//! ## Design
//!
//! - Non-blocking: `WouldBlock` means "nothing this tick", never an error
//! - Every send is fire-and-forget; failures are logged and counted
//! - Point-to-point: one remembered peer address

use std::io;
use std::net::{SocketAddr, UdpSocket};

use magsync_shared::MAX_PACKET_SIZE;
use tracing::{info, warn};

/// UDP socket wrapper.
///
/// A thin wrapper around std UDP with:
/// - Non-blocking mode
/// - A remembered peer for point-to-point sessions
/// - Packet statistics
pub struct UdpTransport {
    /// The underlying socket.
    socket: UdpSocket,
    /// Local address.
    local_addr: SocketAddr,
    /// Where [`UdpTransport::send`] goes.
    peer: Option<SocketAddr>,
    /// Receive buffer.
    recv_buffer: [u8; MAX_PACKET_SIZE],
    /// Statistics.
    stats: TransportStats,
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Packets sent.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send errors.
    pub send_errors: u64,
    /// Receive errors.
    pub recv_errors: u64,
    /// Datagrams from an address other than the peer.
    pub foreign_dropped: u64,
}

impl UdpTransport {
    /// Creates a transport bound to `addr`.
    ///
    /// # Errors
    ///
    /// Returns the socket error if binding or switching to non-blocking fails.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            peer: None,
            recv_buffer: [0u8; MAX_PACKET_SIZE],
            stats: TransportStats::default(),
        })
    }

    /// Returns the local address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the peer, if one is set.
    #[must_use]
    pub const fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Sets the peer used by [`UdpTransport::send`].
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    /// Sends a datagram to `addr`.
    ///
    /// # Errors
    ///
    /// Returns the socket error after counting it.
    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        match self.socket.send_to(data, addr) {
            Ok(n) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(e)
            }
        }
    }

    /// Sends a datagram to the peer. Fire-and-forget: errors are logged.
    ///
    /// Returns false if nothing was sent.
    pub fn send(&mut self, data: &[u8]) -> bool {
        let Some(peer) = self.peer else {
            warn!(bytes = data.len(), "No peer yet, dropping datagram");
            return false;
        };
        match self.send_to(data, peer) {
            Ok(_) => true,
            Err(err) => {
                warn!(%peer, %err, "Send failed");
                false
            }
        }
    }

    /// Receives one datagram.
    ///
    /// Returns the packet data and source address, or None if no packet available.
    pub fn recv(&mut self) -> Option<(&[u8], SocketAddr)> {
        match self.socket.recv_from(&mut self.recv_buffer) {
            Ok((len, addr)) => {
                self.stats.packets_received += 1;
                self.stats.bytes_received += len as u64;
                Some((&self.recv_buffer[..len], addr))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                self.stats.recv_errors += 1;
                warn!(err = %e, "Receive failed");
                None
            }
        }
    }

    /// Drains every pending datagram from the peer.
    ///
    /// With no peer set, the first sender becomes the peer. Datagrams from
    /// anyone else are dropped.
    pub fn recv_from_peer(&mut self) -> Vec<Vec<u8>> {
        let mut datagrams = Vec::new();
        while let Some((data, addr)) = self.recv() {
            let data = data.to_vec();
            match self.peer {
                None => {
                    info!(%addr, "Peer connected");
                    self.peer = Some(addr);
                    datagrams.push(data);
                }
                Some(peer) if peer == addr => datagrams.push(data),
                Some(_) => self.stats.foreign_dropped += 1,
            }
        }
        datagrams
    }

    /// Returns statistics.
    #[must_use]
    pub const fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback() -> UdpTransport {
        UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap()
    }

    fn recv_with_retry(transport: &mut UdpTransport) -> Vec<Vec<u8>> {
        for _ in 0..100 {
            let datagrams = transport.recv_from_peer();
            if !datagrams.is_empty() {
                return datagrams;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Vec::new()
    }

    #[test]
    fn test_empty_socket_is_not_an_error() {
        let mut transport = loopback();
        assert!(transport.recv().is_none());
        assert_eq!(transport.stats().recv_errors, 0);
    }

    #[test]
    fn test_send_without_peer() {
        let mut transport = loopback();
        assert!(!transport.send(b"lost"));
        assert_eq!(transport.stats().packets_sent, 0);
    }

    #[test]
    fn test_first_sender_becomes_peer() {
        let mut server = loopback();
        let mut client = loopback();
        let mut stranger = loopback();
        client.set_peer(server.local_addr());

        assert!(client.send(b"hello"));
        let datagrams = recv_with_retry(&mut server);
        assert_eq!(datagrams, vec![b"hello".to_vec()]);
        assert_eq!(server.peer(), Some(client.local_addr()));

        stranger.send_to(b"intruder", server.local_addr()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(server.recv_from_peer().is_empty());
        assert_eq!(server.stats().foreign_dropped, 1);

        assert!(server.send(b"reply"));
        assert_eq!(recv_with_retry(&mut client), vec![b"reply".to_vec()]);
    }
}
