use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::DatagramChannel;

/// Smallest read timeout handed to the socket. `set_read_timeout` rejects zero.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// UDP transport connected to a single remote peer.
///
/// The socket is `connect`ed, so the kernel filters out datagrams from any
/// other source address and `send` needs no destination.
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpChannel {
    /// Bind an ephemeral local port and connect to `remote`.
    pub fn connect(remote: SocketAddr) -> Result<Self> {
        let local = match remote {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        Self::connect_from(local, remote)
    }

    /// Bind `local` and connect to `remote`.
    pub fn connect_from(local: SocketAddr, remote: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;
        socket
            .connect(remote)
            .map_err(|source| TransportError::Connect {
                addr: remote,
                source,
            })?;
        debug!(%local, %remote, "udp channel connected");
        Ok(Self {
            socket,
            peer: remote,
        })
    }

    /// Wrap a socket that has already been bound and connected.
    pub fn from_socket(socket: UdpSocket) -> Result<Self> {
        let peer = socket.peer_addr()?;
        Ok(Self { socket, peer })
    }

    /// The remote address this channel is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The local address of the underlying socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }
}

impl DatagramChannel for UdpChannel {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        loop {
            match self.socket.send(datagram) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// An ICMP port-unreachable reported for an earlier `send` surfaces here
    /// as `ConnectionRefused`. It is logged and read as "no datagram", so a
    /// silent peer and a closed port both end in the caller's timeout.
    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        self.socket
            .set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;
        match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(err)
                if err.kind() == ErrorKind::WouldBlock
                    || err.kind() == ErrorKind::TimedOut
                    || err.kind() == ErrorKind::Interrupted =>
            {
                Ok(None)
            }
            Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                debug!(peer = %self.peer, "peer port unreachable");
                Ok(None)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}

impl std::fmt::Debug for UdpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpChannel")
            .field("local", &self.socket.local_addr().ok())
            .field("peer", &self.peer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn loopback_pair() -> (UdpChannel, UdpSocket) {
        let remote = UdpSocket::bind("127.0.0.1:0").unwrap();
        let channel = UdpChannel::connect(remote.local_addr().unwrap()).unwrap();
        let local = channel.local_addr().unwrap();
        remote
            .connect(SocketAddr::from((Ipv4Addr::LOCALHOST, local.port())))
            .unwrap();
        (channel, remote)
    }

    #[test]
    fn send_and_receive_datagram() {
        let (channel, remote) = loopback_pair();

        channel.send(b"ping").unwrap();
        let mut buf = [0u8; 16];
        let n = remote.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");

        remote.send(b"pong").unwrap();
        let n = channel
            .recv(&mut buf, Duration::from_secs(1))
            .unwrap()
            .expect("datagram should arrive");
        assert_eq!(&buf[..n], b"pong");
    }

    #[test]
    fn recv_times_out_without_traffic() {
        let (channel, _remote) = loopback_pair();
        let mut buf = [0u8; 16];

        let start = Instant::now();
        let result = channel.recv(&mut buf, Duration::from_millis(30)).unwrap();
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let (channel, _remote) = loopback_pair();
        let mut buf = [0u8; 4];
        let result = channel.recv(&mut buf, Duration::ZERO).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn unreachable_peer_reads_as_no_datagram() {
        let closed = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);

        let channel = UdpChannel::connect(addr).unwrap();
        channel.send(b"hello").unwrap();
        let mut buf = [0u8; 16];
        for _ in 0..3 {
            let result = channel.recv(&mut buf, Duration::from_millis(30)).unwrap();
            assert!(result.is_none());
        }
    }

    #[test]
    fn from_socket_requires_connected_socket() {
        let unconnected = UdpSocket::bind("127.0.0.1:0").unwrap();
        let result = UdpChannel::from_socket(unconnected);
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}
