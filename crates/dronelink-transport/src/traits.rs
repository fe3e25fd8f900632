use std::time::Duration;

use crate::error::Result;

/// A connected, message-oriented channel to exactly one peer.
///
/// Implementations must be shareable across threads: the session sends from
/// the caller's thread while the telemetry dispatcher receives on its own.
/// Only one thread receives at any time.
pub trait DatagramChannel: Send + Sync + 'static {
    /// Send one datagram to the peer.
    fn send(&self, datagram: &[u8]) -> Result<usize>;

    /// Wait up to `timeout` for one datagram and copy it into `buf`.
    ///
    /// Returns `Ok(None)` when the timeout elapses without traffic, including
    /// when the peer's port is reported unreachable. A datagram larger than
    /// `buf` is truncated to `buf.len()`.
    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>>;
}

impl<T: DatagramChannel + ?Sized> DatagramChannel for std::sync::Arc<T> {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        (**self).send(datagram)
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        (**self).recv(buf, timeout)
    }
}
