//! Test doubles: an in-memory scripted channel and a UDP flight controller.

use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dronelink_frame::{
    decode_segment, Segment, CONNECTION_ACCEPTED, END_TELEMETRY, SET_RC, START_CONNECTION,
    START_TELEMETRY, TELEMETRY_ACCEPTED,
};
use dronelink_transport::{DatagramChannel, Result as TransportResult, TransportError};

/// Encode one segment into a datagram.
pub(crate) fn datagram(code: u16, payload: &[i16]) -> Vec<u8> {
    Segment::new(code, payload.to_vec())
        .to_bytes()
        .expect("test segment should encode")
        .to_vec()
}

/// Channel fed from a queue; records everything sent.
#[derive(Default)]
pub(crate) struct ScriptedChannel {
    inbound: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    arrived: Condvar,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, datagram: Vec<u8>) {
        self.inbound.lock().unwrap().push_back(Ok(datagram));
        self.arrived.notify_all();
    }

    pub(crate) fn push_error(&self, kind: io::ErrorKind) {
        self.inbound
            .lock()
            .unwrap()
            .push_back(Err(io::Error::from(kind)));
        self.arrived.notify_all();
    }

    pub(crate) fn sent_codes(&self) -> Vec<u16> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|d| decode_segment(d).expect("sent datagram should decode").code())
            .collect()
    }
}

impl DatagramChannel for ScriptedChannel {
    fn send(&self, datagram: &[u8]) -> TransportResult<usize> {
        self.sent.lock().unwrap().push(datagram.to_vec());
        Ok(datagram.len())
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> TransportResult<Option<usize>> {
        let mut inbound = self.inbound.lock().unwrap();
        if inbound.is_empty() {
            inbound = self.arrived.wait_timeout(inbound, timeout).unwrap().0;
        }
        match inbound.pop_front() {
            Some(Ok(datagram)) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(Some(n))
            }
            Some(Err(err)) => Err(TransportError::Io(err)),
            None => Ok(None),
        }
    }
}

type Responder = Box<dyn FnMut(&Segment) -> Vec<Vec<u8>> + Send>;

/// Behavior of a [`FakeDrone`].
pub(crate) struct Script {
    responder: Responder,
    stream: Vec<Vec<u8>>,
    stream_interval: Duration,
    honors_end_telemetry: bool,
}

impl Script {
    /// Accepts the connection and telemetry, echoes RC commands.
    pub(crate) fn standard() -> Self {
        Self::with_responder(|segment| match segment.code() {
            START_CONNECTION => vec![datagram(CONNECTION_ACCEPTED, &[0])],
            START_TELEMETRY => vec![datagram(TELEMETRY_ACCEPTED, &[0])],
            SET_RC => vec![datagram(SET_RC, segment.payload())],
            _ => Vec::new(),
        })
    }

    /// Answer each received segment with the returned datagrams.
    pub(crate) fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&Segment) -> Vec<Vec<u8>> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            stream: Vec::new(),
            stream_interval: Duration::from_millis(10),
            honors_end_telemetry: true,
        }
    }

    /// Datagrams sent round-robin while telemetry is on.
    pub(crate) fn streaming(mut self, stream: Vec<Vec<u8>>) -> Self {
        self.stream = stream;
        self
    }

    /// Keep streaming after END_TELEMETRY, like a controller that lost it.
    pub(crate) fn ignoring_end_telemetry(mut self) -> Self {
        self.honors_end_telemetry = false;
        self
    }
}

/// A flight controller on a loopback UDP socket, running on its own thread.
pub(crate) struct FakeDrone {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Segment>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeDrone {
    pub(crate) fn spawn(mut script: Script) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("drone socket should bind");
        socket
            .set_read_timeout(Some(Duration::from_millis(5)))
            .expect("read timeout should apply");
        let addr = socket.local_addr().expect("drone socket should have an address");

        let received = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let log = Arc::clone(&received);
        let stopped = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 512];
            let mut client: Option<SocketAddr> = None;
            let mut streaming = false;
            let mut next_stream = 0usize;
            let mut last_stream = Instant::now();

            while !stopped.load(Ordering::SeqCst) {
                if let Ok((n, from)) = socket.recv_from(&mut buf) {
                    client = Some(from);
                    if let Ok(segment) = decode_segment(&buf[..n]) {
                        match segment.code() {
                            START_TELEMETRY => streaming = true,
                            END_TELEMETRY if script.honors_end_telemetry => streaming = false,
                            _ => {}
                        }
                        for reply in (script.responder)(&segment) {
                            let _ = socket.send_to(&reply, from);
                        }
                        log.lock().unwrap().push(segment);
                    }
                }

                if let Some(to) = client {
                    if streaming
                        && !script.stream.is_empty()
                        && last_stream.elapsed() >= script.stream_interval
                    {
                        let packet = &script.stream[next_stream % script.stream.len()];
                        let _ = socket.send_to(packet, to);
                        next_stream += 1;
                        last_stream = Instant::now();
                    }
                }
            }
        });

        Self {
            addr,
            received,
            stop,
            handle: Some(handle),
        }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Codes received so far, in arrival order.
    pub(crate) fn received_codes(&self) -> Vec<u16> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(Segment::code)
            .collect()
    }

    /// Wait until `code` has been received, or panic after `timeout`.
    pub(crate) fn wait_for(&self, code: u16, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !self.received_codes().contains(&code) {
            assert!(
                Instant::now() < deadline,
                "drone never received code {code}; got {:?}",
                self.received_codes()
            );
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for FakeDrone {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
