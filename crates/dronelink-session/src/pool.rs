//! Fixed-size worker pool running the telemetry callback.
//!
//! The receive loop hands segments over with a non-blocking `submit`, so a
//! slow callback can fill the queue but never stall the next receive.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use dronelink_frame::Segment;
use tracing::{debug, warn};

use crate::dispatcher::TelemetrySink;
use crate::error::{Result, SessionError};

pub(crate) struct DispatchPool {
    tx: Option<Sender<Segment>>,
    workers: Vec<JoinHandle<()>>,
}

impl DispatchPool {
    pub(crate) fn start(
        sink: Arc<dyn TelemetrySink>,
        workers: usize,
        queue_depth: usize,
    ) -> Result<Self> {
        let (tx, rx) = bounded(queue_depth);

        let mut pool = Self {
            tx: Some(tx),
            workers: Vec::with_capacity(workers),
        };
        for index in 0..workers {
            let rx = rx.clone();
            let sink = Arc::clone(&sink);
            let handle = thread::Builder::new()
                .name(format!("dronelink-dispatch-{index}"))
                .spawn(move || worker_loop(rx, sink.as_ref()))
                .map_err(|err| SessionError::Spawn("dispatch worker", err))?;
            pool.workers.push(handle);
        }
        Ok(pool)
    }

    /// Queue a segment for the callback without blocking.
    ///
    /// Hands the segment back when the queue is full or the pool is shut.
    pub(crate) fn submit(&self, segment: Segment) -> std::result::Result<(), Segment> {
        let Some(tx) = &self.tx else {
            return Err(segment);
        };
        tx.try_send(segment).map_err(|err| match err {
            TrySendError::Full(segment) | TrySendError::Disconnected(segment) => segment,
        })
    }

    /// Close the queue, let workers drain it, and join them.
    pub(crate) fn shutdown(&mut self) {
        self.tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("dispatch worker exited abnormally");
            }
        }
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Receiver<Segment>, sink: &dyn TelemetrySink) {
    for segment in rx.iter() {
        let code = segment.code();
        if panic::catch_unwind(AssertUnwindSafe(|| sink.on_segment(segment))).is_err() {
            warn!(code, "telemetry callback panicked");
        }
    }
    debug!("dispatch worker exited");
}
