//! Correlates synchronous requests with replies read by the telemetry loop.
//!
//! While telemetry is active the dispatcher is the only reader of the
//! channel. A caller waiting for a reply registers the code it expects; the
//! dispatcher hands the first segment with that code to the caller and every
//! other segment to the telemetry sink. A segment reaches exactly one of them.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use dronelink_frame::Segment;
use dronelink_transport::TransportError;
use tracing::debug;

struct PendingReply {
    code: u16,
    tx: Sender<Segment>,
}

#[derive(Default)]
struct RouterState {
    pending: Option<PendingReply>,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct ReplyRouter {
    state: Mutex<RouterState>,
}

impl ReplyRouter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register interest in the next segment carrying `code`.
    ///
    /// Must be called before the request is sent. Replaces any earlier
    /// registration. Fails once the dispatcher has shut the router.
    pub(crate) fn register(&self, code: u16) -> Result<Receiver<Segment>, TransportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = bounded(1);
        state.pending = Some(PendingReply { code, tx });
        Ok(rx)
    }

    /// Drop the registration for `code`, if it is still pending.
    pub(crate) fn cancel(&self, code: u16) {
        let mut state = self.lock();
        if state.pending.as_ref().is_some_and(|p| p.code == code) {
            state.pending = None;
        }
    }

    /// Offer an inbound segment to the pending request.
    ///
    /// Returns the segment back when nobody claimed it, so the caller routes
    /// it to the telemetry sink instead.
    pub(crate) fn offer(&self, segment: Segment) -> Option<Segment> {
        let mut state = self.lock();
        let matches = state
            .pending
            .as_ref()
            .is_some_and(|p| p.code == segment.code());
        if !matches {
            return Some(segment);
        }

        let pending = state.pending.take()?;
        match pending.tx.try_send(segment) {
            Ok(()) => {
                debug!(code = pending.code, "reply routed to waiting request");
                None
            }
            Err(TrySendError::Disconnected(segment)) | Err(TrySendError::Full(segment)) => {
                Some(segment)
            }
        }
    }

    /// Refuse further registrations and wake any waiter with a disconnect.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::RecvTimeoutError;

    use dronelink_frame::{ATTITUDE, SET_RC};

    use super::*;

    #[test]
    fn unclaimed_segment_is_returned() {
        let router = ReplyRouter::new();
        let segment = Segment::new(ATTITUDE, vec![1, 2, 3]);
        assert_eq!(router.offer(segment.clone()), Some(segment));
    }

    #[test]
    fn matching_segment_goes_to_waiter_once() {
        let router = ReplyRouter::new();
        let rx = router.register(SET_RC).unwrap();

        let telemetry = Segment::new(ATTITUDE, vec![1, 2, 3]);
        assert!(router.offer(telemetry).is_some());

        let ack = Segment::new(SET_RC, vec![1500, 1500, 1500, 1500]);
        assert!(router.offer(ack.clone()).is_none());
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).unwrap(), ack);

        // The registration is consumed; a second echo goes to telemetry.
        assert!(router.offer(ack).is_some());
    }

    #[test]
    fn abandoned_waiter_does_not_swallow_segment() {
        let router = ReplyRouter::new();
        let rx = router.register(SET_RC).unwrap();
        drop(rx);

        let ack = Segment::new(SET_RC, vec![0]);
        assert_eq!(router.offer(ack.clone()), Some(ack));
    }

    #[test]
    fn cancel_only_clears_matching_code() {
        let router = ReplyRouter::new();
        let _rx = router.register(SET_RC).unwrap();

        router.cancel(ATTITUDE);
        assert!(router.offer(Segment::new(SET_RC, vec![0])).is_none());

        let _rx = router.register(SET_RC).unwrap();
        router.cancel(SET_RC);
        assert!(router.offer(Segment::new(SET_RC, vec![0])).is_some());
    }

    #[test]
    fn close_disconnects_waiter_and_refuses_registration() {
        let router = ReplyRouter::new();
        let rx = router.register(SET_RC).unwrap();

        router.close();
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        ));
        assert!(matches!(
            router.register(SET_RC),
            Err(TransportError::Closed)
        ));
    }
}
