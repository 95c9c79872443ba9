//! [`ResyncHandler`] – applies inbound `avr/vio/resync` requests.
//!
//! Runs as its own task beside the sampling loop.  Every request goes
//! straight to the shared [`SharedDrift`]; the loop picks up the new offset
//! on its next tick.  Bad requests are logged and dropped, never fatal.

use navbridge_middleware::{TopicReceiver, Transport};
use navbridge_perception::{ResyncOutcome, SharedDrift};
use navbridge_types::{Event, NavError, NavMessage, NavTopic};
use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::{debug, info, warn};

/// Subscribes to [`NavTopic::Resync`] and feeds requests to a [`SharedDrift`].
pub struct ResyncHandler {
    drift: SharedDrift,
    receiver: TopicReceiver,
}

impl ResyncHandler {
    /// Subscribe immediately, so requests sent before [`run`][Self::run] is
    /// polled are not lost.
    pub fn new(drift: SharedDrift, transport: &dyn Transport) -> Self {
        Self {
            drift,
            receiver: transport.subscribe(NavTopic::Resync),
        }
    }

    /// Apply one resync envelope.
    ///
    /// # Errors
    ///
    /// * [`NavError::InvalidResync`] – the envelope is not a resync request,
    ///   or its pose is not finite.
    /// * [`NavError::NoReading`] – no camera reading to sync against yet.
    pub fn handle(&self, event: &Event) -> Result<ResyncOutcome, NavError> {
        match &event.payload {
            NavMessage::Resync(payload) => self.drift.handle_resync(payload),
            other => Err(NavError::InvalidResync(format!(
                "expected a resync request, got a {} message",
                other.topic()
            ))),
        }
    }

    /// Process requests until `shutdown` changes or the transport closes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!("resync handler started");
        if *shutdown.borrow() {
            return;
        }
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                received = self.receiver.recv() => match received {
                    Ok(event) => self.dispatch(&event),
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "resync handler lagged; oldest requests dropped");
                    }
                    Err(RecvError::Closed) => {
                        debug!("resync topic closed");
                        break;
                    }
                },
            }
        }
        debug!("resync handler stopped");
    }

    fn dispatch(&self, event: &Event) {
        match self.handle(event) {
            Ok(ResyncOutcome::Recomputed(_)) => {}
            Ok(ResyncOutcome::Ignored) => {
                info!(source = %event.source, "resync ignored; continuous sync is disabled");
            }
            Err(e) => {
                warn!(source = %event.source, error = %e, "resync rejected; keeping previous offset");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use navbridge_middleware::EventBus;
    use navbridge_perception::{FrameTransformer, NedReading};
    use navbridge_types::{Heading, RawSample, ResyncPayload};

    fn reading() -> NedReading {
        FrameTransformer::default().to_navigation_axes(&RawSample {
            position: [1.0, 0.0, 2.0],
            velocity: [0.0; 3],
            orientation: [0.0, 0.2, 0.0],
            tracking_confidence: 100.0,
        })
    }

    fn reference() -> ResyncPayload {
        ResyncPayload { n: 3.0, e: -4.0, d: 0.5, hdg: 45.0 }
    }

    async fn wait_for_recomputations(drift: &SharedDrift, count: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while drift.recomputations() < count {
            assert!(tokio::time::Instant::now() < deadline, "resync never applied");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn handle_applies_resync_payload() {
        let bus = EventBus::default();
        let drift = SharedDrift::new(true);
        drift.observe(reading());
        let handler = ResyncHandler::new(drift.clone(), &bus);

        let event = Event::new("test", NavMessage::Resync(reference()));
        assert!(matches!(handler.handle(&event), Ok(ResyncOutcome::Recomputed(_))));
        assert!(drift.sync_state().has_synced_once());
    }

    #[test]
    fn handle_rejects_other_payloads() {
        let bus = EventBus::default();
        let drift = SharedDrift::new(true);
        drift.observe(reading());
        let handler = ResyncHandler::new(drift.clone(), &bus);

        let event = Event::new("test", NavMessage::Heading(Heading { hdg: 10.0 }));
        assert!(matches!(handler.handle(&event), Err(NavError::InvalidResync(_))));
        assert_eq!(drift.recomputations(), 0);
    }

    #[test]
    fn handle_before_any_reading_is_no_reading() {
        let bus = EventBus::default();
        let drift = SharedDrift::new(true);
        let handler = ResyncHandler::new(drift.clone(), &bus);

        let event = Event::new("test", NavMessage::Resync(reference()));
        assert_eq!(handler.handle(&event), Err(NavError::NoReading));
        assert!(!drift.sync_state().has_synced_once());
    }

    #[tokio::test]
    async fn run_applies_requests_from_the_bus() {
        let bus = EventBus::default();
        let drift = SharedDrift::new(true);
        drift.observe(reading());
        let handler = ResyncHandler::new(drift.clone(), &bus);

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(handler.run(rx));

        bus.send_message(NavMessage::Resync(reference())).unwrap();
        wait_for_recomputations(&drift, 1).await;
        bus.send_message(NavMessage::Resync(ResyncPayload { hdg: 90.0, ..reference() }))
            .unwrap();
        wait_for_recomputations(&drift, 2).await;

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn bad_requests_do_not_stop_the_handler() {
        let bus = EventBus::default();
        let drift = SharedDrift::new(true);
        drift.observe(reading());
        let handler = ResyncHandler::new(drift.clone(), &bus);

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(handler.run(rx));

        bus.send_message(NavMessage::Resync(ResyncPayload { n: f64::NAN, ..reference() }))
            .unwrap();
        bus.send_message(NavMessage::Resync(reference())).unwrap();
        wait_for_recomputations(&drift, 1).await;

        let offset = drift.offset();
        assert!(offset.translation().is_finite());

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn one_shot_sync_ignores_later_requests() {
        let bus = EventBus::default();
        let drift = SharedDrift::new(false);
        drift.observe(reading());
        let handler = ResyncHandler::new(drift.clone(), &bus);

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(handler.run(rx));

        bus.send_message(NavMessage::Resync(reference())).unwrap();
        wait_for_recomputations(&drift, 1).await;
        let first = drift.offset();

        bus.send_message(NavMessage::Resync(ResyncPayload { hdg: 180.0, ..reference() }))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(drift.recomputations(), 1);
        assert_eq!(drift.offset(), first);

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_an_idle_handler() {
        let bus = EventBus::default();
        let handler = ResyncHandler::new(SharedDrift::new(true), &bus);
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(handler.run(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("handler did not stop")
            .unwrap();
    }
}
