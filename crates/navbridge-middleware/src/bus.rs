//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into one lane per [`NavTopic`]:
//!
//! | Topic | Direction | Traffic |
//! |---|---|---|
//! | [`NavTopic::Position`] | out | NED position, once per tick |
//! | [`NavTopic::Attitude`] | out | Euler attitude, once per tick |
//! | [`NavTopic::Heading`] | out | Heading in degrees, once per tick |
//! | [`NavTopic::Velocity`] | out | NED velocity, once per tick |
//! | [`NavTopic::Confidence`] | out | Tracker confidence, once per tick |
//! | [`NavTopic::Resync`] | in | Drift-correction references, sporadic |

use navbridge_types::{Event, NavError, NavMessage, NavTopic};
use tokio::sync::broadcast;
use tracing::trace;

use crate::transport::Transport;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Source tag stamped on envelopes built by [`EventBus::send_message`].
const BUS_SOURCE: &str = "navbridge-middleware::bus";

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    position: broadcast::Sender<Event>,
    attitude: broadcast::Sender<Event>,
    heading: broadcast::Sender<Event>,
    velocity: broadcast::Sender<Event>,
    confidence: broadcast::Sender<Event>,
    resync: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (position, _) = broadcast::channel(capacity);
        let (attitude, _) = broadcast::channel(capacity);
        let (heading, _) = broadcast::channel(capacity);
        let (velocity, _) = broadcast::channel(capacity);
        let (confidence, _) = broadcast::channel(capacity);
        let (resync, _) = broadcast::channel(capacity);
        Self {
            position,
            attitude,
            heading,
            velocity,
            confidence,
            resync,
        }
    }

    /// Publish `event` on the lane matching its payload.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when nobody is listening on the topic; consumers
    /// joining later simply miss it, as with any pub/sub broker.
    pub fn publish(&self, event: Event) -> Result<usize, NavError> {
        let topic = event.topic();
        match self.topic_sender(topic).send(event) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(_)) => {
                trace!(topic = %topic, "no subscribers");
                Ok(0)
            }
        }
    }

    /// Subscribe to a specific [`NavTopic`] channel.
    pub fn subscribe_to(&self, topic: NavTopic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: NavTopic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: NavTopic) -> &broadcast::Sender<Event> {
        match topic {
            NavTopic::Position => &self.position,
            NavTopic::Attitude => &self.attitude,
            NavTopic::Heading => &self.heading,
            NavTopic::Velocity => &self.velocity,
            NavTopic::Confidence => &self.confidence,
            NavTopic::Resync => &self.resync,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Transport for EventBus {
    fn send_message(&self, message: NavMessage) -> Result<usize, NavError> {
        self.publish(Event::new(BUS_SOURCE, message))
    }

    fn subscribe(&self, topic: NavTopic) -> TopicReceiver {
        self.subscribe_to(topic)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`NavTopic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`] or [`Transport::subscribe`].
pub struct TopicReceiver {
    topic: NavTopic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`NavTopic`] this receiver is bound to.
    pub fn topic(&self) -> NavTopic {
        self.topic
    }
}
