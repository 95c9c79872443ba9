//! The transport seam.
//!
//! The bridge never talks to a broker directly.  It sends typed
//! [`NavMessage`]s through a [`Transport`] and subscribes to inbound topics
//! through the same trait.  Delivery, retries and wire encoding belong to the
//! implementation.
//!
//! - [`EventBus`][crate::bus::EventBus] – the in-process implementation.

use navbridge_types::{NavError, NavMessage, NavTopic};

use crate::bus::TopicReceiver;

/// Every publish/subscribe backend must implement this trait.
///
/// # Contract
///
/// * `send_message` – hands `message` to the backend on the lane given by
///   [`NavMessage::topic`].  Returns the number of local receivers reached;
///   having none is not an error.
///
/// * `subscribe` – returns a receiver for every subsequent message published
///   on `topic`.
pub trait Transport: Send + Sync {
    /// Send one message on its topic.
    fn send_message(&self, message: NavMessage) -> Result<usize, NavError>;

    /// Register interest in an inbound topic.
    fn subscribe(&self, topic: NavTopic) -> TopicReceiver;
}
