//! `navbridge-middleware` – message plumbing.
//!
//! Routes typed navigation messages between the bridge and its consumers
//! without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`transport`] – The [`Transport`] trait the runtime publishes through.
//! - [`json_codec`] – Newline-delimited JSON encoding of outbound events and
//!   decoding of inbound resync requests.

pub mod bus;
pub mod json_codec;
pub mod transport;

pub use bus::{EventBus, TopicReceiver};
pub use transport::Transport;
