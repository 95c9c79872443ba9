//! Newline-delimited JSON encoding for bus traffic.
//!
//! Outbound events become one flat JSON object per line:
//!
//! ```text
//! {"topic":"avr/vio/heading","timestamp":"2026-01-01T00:00:00Z","payload":{"hdg":354.27}}
//! ```
//!
//! Inbound resync requests are accepted either bare
//! (`{"n":0,"e":0,"d":0,"hdg":90}`) or in the same enveloped shape
//! (`{"topic":"avr/vio/resync","payload":{...}}`).
//!
//! The codec only handles serialisation; it does not care whether the lines
//! travel over stdio, a socket or a file.

use chrono::{DateTime, Utc};
use navbridge_types::{Event, NavError, NavMessage, ResyncPayload};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct WireLine<'a> {
    topic: &'static str,
    timestamp: &'a DateTime<Utc>,
    payload: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResyncLine {
    Enveloped(NavMessage),
    Bare(ResyncPayload),
}

/// Encode `event` as a single JSON line (without the trailing newline).
///
/// # Errors
///
/// Returns [`NavError::Serialization`] if the payload cannot be serialised.
pub fn encode_event(event: &Event) -> Result<String, NavError> {
    let mut tagged = serde_json::to_value(&event.payload)
        .map_err(|e| NavError::Serialization(format!("encode {}: {e}", event.topic())))?;
    let line = WireLine {
        topic: event.topic().name(),
        timestamp: &event.timestamp,
        payload: tagged["payload"].take(),
    };
    serde_json::to_string(&line)
        .map_err(|e| NavError::Serialization(format!("encode {}: {e}", event.topic())))
}

/// Decode one inbound line into a [`ResyncPayload`].
///
/// # Errors
///
/// Returns [`NavError::Serialization`] for malformed JSON and
/// [`NavError::InvalidResync`] for a well-formed envelope on another topic.
pub fn decode_resync(line: &str) -> Result<ResyncPayload, NavError> {
    let parsed: ResyncLine = serde_json::from_str(line.trim())
        .map_err(|e| NavError::Serialization(format!("resync line: {e}")))?;
    match parsed {
        ResyncLine::Bare(payload) => Ok(payload),
        ResyncLine::Enveloped(NavMessage::Resync(payload)) => Ok(payload),
        ResyncLine::Enveloped(other) => Err(NavError::InvalidResync(format!(
            "expected avr/vio/resync, got {}",
            other.topic()
        ))),
    }
}
