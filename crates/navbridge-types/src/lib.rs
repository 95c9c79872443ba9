use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Routing lanes shared by the bridge and its consumers.
///
/// Five outbound lanes carry the per-tick navigation messages, one inbound
/// lane carries drift-correction requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavTopic {
    /// Local NED position.
    Position,
    /// Euler attitude in radians.
    Attitude,
    /// Heading in degrees, `[0, 360)`.
    Heading,
    /// NED velocity.
    Velocity,
    /// Tracker confidence.
    Confidence,
    /// Inbound drift-correction reference.
    Resync,
}

impl NavTopic {
    /// Every outbound lane, in emission order.
    pub const OUTBOUND: [NavTopic; 5] = [
        NavTopic::Position,
        NavTopic::Attitude,
        NavTopic::Heading,
        NavTopic::Velocity,
        NavTopic::Confidence,
    ];

    /// Wire name of the topic, e.g. `"avr/vio/heading"`.
    pub fn name(self) -> &'static str {
        match self {
            NavTopic::Position => "avr/vio/position/local",
            NavTopic::Attitude => "avr/vio/attitude/euler/radians",
            NavTopic::Heading => "avr/vio/heading",
            NavTopic::Velocity => "avr/vio/velocity",
            NavTopic::Confidence => "avr/vio/confidence",
            NavTopic::Resync => "avr/vio/resync",
        }
    }
}

impl std::fmt::Display for NavTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis convention a tracking camera reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraAxes {
    /// x right, y up, z backward (image-style right-handed frame).
    #[default]
    RightHandedYUp,
    /// x forward, y left, z up (robotics-style right-handed frame).
    RightHandedZUpXForward,
}

impl std::str::FromStr for CameraAxes {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "right_handed_y_up" => Ok(CameraAxes::RightHandedYUp),
            "right_handed_z_up_x_forward" => Ok(CameraAxes::RightHandedZUpXForward),
            other => Err(NavError::Config(format!("unknown camera axes '{other}'"))),
        }
    }
}

/// One reading from the tracking camera, expressed in the camera's own axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Position in metres.
    pub position: [f64; 3],
    /// Velocity in metres per second.
    pub velocity: [f64; 3],
    /// Rotation angles (radians) about the camera's x, y and z axes,
    /// composed as `Rz · Ry · Rx`.
    pub orientation: [f64; 3],
    /// Tracker confidence on the sensor's own scale.
    pub tracking_confidence: f64,
}

/// Local NED position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionLocal {
    pub n: f64,
    pub e: f64,
    pub d: f64,
}

/// Euler attitude in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttitudeEulerRadians {
    #[serde(rename = "psi")]
    pub roll: f64,
    #[serde(rename = "theta")]
    pub pitch: f64,
    #[serde(rename = "phi")]
    pub yaw: f64,
}

/// Heading in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub hdg: f64,
}

/// NED velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    #[serde(rename = "Vn")]
    pub vn: f64,
    #[serde(rename = "Ve")]
    pub ve: f64,
    #[serde(rename = "Vd")]
    pub vd: f64,
}

/// Tracker confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub tracking: f64,
}

/// Known-good reference pose used to recompute the drift offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResyncPayload {
    /// North, metres.
    pub n: f64,
    /// East, metres.
    pub e: f64,
    /// Down, metres.
    pub d: f64,
    /// Heading, degrees.
    pub hdg: f64,
}

impl ResyncPayload {
    /// `true` when every field is a finite number.
    pub fn is_finite(&self) -> bool {
        [self.n, self.e, self.d, self.hdg].iter().all(|v| v.is_finite())
    }
}

/// Statically typed message carried on a [`NavTopic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum NavMessage {
    #[serde(rename = "avr/vio/position/local")]
    Position(PositionLocal),
    #[serde(rename = "avr/vio/attitude/euler/radians")]
    Attitude(AttitudeEulerRadians),
    #[serde(rename = "avr/vio/heading")]
    Heading(Heading),
    #[serde(rename = "avr/vio/velocity")]
    Velocity(Velocity),
    #[serde(rename = "avr/vio/confidence")]
    Confidence(Confidence),
    #[serde(rename = "avr/vio/resync")]
    Resync(ResyncPayload),
}

impl NavMessage {
    /// The lane this message travels on.
    pub fn topic(&self) -> NavTopic {
        match self {
            NavMessage::Position(_) => NavTopic::Position,
            NavMessage::Attitude(_) => NavTopic::Attitude,
            NavMessage::Heading(_) => NavTopic::Heading,
            NavMessage::Velocity(_) => NavTopic::Velocity,
            NavMessage::Confidence(_) => NavTopic::Confidence,
            NavMessage::Resync(_) => NavTopic::Resync,
        }
    }
}

/// Envelope for every message routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "navbridge-runtime::publisher"
    pub source: String,
    pub payload: NavMessage,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current time.
    pub fn new(source: impl Into<String>, payload: NavMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }

    pub fn topic(&self) -> NavTopic {
        self.payload.topic()
    }
}

/// Error type shared by every navbridge crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavError {
    #[error("Sensor Fault on {sensor}: {details}")]
    SensorFault { sensor: String, details: String },

    #[error("Invalid Resync Payload: {0}")]
    InvalidResync(String),

    #[error("No camera reading available to resync against")]
    NoReading,

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
