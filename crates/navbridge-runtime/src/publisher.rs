//! [`NavPublisher`] – validated emission of one tick's navigation state.
//!
//! Emits five independent messages in a fixed order.  Three vectors are
//! checked for NaN, and each check gates only the messages after it:
//!
//! | Order | Check | Message |
//! |---|---|---|
//! | 1 | position has no NaN | `avr/vio/position/local` |
//! | 2 | attitude has no NaN | `avr/vio/attitude/euler/radians` |
//! | 3 | | `avr/vio/heading` |
//! | 4 | velocity has no NaN | `avr/vio/velocity` |
//! | 5 | | `avr/vio/confidence` |
//!
//! A failed check logs a warning and ends the publish for that tick.
//! Messages already sent stay sent.

use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;

use navbridge_middleware::Transport;
use navbridge_perception::NavState;
use navbridge_types::{
    AttitudeEulerRadians, Confidence, Heading, NavMessage, PositionLocal, Velocity,
};
use tracing::warn;

/// A vector group whose NaN check can stop a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorGroup {
    Position,
    Attitude,
    Velocity,
}

impl fmt::Display for VectorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VectorGroup::Position => "position",
            VectorGroup::Attitude => "attitude",
            VectorGroup::Velocity => "velocity",
        })
    }
}

/// What happened to one call to [`NavPublisher::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every group passed validation.
    Complete { sent: usize },
    /// `group` contained NaN; `sent` messages had already gone out.
    Aborted { group: VectorGroup, sent: usize },
}

impl PublishOutcome {
    /// Messages the transport accepted.
    pub fn sent(&self) -> usize {
        match *self {
            PublishOutcome::Complete { sent } | PublishOutcome::Aborted { sent, .. } => sent,
        }
    }
}

/// Convert a yaw angle in radians into a heading in `[0, 360)` degrees.
///
/// Negative yaw is shifted up by a full turn, then reduced modulo a full turn
/// while still in radians so the degree conversion cannot overflow.  A result
/// that rounds to exactly 360 maps to 0, and the sign of zero is dropped.
pub fn normalize_heading_degrees(yaw_rad: f64) -> f64 {
    let mut heading = yaw_rad;
    if heading < 0.0 {
        heading += TAU;
    }
    let degrees = heading.rem_euclid(TAU).to_degrees();
    if degrees >= 360.0 { 0.0 } else { degrees + 0.0 }
}

/// Sends validated [`NavState`]s through a [`Transport`].
#[derive(Clone)]
pub struct NavPublisher {
    transport: Arc<dyn Transport>,
}

impl NavPublisher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Validate and emit `state`.  Never fails; problems are logged.
    pub fn publish(&self, state: &NavState) -> PublishOutcome {
        let mut sent = 0;
        match self.emit(state, &mut sent) {
            Ok(()) => PublishOutcome::Complete { sent },
            Err(group) => {
                warn!(%group, sent, "camera reported NaN {group}; skipping remaining messages this tick");
                PublishOutcome::Aborted { group, sent }
            }
        }
    }

    fn emit(&self, state: &NavState, sent: &mut usize) -> Result<(), VectorGroup> {
        let position = state.position;
        if position.has_nan() {
            return Err(VectorGroup::Position);
        }
        self.send(
            NavMessage::Position(PositionLocal {
                n: position.x,
                e: position.y,
                d: position.z,
            }),
            sent,
        );

        let attitude = state.attitude;
        if attitude.has_nan() {
            return Err(VectorGroup::Attitude);
        }
        self.send(
            NavMessage::Attitude(AttitudeEulerRadians {
                roll: attitude.roll,
                pitch: attitude.pitch,
                yaw: attitude.yaw,
            }),
            sent,
        );
        self.send(
            NavMessage::Heading(Heading {
                hdg: normalize_heading_degrees(attitude.yaw),
            }),
            sent,
        );

        let velocity = state.velocity;
        if velocity.has_nan() {
            return Err(VectorGroup::Velocity);
        }
        self.send(
            NavMessage::Velocity(Velocity {
                vn: velocity.x,
                ve: velocity.y,
                vd: velocity.z,
            }),
            sent,
        );
        self.send(
            NavMessage::Confidence(Confidence {
                tracking: state.tracking_confidence,
            }),
            sent,
        );
        Ok(())
    }

    fn send(&self, message: NavMessage, sent: &mut usize) {
        let topic = message.topic();
        match self.transport.send_message(message) {
            Ok(_) => *sent += 1,
            Err(e) => warn!(%topic, error = %e, "transport rejected message"),
        }
    }
}
