//! `navbridge-perception` – frame transform and drift correction.
//!
//! Turns camera-frame tracking samples into the vehicle's North-East-Down
//! navigation frame.
//!
//! # Modules
//!
//! - [`transform`] – vectors, rotation matrices, Euler angles and rigid
//!   transforms.
//! - [`frame`] – [`FrameTransformer`][frame::FrameTransformer]: camera axes to
//!   NED, then the current drift offset.
//! - [`drift`] – [`DriftCorrector`][drift::DriftCorrector] and its shared
//!   handle [`SharedDrift`][drift::SharedDrift]: the resync state machine.

pub mod drift;
pub mod frame;
pub mod transform;

pub use drift::{DriftCorrector, DriftOffset, ResyncOutcome, SharedDrift, SyncState};
pub use frame::{FrameTransformer, NavState, NedReading};
pub use transform::{EulerAngles, Rotation3, Transform3D, Vec3};
