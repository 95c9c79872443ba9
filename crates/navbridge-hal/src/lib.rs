//! `navbridge-hal` – tracking camera drivers.
//!
//! - [`tracking_camera`] – the [`TrackingCamera`] trait every driver
//!   implements.
//! - [`sim`] – [`SimTrackingCamera`][sim::SimTrackingCamera] and
//!   [`ScriptedCamera`][sim::ScriptedCamera] for running without hardware.

pub mod sim;
pub mod tracking_camera;

pub use sim::{ScriptedCamera, SimParams, SimTrackingCamera};
pub use tracking_camera::TrackingCamera;
