//! Simulated tracking cameras for headless runs and tests.
//!
//! - [`SimTrackingCamera`] flies a deterministic level circle and reports it
//!   in the configured [`CameraAxes`], optionally rotated by a slowly growing
//!   yaw drift so that resync has something to correct.
//! - [`ScriptedCamera`] replays a fixed queue of poll results (samples,
//!   no-data polls and faults).
//!
//! # Example
//!
//! ```rust
//! use navbridge_hal::sim::{SimParams, SimTrackingCamera};
//! use navbridge_hal::TrackingCamera;
//! use navbridge_types::CameraAxes;
//!
//! let mut cam = SimTrackingCamera::new("sim", CameraAxes::RightHandedYUp, 10.0, SimParams::default());
//! cam.setup().expect("sim setup always succeeds");
//! let sample = cam.latest_sample().expect("no fault").expect("no warm-up configured");
//! assert!((sample.tracking_confidence - 100.0).abs() < 1e-9);
//! ```

use std::collections::VecDeque;

use navbridge_types::{CameraAxes, NavError, RawSample};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tracking_camera::TrackingCamera;

// ────────────────────────────────────────────────────────────────────────────
// Simulated trajectory
// ────────────────────────────────────────────────────────────────────────────

/// Trajectory and fault-free sensor behaviour of [`SimTrackingCamera`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Circle radius (metres).
    pub radius_m: f64,
    /// Turn rate around the circle (rad/s).  Zero hovers at the origin.
    pub angular_rate_rad_s: f64,
    /// Height above the start point (metres, positive up).
    pub altitude_m: f64,
    /// Confidence reported with every sample.
    pub confidence: f64,
    /// Number of initial polls that return no data.
    pub warmup_polls: u32,
    /// Yaw drift accumulated by the simulated tracker (rad/s).
    pub drift_rate_rad_s: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            radius_m: 2.0,
            angular_rate_rad_s: 0.2,
            altitude_m: 1.0,
            confidence: 100.0,
            warmup_polls: 0,
            drift_rate_rad_s: 0.0,
        }
    }
}

/// A simulated tracking camera.
///
/// Each successful poll advances simulated time by `1 / poll_rate_hz`, so the
/// output depends only on the number of polls, never on wall-clock time.
pub struct SimTrackingCamera {
    id: String,
    axes: CameraAxes,
    dt: f64,
    params: SimParams,
    ready: bool,
    polls: u64,
}

impl SimTrackingCamera {
    /// Create a simulated camera polled at `poll_rate_hz`.
    pub fn new(id: impl Into<String>, axes: CameraAxes, poll_rate_hz: f64, params: SimParams) -> Self {
        let dt = if poll_rate_hz > 0.0 { 1.0 / poll_rate_hz } else { 0.0 };
        Self {
            id: id.into(),
            axes,
            dt,
            params,
            ready: false,
            polls: 0,
        }
    }

    /// Ground-truth NED pose `(position, velocity, yaw)` at time `t`, before
    /// drift is applied.
    pub fn truth_at(&self, t: f64) -> ([f64; 3], [f64; 3], f64) {
        let SimParams { radius_m: r, angular_rate_rad_s: w, altitude_m, .. } = self.params;
        let yaw = w * t;
        let position = [r * yaw.sin(), r * (1.0 - yaw.cos()), -altitude_m];
        let velocity = [r * w * yaw.cos(), r * w * yaw.sin(), 0.0];
        (position, velocity, yaw)
    }

    fn sample_at(&self, t: f64) -> RawSample {
        let (position, velocity, yaw) = self.truth_at(t);
        let drift = self.params.drift_rate_rad_s * t;
        let position = rotate_about_down(position, drift);
        let velocity = rotate_about_down(velocity, drift);
        let yaw = yaw + drift;

        RawSample {
            position: ned_to_camera(self.axes, position),
            velocity: ned_to_camera(self.axes, velocity),
            orientation: yaw_to_camera(self.axes, yaw),
            tracking_confidence: self.params.confidence,
        }
    }
}

impl TrackingCamera for SimTrackingCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn setup(&mut self) -> Result<(), NavError> {
        debug!(camera = %self.id, axes = ?self.axes, "sim camera ready");
        self.ready = true;
        Ok(())
    }

    fn latest_sample(&mut self) -> Result<Option<RawSample>, NavError> {
        if !self.ready {
            return Err(NavError::SensorFault {
                sensor: self.id.clone(),
                details: "polled before setup".to_string(),
            });
        }
        let poll = self.polls;
        self.polls += 1;
        let warmup = u64::from(self.params.warmup_polls);
        if poll < warmup {
            return Ok(None);
        }
        let t = (poll - warmup) as f64 * self.dt;
        Ok(Some(self.sample_at(t)))
    }
}

fn rotate_about_down(v: [f64; 3], angle: f64) -> [f64; 3] {
    let (s, c) = angle.sin_cos();
    [c * v[0] - s * v[1], s * v[0] + c * v[1], v[2]]
}

/// Express a NED vector in the camera's axes.
fn ned_to_camera(axes: CameraAxes, [n, e, d]: [f64; 3]) -> [f64; 3] {
    match axes {
        CameraAxes::RightHandedYUp => [e, -d, -n],
        CameraAxes::RightHandedZUpXForward => [n, -e, -d],
    }
}

/// Camera rotation angles for a level attitude with the given NED yaw.
///
/// Both conventions have an "up" axis, and yaw about down is the negative
/// rotation about up.
fn yaw_to_camera(axes: CameraAxes, yaw: f64) -> [f64; 3] {
    match axes {
        CameraAxes::RightHandedYUp => [0.0, -yaw, 0.0],
        CameraAxes::RightHandedZUpXForward => [0.0, 0.0, -yaw],
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted camera
// ────────────────────────────────────────────────────────────────────────────

/// A camera that replays a queue of poll results, then reports no data.
#[derive(Default)]
pub struct ScriptedCamera {
    id: String,
    script: VecDeque<Result<Option<RawSample>, NavError>>,
    setup_error: Option<NavError>,
    setup_calls: u32,
}

impl ScriptedCamera {
    /// Create an empty script.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Queue a successful poll.
    pub fn then_sample(mut self, sample: RawSample) -> Self {
        self.script.push_back(Ok(Some(sample)));
        self
    }

    /// Queue a no-data poll.
    pub fn then_no_data(mut self) -> Self {
        self.script.push_back(Ok(None));
        self
    }

    /// Queue a faulting poll.
    pub fn then_fault(mut self, details: impl Into<String>) -> Self {
        self.script.push_back(Err(NavError::SensorFault {
            sensor: self.id.clone(),
            details: details.into(),
        }));
        self
    }

    /// Make [`TrackingCamera::setup`] fail with `details`.
    pub fn with_failing_setup(mut self, details: impl Into<String>) -> Self {
        self.setup_error = Some(NavError::SensorFault {
            sensor: self.id.clone(),
            details: details.into(),
        });
        self
    }

    /// How many times `setup` has been called.
    pub fn setup_calls(&self) -> u32 {
        self.setup_calls
    }

    /// Number of queued poll results not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl TrackingCamera for ScriptedCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn setup(&mut self) -> Result<(), NavError> {
        self.setup_calls += 1;
        match &self.setup_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn latest_sample(&mut self) -> Result<Option<RawSample>, NavError> {
        self.script.pop_front().unwrap_or(Ok(None))
    }
}
