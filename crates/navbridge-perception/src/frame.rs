//! Camera-frame to NED conversion.
//!
//! A tracking camera reports its pose relative to where it started, in its
//! own axis convention.  [`FrameTransformer`] does the conversion in two
//! steps:
//!
//! 1. **Axes** – a fixed proper rotation `A` re-expresses position and
//!    velocity in north/east/down axes, and conjugates the camera attitude:
//!    `R_ned = A · R_cam · Aᵀ`.  The result is a [`NedReading`]: the camera
//!    pose in navigation axes, still uncorrected for drift.
//! 2. **Offset** – the current [`DriftOffset`] maps that reading into the
//!    navigation frame proper, producing a [`NavState`].
//!
//! The loop keeps step 1's output around so a resync can be computed against
//! the latest reading.

use navbridge_types::{CameraAxes, RawSample};

use crate::drift::DriftOffset;
use crate::transform::{EulerAngles, Rotation3, Vec3};

/// `x right, y up, z back` → `N = -z, E = x, D = -y`.
const NED_FROM_Y_UP: Rotation3 =
    Rotation3::from_rows([[0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]]);

/// `x forward, y left, z up` → `N = x, E = -y, D = -z`.
const NED_FROM_Z_UP_X_FORWARD: Rotation3 =
    Rotation3::from_rows([[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]]);

/// Camera pose expressed in navigation axes, before drift correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NedReading {
    pub position: Vec3,
    pub velocity: Vec3,
    pub attitude: Rotation3,
}

impl NedReading {
    /// Heading of the uncorrected reading, `(-π, π]`.
    pub fn yaw(&self) -> f64 {
        self.attitude.yaw()
    }
}

/// Navigation state for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavState {
    /// NED position (metres).
    pub position: Vec3,
    /// NED velocity (m/s).
    pub velocity: Vec3,
    /// Roll, pitch, yaw (radians).
    pub attitude: EulerAngles,
    /// Passed through unchanged from the sensor.
    pub tracking_confidence: f64,
}

/// Converts [`RawSample`]s into [`NavState`]s.
///
/// Holds only the constant axis rotation; every call is a pure function of
/// its arguments.
#[derive(Debug, Clone, Copy)]
pub struct FrameTransformer {
    axes: CameraAxes,
    ned_from_camera: Rotation3,
}

impl FrameTransformer {
    pub fn new(axes: CameraAxes) -> Self {
        let ned_from_camera = match axes {
            CameraAxes::RightHandedYUp => NED_FROM_Y_UP,
            CameraAxes::RightHandedZUpXForward => NED_FROM_Z_UP_X_FORWARD,
        };
        Self {
            axes,
            ned_from_camera,
        }
    }

    pub fn axes(&self) -> CameraAxes {
        self.axes
    }

    /// Step 1: re-express `sample` in navigation axes.
    pub fn to_navigation_axes(&self, sample: &RawSample) -> NedReading {
        let [rx, ry, rz] = sample.orientation;
        let camera_attitude = Rotation3::from_euler(EulerAngles::new(rx, ry, rz));
        NedReading {
            position: self.ned_from_camera.rotate(Vec3::from(sample.position)),
            velocity: self.ned_from_camera.rotate(Vec3::from(sample.velocity)),
            attitude: self.ned_from_camera.conjugate(camera_attitude),
        }
    }

    /// Steps 1 and 2: full conversion of `sample` under `offset`.
    pub fn transform(&self, sample: &RawSample, offset: &DriftOffset) -> NavState {
        offset.apply(&self.to_navigation_axes(sample), sample.tracking_confidence)
    }
}

impl Default for FrameTransformer {
    fn default() -> Self {
        Self::new(CameraAxes::default())
    }
}
