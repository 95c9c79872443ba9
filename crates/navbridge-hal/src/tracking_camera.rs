//! Generic `TrackingCamera` trait for visual-inertial tracking hardware.

use navbridge_types::{NavError, RawSample};

/// A visual-inertial tracking camera.
///
/// Drivers wrap the vendor SDK and hand out the most recent pose estimate
/// without ever blocking the caller.
pub trait TrackingCamera: Send {
    /// Stable identifier for this camera, e.g. `"zed_mini"`.
    fn id(&self) -> &str;

    /// One-time initialisation, called before the first poll.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::SensorFault`] if the device cannot be opened.
    fn setup(&mut self) -> Result<(), NavError>;

    /// Return the latest sample, or `Ok(None)` when no new sample has been
    /// produced since the previous poll.
    ///
    /// Must return immediately.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::SensorFault`] if the driver reports a fault
    /// (e.g. the device was disconnected).
    fn latest_sample(&mut self) -> Result<Option<RawSample>, NavError>;
}

impl<C: TrackingCamera + ?Sized> TrackingCamera for Box<C> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn setup(&mut self) -> Result<(), NavError> {
        (**self).setup()
    }

    fn latest_sample(&mut self) -> Result<Option<RawSample>, NavError> {
        (**self).latest_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
        polls: u32,
    }

    impl TrackingCamera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn setup(&mut self) -> Result<(), NavError> {
            Ok(())
        }

        fn latest_sample(&mut self) -> Result<Option<RawSample>, NavError> {
            self.polls += 1;
            if self.polls % 2 == 0 {
                return Ok(None);
            }
            Ok(Some(RawSample {
                position: [0.0, 0.0, -1.0],
                velocity: [0.0; 3],
                orientation: [0.0; 3],
                tracking_confidence: 100.0,
            }))
        }
    }

    #[test]
    fn mock_camera_alternates_data_and_no_data() {
        let mut cam: Box<dyn TrackingCamera> = Box::new(MockCamera {
            id: "zed_mini".to_string(),
            polls: 0,
        });
        assert_eq!(cam.id(), "zed_mini");
        cam.setup().unwrap();
        let sample = cam.latest_sample().unwrap().unwrap();
        assert_eq!(sample.position[2], -1.0);
        assert!(cam.latest_sample().unwrap().is_none());
    }
}
