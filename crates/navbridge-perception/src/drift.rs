//! Drift correction.
//!
//! Visual-inertial trackers slowly lose heading and position.  A resync
//! request carries a known-good reference pose (`n`, `e`, `d`, `hdg`); the
//! [`DriftCorrector`] turns it into a [`DriftOffset`] that maps the latest
//! camera reading exactly onto that reference:
//!
//! ```text
//! offset = T_reference · T_reading⁻¹
//! ```
//!
//! where both transforms are yaw-about-down plus translation.  Roll and pitch
//! are gravity-referenced by the sensor and are left alone.
//!
//! # Sync policy
//!
//! The first resync always recomputes the offset.  Later resyncs recompute
//! only when continuous sync is enabled; otherwise they are ignored.  A
//! resync that cannot be computed (non-finite payload, no reading yet) leaves
//! the offset and the policy state untouched.
//!
//! # Sharing
//!
//! [`SharedDrift`] is the handle the sampling loop and the resync handler
//! both hold.  Every access goes through one short critical section; the
//! offset is computed in full before it is stored, so a reader never sees a
//! half-written value.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use navbridge_types::{NavError, ResyncPayload};
use tracing::{debug, info};

use crate::frame::{NavState, NedReading};
use crate::transform::{Rotation3, Transform3D, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// DriftOffset
// ────────────────────────────────────────────────────────────────────────────

/// Correction mapping navigation-axes readings into the navigation frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriftOffset {
    transform: Transform3D,
}

impl DriftOffset {
    /// No correction.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Yaw-about-down correction plus translation.
    pub fn new(yaw: f64, translation: Vec3) -> Self {
        Self {
            transform: Transform3D::new(Rotation3::about_z(yaw), translation),
        }
    }

    /// Offset that maps `reading` exactly onto `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::InvalidResync`] if the payload or the reading is
    /// not finite.
    pub fn from_reference(reading: &NedReading, reference: &ResyncPayload) -> Result<Self, NavError> {
        if !reference.is_finite() {
            return Err(NavError::InvalidResync(format!(
                "non-finite reference pose {reference:?}"
            )));
        }
        let reading_yaw = reading.yaw();
        if !reading.position.is_finite() || !reading_yaw.is_finite() {
            return Err(NavError::InvalidResync(
                "latest camera reading is not finite".to_string(),
            ));
        }

        let reference_pose = Transform3D::new(
            Rotation3::about_z(reference.hdg.to_radians()),
            Vec3::new(reference.n, reference.e, reference.d),
        );
        let reading_pose = Transform3D::new(Rotation3::about_z(reading_yaw), reading.position);

        Ok(Self {
            transform: reference_pose.compose(reading_pose.inverse()),
        })
    }

    /// Apply the correction to one reading.
    pub fn apply(&self, reading: &NedReading, tracking_confidence: f64) -> NavState {
        NavState {
            position: self.transform.apply_point(reading.position),
            velocity: self.transform.apply_vector(reading.velocity),
            attitude: self.transform.rotation.mul(reading.attitude).to_euler(),
            tracking_confidence,
        }
    }

    /// Heading correction, `(-π, π]`.
    pub fn yaw(&self) -> f64 {
        self.transform.rotation.yaw()
    }

    pub fn translation(&self) -> Vec3 {
        self.transform.translation
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SyncState
// ────────────────────────────────────────────────────────────────────────────

/// Resync policy state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    has_synced_once: bool,
    continuous_sync: bool,
}

impl SyncState {
    pub fn new(continuous_sync: bool) -> Self {
        Self {
            has_synced_once: false,
            continuous_sync,
        }
    }

    /// Whether a resync arriving now should recompute the offset.
    pub fn should_recompute(&self) -> bool {
        !self.has_synced_once || self.continuous_sync
    }

    pub fn has_synced_once(&self) -> bool {
        self.has_synced_once
    }

    pub fn continuous_sync(&self) -> bool {
        self.continuous_sync
    }
}

/// Result of a resync request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResyncOutcome {
    /// A new offset was computed and stored.
    Recomputed(DriftOffset),
    /// Already synced and continuous sync is off.
    Ignored,
}

// ────────────────────────────────────────────────────────────────────────────
// DriftCorrector
// ────────────────────────────────────────────────────────────────────────────

/// Owns the drift offset and the sync policy.
#[derive(Debug)]
pub struct DriftCorrector {
    offset: DriftOffset,
    sync: SyncState,
    last_reading: Option<NedReading>,
    recomputations: u64,
}

impl DriftCorrector {
    /// Start unsynced with the identity offset.
    pub fn new(continuous_sync: bool) -> Self {
        Self {
            offset: DriftOffset::identity(),
            sync: SyncState::new(continuous_sync),
            last_reading: None,
            recomputations: 0,
        }
    }

    pub fn offset(&self) -> DriftOffset {
        self.offset
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync
    }

    /// Number of successful recomputations so far.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Remember `reading` as the one the next resync is computed against.
    pub fn observe(&mut self, reading: NedReading) {
        self.last_reading = Some(reading);
    }

    /// Handle one resync request.
    ///
    /// # Errors
    ///
    /// * [`NavError::NoReading`] – no reading has been observed yet.
    /// * [`NavError::InvalidResync`] – the payload or reading is not finite.
    ///
    /// In both cases the offset and sync state are unchanged.
    pub fn handle_resync(&mut self, payload: &ResyncPayload) -> Result<ResyncOutcome, NavError> {
        if !self.sync.should_recompute() {
            debug!("resync ignored: already synced and continuous sync is off");
            return Ok(ResyncOutcome::Ignored);
        }
        let reading = self.last_reading.as_ref().ok_or(NavError::NoReading)?;
        let offset = DriftOffset::from_reference(reading, payload)?;

        self.offset = offset;
        self.sync.has_synced_once = true;
        self.recomputations += 1;
        info!(
            yaw_correction_deg = offset.yaw().to_degrees(),
            n = offset.translation().x,
            e = offset.translation().y,
            d = offset.translation().z,
            count = self.recomputations,
            "drift offset recomputed"
        );
        Ok(ResyncOutcome::Recomputed(offset))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SharedDrift
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable handle to a [`DriftCorrector`] shared between tasks.
#[derive(Debug, Clone)]
pub struct SharedDrift {
    inner: Arc<Mutex<DriftCorrector>>,
}

impl SharedDrift {
    pub fn new(continuous_sync: bool) -> Self {
        Self::from_corrector(DriftCorrector::new(continuous_sync))
    }

    pub fn from_corrector(corrector: DriftCorrector) -> Self {
        Self {
            inner: Arc::new(Mutex::new(corrector)),
        }
    }

    /// Record `reading` and return the offset to apply to it, in one
    /// critical section.
    pub fn observe(&self, reading: NedReading) -> DriftOffset {
        let mut corrector = self.lock();
        corrector.observe(reading);
        corrector.offset()
    }

    /// See [`DriftCorrector::handle_resync`].
    pub fn handle_resync(&self, payload: &ResyncPayload) -> Result<ResyncOutcome, NavError> {
        self.lock().handle_resync(payload)
    }

    pub fn offset(&self) -> DriftOffset {
        self.lock().offset()
    }

    pub fn sync_state(&self) -> SyncState {
        self.lock().sync_state()
    }

    pub fn recomputations(&self) -> u64 {
        self.lock().recomputations()
    }

    // Every mutation is a whole-value store after the fallible work is done,
    // so the state behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, DriftCorrector> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::EulerAngles;
    use std::f64::consts::FRAC_PI_2;

    fn reading(n: f64, e: f64, d: f64, yaw: f64) -> NedReading {
        NedReading {
            position: Vec3::new(n, e, d),
            velocity: Vec3::new(1.0, 0.0, 0.0),
            attitude: Rotation3::about_z(yaw),
        }
    }

    fn payload(n: f64, e: f64, d: f64, hdg: f64) -> ResyncPayload {
        ResyncPayload { n, e, d, hdg }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn recomputed_offset_maps_reading_onto_reference() {
        let r = reading(3.0, -1.0, -0.5, 0.4);
        let offset = DriftOffset::from_reference(&r, &payload(10.0, 20.0, -2.0, 90.0)).unwrap();
        let state = offset.apply(&r, 1.0);
        assert!(close(state.position.x, 10.0));
        assert!(close(state.position.y, 20.0));
        assert!(close(state.position.z, -2.0));
        assert!(close(state.attitude.yaw, FRAC_PI_2));
        assert!(close(offset.yaw(), FRAC_PI_2 - 0.4));
    }

    #[test]
    fn offset_rotates_velocity_but_does_not_translate_it() {
        let r = reading(0.0, 0.0, 0.0, 0.0);
        let offset = DriftOffset::from_reference(&r, &payload(5.0, 5.0, 0.0, 90.0)).unwrap();
        let state = offset.apply(&r, 1.0);
        // North-bound velocity becomes east-bound after a 90° correction.
        assert!(close(state.velocity.x, 0.0));
        assert!(close(state.velocity.y, 1.0));
    }

    #[test]
    fn offset_preserves_roll_and_pitch() {
        let mut r = reading(0.0, 0.0, 0.0, 0.0);
        r.attitude = Rotation3::from_euler(EulerAngles::new(0.1, -0.2, 0.3));
        let offset = DriftOffset::from_reference(&r, &payload(0.0, 0.0, 0.0, 180.0)).unwrap();
        let attitude = offset.apply(&r, 1.0).attitude;
        assert!(close(attitude.roll, 0.1));
        assert!(close(attitude.pitch, -0.2));
        assert!(close(attitude.yaw.abs(), std::f64::consts::PI));
    }

    #[test]
    fn from_reference_is_deterministic() {
        let r = reading(1.0, 2.0, 3.0, -0.7);
        let p = payload(4.0, 5.0, 6.0, 300.0);
        assert_eq!(
            DriftOffset::from_reference(&r, &p).unwrap(),
            DriftOffset::from_reference(&r, &p).unwrap()
        );
    }

    #[test]
    fn sync_once_policy_ignores_second_resync() {
        let mut corrector = DriftCorrector::new(false);
        corrector.observe(reading(0.0, 0.0, 0.0, 0.0));

        let first = corrector.handle_resync(&payload(1.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(matches!(first, ResyncOutcome::Recomputed(_)));
        let after_first = corrector.offset();

        let second = corrector.handle_resync(&payload(9.0, 9.0, 9.0, 45.0)).unwrap();
        assert_eq!(second, ResyncOutcome::Ignored);
        assert_eq!(corrector.offset(), after_first);
        assert_eq!(corrector.recomputations(), 1);
        assert!(corrector.sync_state().has_synced_once());
    }

    #[test]
    fn continuous_sync_recomputes_every_time() {
        let mut corrector = DriftCorrector::new(true);
        corrector.observe(reading(0.0, 0.0, 0.0, 0.0));

        assert!(matches!(
            corrector.handle_resync(&payload(1.0, 0.0, 0.0, 0.0)),
            Ok(ResyncOutcome::Recomputed(_))
        ));
        assert!(matches!(
            corrector.handle_resync(&payload(2.0, 0.0, 0.0, 0.0)),
            Ok(ResyncOutcome::Recomputed(_))
        ));
        assert_eq!(corrector.recomputations(), 2);
        assert!(close(corrector.offset().translation().x, 2.0));
    }

    #[test]
    fn resync_before_any_reading_keeps_unsynced() {
        let mut corrector = DriftCorrector::new(false);
        let result = corrector.handle_resync(&payload(1.0, 0.0, 0.0, 0.0));
        assert_eq!(result, Err(NavError::NoReading));
        assert!(!corrector.sync_state().has_synced_once());
        assert_eq!(corrector.offset(), DriftOffset::identity());
    }

    #[test]
    fn malformed_payload_leaves_prior_offset_intact() {
        let mut corrector = DriftCorrector::new(true);
        corrector.observe(reading(0.0, 0.0, 0.0, 0.0));
        corrector.handle_resync(&payload(1.0, 2.0, 3.0, 10.0)).unwrap();
        let before = corrector.offset();

        let result = corrector.handle_resync(&payload(f64::NAN, 0.0, 0.0, 0.0));
        assert!(matches!(result, Err(NavError::InvalidResync(_))));
        assert_eq!(corrector.offset(), before);
        assert_eq!(corrector.recomputations(), 1);
    }

    #[test]
    fn nan_reading_cannot_be_synced_against() {
        let mut corrector = DriftCorrector::new(false);
        corrector.observe(reading(f64::NAN, 0.0, 0.0, 0.0));
        let result = corrector.handle_resync(&payload(0.0, 0.0, 0.0, 0.0));
        assert!(matches!(result, Err(NavError::InvalidResync(_))));
        assert!(!corrector.sync_state().has_synced_once());
    }

    #[test]
    fn resync_uses_latest_observed_reading() {
        let mut corrector = DriftCorrector::new(false);
        corrector.observe(reading(100.0, 0.0, 0.0, 0.0));
        corrector.observe(reading(1.0, 0.0, 0.0, 0.0));
        corrector.handle_resync(&payload(0.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(close(corrector.offset().translation().x, -1.0));
    }

    #[test]
    fn shared_handle_sees_updates_from_other_clones() {
        let loop_side = SharedDrift::new(false);
        let resync_side = loop_side.clone();

        assert_eq!(loop_side.observe(reading(2.0, 0.0, 0.0, 0.0)), DriftOffset::identity());
        resync_side.handle_resync(&payload(0.0, 0.0, 0.0, 0.0)).unwrap();

        let offset = loop_side.observe(reading(2.0, 0.0, 0.0, 0.0));
        assert!(close(offset.translation().x, -2.0));
        assert_eq!(loop_side.recomputations(), 1);
        assert!(loop_side.sync_state().has_synced_once());
        assert!(!loop_side.sync_state().continuous_sync());
    }

    #[test]
    fn shared_handle_across_threads() {
        let shared = SharedDrift::new(true);
        shared.observe(reading(0.0, 0.0, 0.0, 0.0));
        let writer = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    shared.handle_resync(&payload(i as f64, 0.0, 0.0, 0.0)).unwrap();
                }
            })
        };
        for _ in 0..100 {
            let offset = shared.observe(reading(0.0, 0.0, 0.0, 0.0));
            // Every offset observed is one the writer produced in full.
            assert!(close(offset.yaw(), 0.0));
            assert_eq!(offset.translation().y, 0.0);
        }
        writer.join().unwrap();
        assert_eq!(shared.recomputations(), 100);
        assert!(close(shared.offset().translation().x, 99.0));
    }
}
