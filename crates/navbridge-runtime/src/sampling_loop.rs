//! [`SamplingLoop`] – the fixed-rate camera polling cycle.
//!
//! Each tick:
//!
//! 1. **Poll** – ask the [`TrackingCamera`] for its latest sample.  No data
//!    ends the tick quietly (the [`SampleWatchdog`] decides how loudly).
//! 2. **Transform** – re-express the sample in NED axes and record it with
//!    the shared [`SharedDrift`], which hands back the current offset.
//! 3. **Publish** – apply the offset and hand the result to the
//!    [`NavPublisher`].
//!
//! A tick that fails is logged and counted; the next tick runs as normal.
//! Ticks never overlap, and a tick that overruns the period delays the
//! schedule rather than triggering a burst of catch-up ticks.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use navbridge_hal::{SimParams, SimTrackingCamera};
//! use navbridge_middleware::EventBus;
//! use navbridge_runtime::sampling_loop::{SamplingLoop, SamplingLoopConfig};
//!
//! # async fn demo() -> Result<(), navbridge_types::NavError> {
//! let config = SamplingLoopConfig::default();
//! let camera = SimTrackingCamera::new("sim", config.camera_axes, config.frequency_hz, SimParams::default());
//! let sampling = SamplingLoop::new(&config, camera, Arc::new(EventBus::default()))?;
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! let stats = sampling.run(shutdown).await?;
//! # let _ = stats;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use navbridge_hal::TrackingCamera;
use navbridge_middleware::Transport;
use navbridge_perception::{FrameTransformer, SharedDrift};
use navbridge_types::{CameraAxes, NavError};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace, warn};

use crate::publisher::{NavPublisher, PublishOutcome};
use crate::watchdog::SampleWatchdog;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`SamplingLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingLoopConfig {
    /// Poll rate (Hz).  Must be finite and positive.
    pub frequency_hz: f64,
    /// Recompute the drift offset on every resync, not just the first.
    pub continuous_sync: bool,
    /// Axis convention of the tracking camera.
    pub camera_axes: CameraAxes,
    /// Silence after which missing camera data is logged as a warning.
    pub stale_sample_timeout: Duration,
}

impl Default for SamplingLoopConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 10.0,
            continuous_sync: true,
            camera_axes: CameraAxes::default(),
            stale_sample_timeout: Duration::from_secs(1),
        }
    }
}

impl SamplingLoopConfig {
    /// Tick period derived from [`frequency_hz`][Self::frequency_hz].
    ///
    /// # Errors
    ///
    /// [`NavError::Config`] when the frequency is not a finite positive
    /// number.
    pub fn period(&self) -> Result<Duration, NavError> {
        let hz = self.frequency_hz;
        if !hz.is_finite() || hz <= 0.0 {
            return Err(NavError::Config(format!(
                "update frequency must be a positive number of Hz, got {hz}"
            )));
        }
        Duration::try_from_secs_f64(1.0 / hz)
            .ok()
            .filter(|period| !period.is_zero())
            .ok_or_else(|| NavError::Config(format!("update frequency {hz} Hz is out of range")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one [`SamplingLoop::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The camera had nothing new.
    NoData,
    /// A sample was transformed and handed to the publisher.
    Published(PublishOutcome),
    /// The tick failed; the error was logged.
    Faulted,
}

/// Running tick counters, returned when the loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
    pub ticks: u64,
    pub no_data: u64,
    /// Ticks whose publish passed every NaN check.
    pub complete: u64,
    /// Ticks whose publish stopped at a NaN group.
    pub aborted: u64,
    pub faulted: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// SamplingLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Polls a camera at a fixed rate and publishes corrected navigation state.
pub struct SamplingLoop<C: TrackingCamera> {
    camera: C,
    transformer: FrameTransformer,
    drift: SharedDrift,
    publisher: NavPublisher,
    period: Duration,
    watchdog: SampleWatchdog,
    stats: LoopStats,
}

impl<C: TrackingCamera> SamplingLoop<C> {
    /// Build a loop around `camera`, publishing through `transport`.
    ///
    /// The camera is not touched until [`run`][Self::run].
    pub fn new(
        config: &SamplingLoopConfig,
        camera: C,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NavError> {
        let period = config.period()?;
        Ok(Self {
            camera,
            transformer: FrameTransformer::new(config.camera_axes),
            drift: SharedDrift::new(config.continuous_sync),
            publisher: NavPublisher::new(transport),
            period,
            watchdog: SampleWatchdog::new(config.stale_sample_timeout),
            stats: LoopStats::default(),
        })
    }

    /// Handle to the drift state, for the resync side.
    pub fn drift(&self) -> SharedDrift {
        self.drift.clone()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// One poll–transform–publish pass.  `Ok(None)` means no data.
    pub fn tick(&mut self) -> Result<Option<PublishOutcome>, NavError> {
        let Some(sample) = self.camera.latest_sample()? else {
            self.watchdog.record_empty();
            return Ok(None);
        };
        self.watchdog.record_sample();

        let reading = self.transformer.to_navigation_axes(&sample);
        let offset = self.drift.observe(reading);
        let state = offset.apply(&reading, sample.tracking_confidence);
        Ok(Some(self.publisher.publish(&state)))
    }

    /// Run one [`tick`][Self::tick], log any failure, and update the stats.
    pub fn step(&mut self) -> TickOutcome {
        self.stats.ticks += 1;
        match self.tick() {
            Ok(None) => {
                self.stats.no_data += 1;
                TickOutcome::NoData
            }
            Ok(Some(outcome)) => {
                match outcome {
                    PublishOutcome::Complete { .. } => self.stats.complete += 1,
                    PublishOutcome::Aborted { .. } => self.stats.aborted += 1,
                }
                trace!(sent = outcome.sent(), "tick published");
                TickOutcome::Published(outcome)
            }
            Err(e) => {
                self.stats.faulted += 1;
                warn!(camera = self.camera.id(), error = %e, "tick failed; continuing with next tick");
                TickOutcome::Faulted
            }
        }
    }

    /// Set the camera up, then tick until `shutdown` changes.
    ///
    /// # Errors
    ///
    /// Only a failed [`TrackingCamera::setup`] is returned; per-tick errors
    /// are absorbed by [`step`][Self::step].
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<LoopStats, NavError> {
        info!(camera = self.camera.id(), "setting up tracking camera");
        self.camera.setup()?;

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.watchdog.arm();
        info!(
            camera = self.camera.id(),
            period_ms = self.period.as_secs_f64() * 1000.0,
            axes = ?self.transformer.axes(),
            "sampling loop started"
        );

        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        self.step();
                    }
                }
            }
        }

        let stats = self.stats;
        info!(
            ticks = stats.ticks,
            no_data = stats.no_data,
            complete = stats.complete,
            aborted = stats.aborted,
            faulted = stats.faulted,
            "sampling loop stopped"
        );
        Ok(stats)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    use navbridge_hal::{ScriptedCamera, SimParams, SimTrackingCamera};
    use navbridge_middleware::{EventBus, TopicReceiver};
    use navbridge_types::{Heading, NavMessage, NavTopic, PositionLocal, RawSample, ResyncPayload};

    use crate::publisher::VectorGroup;

    fn sample(position: [f64; 3], orientation: [f64; 3]) -> RawSample {
        RawSample {
            position,
            velocity: [0.0; 3],
            orientation,
            tracking_confidence: 90.0,
        }
    }

    fn build<C: TrackingCamera>(camera: C) -> (SamplingLoop<C>, EventBus) {
        let bus = EventBus::default();
        let sampling = SamplingLoop::new(&SamplingLoopConfig::default(), camera, Arc::new(bus.clone()))
            .expect("default config is valid");
        (sampling, bus)
    }

    fn drain(rx: &mut TopicReceiver) -> Vec<NavMessage> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event.payload);
        }
        out
    }

    fn drain_all(receivers: &mut [TopicReceiver]) -> usize {
        receivers.iter_mut().map(|rx| drain(rx).len()).sum()
    }

    fn subscribe_all(bus: &EventBus) -> Vec<TopicReceiver> {
        NavTopic::OUTBOUND.iter().map(|t| bus.subscribe_to(*t)).collect()
    }

    #[test]
    fn rejects_bad_frequencies() {
        for hz in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let config = SamplingLoopConfig { frequency_hz: hz, ..SamplingLoopConfig::default() };
            let result = SamplingLoop::new(&config, ScriptedCamera::new("cam"), Arc::new(EventBus::default()));
            assert!(matches!(result, Err(NavError::Config(_))), "{hz} Hz should be rejected");
        }
    }

    #[test]
    fn period_follows_frequency() {
        let config = SamplingLoopConfig { frequency_hz: 50.0, ..SamplingLoopConfig::default() };
        assert_eq!(config.period().unwrap(), Duration::from_millis(20));
    }

    #[test]
    fn no_data_publishes_nothing() {
        let (mut sampling, bus) = build(ScriptedCamera::new("cam").then_no_data());
        let mut receivers = subscribe_all(&bus);

        assert_eq!(sampling.step(), TickOutcome::NoData);
        assert_eq!(drain_all(&mut receivers), 0);
        assert_eq!(sampling.stats().no_data, 1);
    }

    #[test]
    fn sample_publishes_all_five_messages() {
        let (mut sampling, bus) = build(ScriptedCamera::new("cam").then_sample(sample([0.0; 3], [0.0; 3])));
        let mut receivers = subscribe_all(&bus);

        assert_eq!(
            sampling.step(),
            TickOutcome::Published(PublishOutcome::Complete { sent: 5 })
        );
        assert_eq!(drain_all(&mut receivers), 5);
    }

    #[test]
    fn a_faulted_tick_does_not_affect_the_next() {
        let camera = ScriptedCamera::new("cam")
            .then_fault("usb hiccup")
            .then_sample(sample([1.0, 0.0, 0.0], [0.0; 3]));
        let (mut sampling, bus) = build(camera);
        let mut receivers = subscribe_all(&bus);

        assert_eq!(sampling.step(), TickOutcome::Faulted);
        assert_eq!(drain_all(&mut receivers), 0);
        assert_eq!(
            sampling.step(),
            TickOutcome::Published(PublishOutcome::Complete { sent: 5 })
        );
        assert_eq!(drain_all(&mut receivers), 5);

        let stats = sampling.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.faulted, 1);
        assert_eq!(stats.complete, 1);
    }

    #[test]
    fn nan_attitude_publishes_position_only() {
        let camera = ScriptedCamera::new("cam").then_sample(sample([0.0; 3], [f64::NAN, 0.0, 0.0]));
        let (mut sampling, bus) = build(camera);
        let mut position = bus.subscribe_to(NavTopic::Position);
        let mut heading = bus.subscribe_to(NavTopic::Heading);

        assert_eq!(
            sampling.step(),
            TickOutcome::Published(PublishOutcome::Aborted { group: VectorGroup::Attitude, sent: 1 })
        );
        assert_eq!(drain(&mut position).len(), 1);
        assert!(drain(&mut heading).is_empty());
        assert_eq!(sampling.stats().aborted, 1);
    }

    #[test]
    fn identical_samples_give_identical_output_without_resync() {
        let s = sample([0.4, -0.2, 1.5], [0.1, -0.3, 0.05]);
        let camera = ScriptedCamera::new("cam")
            .then_sample(s)
            .then_sample(sample([9.0, 9.0, 9.0], [0.0; 3]))
            .then_sample(s);
        let (mut sampling, bus) = build(camera);
        let mut position = bus.subscribe_to(NavTopic::Position);

        sampling.step();
        sampling.step();
        sampling.step();
        let positions = drain(&mut position);
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0], positions[2]);
    }

    #[test]
    fn resync_applies_from_the_next_tick() {
        // 1 m right of the start point, facing the start heading.
        let s = sample([1.0, 0.0, 0.0], [0.0; 3]);
        let camera = ScriptedCamera::new("cam").then_sample(s).then_sample(s);
        let (mut sampling, bus) = build(camera);
        let mut position = bus.subscribe_to(NavTopic::Position);
        let mut heading = bus.subscribe_to(NavTopic::Heading);

        sampling.step();
        assert_eq!(
            drain(&mut position),
            vec![NavMessage::Position(PositionLocal { n: 0.0, e: 1.0, d: 0.0 })]
        );

        let reference = ResyncPayload { n: 10.0, e: 20.0, d: -5.0, hdg: 90.0 };
        sampling.drift().handle_resync(&reference).unwrap();

        sampling.step();
        match drain(&mut position).as_slice() {
            [NavMessage::Position(p)] => {
                assert!((p.n - 10.0).abs() < 1e-9);
                assert!((p.e - 20.0).abs() < 1e-9);
                assert!((p.d + 5.0).abs() < 1e-9);
            }
            other => panic!("expected one position, got {other:?}"),
        }
        let headings = drain(&mut heading);
        match headings.last() {
            Some(NavMessage::Heading(Heading { hdg })) => assert!((hdg - 90.0).abs() < 1e-9),
            other => panic!("expected a heading, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn setup_failure_is_returned() {
        let camera = ScriptedCamera::new("cam").with_failing_setup("device not found");
        let (sampling, _bus) = build(camera);
        let (_tx, rx) = watch::channel(false);
        let result = sampling.run(rx).await;
        assert!(matches!(result, Err(NavError::SensorFault { .. })));
    }

    #[tokio::test]
    async fn already_signalled_shutdown_runs_no_ticks() {
        let (sampling, _bus) = build(ScriptedCamera::new("cam"));
        let (_tx, rx) = watch::channel(true);
        let stats = sampling.run(rx).await.unwrap();
        assert_eq!(stats.ticks, 0);
    }

    #[tokio::test]
    async fn run_ticks_until_shutdown() {
        let config = SamplingLoopConfig { frequency_hz: 200.0, ..SamplingLoopConfig::default() };
        let camera = SimTrackingCamera::new("sim", config.camera_axes, config.frequency_hz, SimParams::default());
        let bus = EventBus::default();
        let mut position = bus.subscribe_to(NavTopic::Position);
        let sampling = SamplingLoop::new(&config, camera, Arc::new(bus.clone())).unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sampling.run(rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let stats = handle.await.unwrap().unwrap();
        assert!(stats.ticks > 0);
        assert_eq!(stats.complete, stats.ticks);
        assert!(!drain(&mut position).is_empty());
    }

    /// Records when each poll starts; one poll overruns the period.
    struct SlowPollCamera {
        polls: Arc<Mutex<Vec<Instant>>>,
        slow_poll: usize,
        slow_for: Duration,
    }

    impl TrackingCamera for SlowPollCamera {
        fn id(&self) -> &str {
            "slow"
        }

        fn setup(&mut self) -> Result<(), NavError> {
            Ok(())
        }

        fn latest_sample(&mut self) -> Result<Option<RawSample>, NavError> {
            let index = {
                let mut polls = self.polls.lock().unwrap();
                polls.push(Instant::now());
                polls.len() - 1
            };
            if index == self.slow_poll {
                std::thread::sleep(self.slow_for);
            }
            Ok(None)
        }
    }

    #[tokio::test]
    async fn overrun_delays_instead_of_bursting() {
        let polls = Arc::new(Mutex::new(Vec::new()));
        let camera = SlowPollCamera {
            polls: polls.clone(),
            slow_poll: 2,
            slow_for: Duration::from_millis(40),
        };
        let config = SamplingLoopConfig { frequency_hz: 100.0, ..SamplingLoopConfig::default() };
        let sampling = SamplingLoop::new(&config, camera, Arc::new(EventBus::default())).unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sampling.run(rx));
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let polls = polls.lock().unwrap();
        assert!(polls.len() >= 5, "only {} polls", polls.len());
        // The poll right after the overrun fires at once; the one after that
        // waits a full period instead of catching up.
        let gap = polls[4].duration_since(polls[3]);
        assert!(gap >= Duration::from_millis(8), "catch-up burst: gap {gap:?}");
    }
}
