//! `navbridge-runtime` – the running bridge.
//!
//! Polls a tracking camera at a fixed rate, converts each sample into the
//! navigation frame, and publishes it, while a separate task applies resync
//! requests to the shared drift state.
//!
//! # Modules
//!
//! - [`sampling_loop`] – [`SamplingLoop`][sampling_loop::SamplingLoop]:
//!   the fixed-rate poll, transform and publish cycle, with per-tick error
//!   isolation and [`LoopStats`][sampling_loop::LoopStats].
//! - [`publisher`] – [`NavPublisher`][publisher::NavPublisher]: NaN checks
//!   and the ordered emission of the five outbound messages.
//! - [`resync`] – [`ResyncHandler`][resync::ResyncHandler]: consumes
//!   `avr/vio/resync` requests.
//! - [`bridge`] – [`NavBridge`][bridge::NavBridge]: runs the two together.
//! - [`watchdog`] – [`SampleWatchdog`][watchdog::SampleWatchdog]: logs when
//!   camera data goes stale and when it resumes.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP span export.

pub mod bridge;
pub mod publisher;
pub mod resync;
pub mod sampling_loop;
pub mod telemetry;
pub mod watchdog;

pub use bridge::NavBridge;
pub use publisher::{NavPublisher, PublishOutcome, VectorGroup, normalize_heading_degrees};
pub use resync::ResyncHandler;
pub use sampling_loop::{LoopStats, SamplingLoop, SamplingLoopConfig, TickOutcome};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use watchdog::{FeedHealth, SampleWatchdog};
