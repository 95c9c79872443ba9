//! [`NavBridge`] – wires the sampling loop and the resync handler together.
//!
//! Both halves share one [`SharedDrift`].  The resync handler is spawned as
//! a background task; the sampling loop runs on the caller's task.  When the
//! loop returns, for any reason, the handler is stopped too.

use std::sync::Arc;

use navbridge_hal::TrackingCamera;
use navbridge_middleware::Transport;
use navbridge_perception::SharedDrift;
use navbridge_types::NavError;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::resync::ResyncHandler;
use crate::sampling_loop::{LoopStats, SamplingLoop, SamplingLoopConfig};

/// The complete bridge: camera in, navigation messages out, resync in.
pub struct NavBridge<C: TrackingCamera> {
    sampling: SamplingLoop<C>,
    resync: ResyncHandler,
}

impl<C: TrackingCamera> NavBridge<C> {
    /// Build the bridge.  Subscribes to resync requests right away.
    pub fn new(
        config: &SamplingLoopConfig,
        camera: C,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NavError> {
        let sampling = SamplingLoop::new(config, camera, transport.clone())?;
        let resync = ResyncHandler::new(sampling.drift(), transport.as_ref());
        Ok(Self { sampling, resync })
    }

    pub fn drift(&self) -> SharedDrift {
        self.sampling.drift()
    }

    /// Run until `shutdown` changes or camera setup fails.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<LoopStats, NavError> {
        let drift = self.sampling.drift();
        let resync_task = tokio::spawn(self.resync.run(shutdown.clone()));

        let result = self.sampling.run(shutdown).await;

        // A setup failure returns without a shutdown signal.
        resync_task.abort();
        if let Err(e) = resync_task.await
            && !e.is_cancelled()
        {
            warn!(error = %e, "resync task ended abnormally");
        }

        info!(resyncs_applied = drift.recomputations(), "navigation bridge stopped");
        result
    }
}
