//! Periodic and on-demand sync runs.
//!
//! The scheduler owns the receiving end of a small request channel. Runs
//! are triggered by the interval timer (first shortly after start) or by a
//! [`UsersyncTrigger`], and execute one at a time. When user sync is
//! disabled requests are drained and logged so triggers never block.

use std::sync::Arc;

use stratus_core::CorrelationId;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::Usersyncer;
use crate::error::{UsersyncError, UsersyncResult};

/// Pending requests beyond the one being processed.
const REQUEST_BUFFER: usize = 1;

/// Requests on-demand sync runs.
#[derive(Debug, Clone)]
pub struct UsersyncTrigger {
    tx: mpsc::Sender<CorrelationId>,
}

impl UsersyncTrigger {
    /// Queue a run tagged with `correlation_id`. Waits while a request is
    /// already pending.
    pub async fn request_sync(&self, correlation_id: CorrelationId) -> UsersyncResult<()> {
        self.tx
            .send(correlation_id)
            .await
            .map_err(|_| UsersyncError::SchedulerStopped)
    }
}

/// Drives [`Usersyncer`] runs until shut down.
pub struct UsersyncScheduler {
    syncer: Option<Arc<Usersyncer>>,
    requests: mpsc::Receiver<CorrelationId>,
    shutdown: CancellationToken,
}

impl UsersyncScheduler {
    /// Scheduler for `syncer`. Behaves as [`UsersyncScheduler::disabled`]
    /// when the syncer's configuration has sync turned off.
    pub fn new(syncer: Arc<Usersyncer>, shutdown: CancellationToken) -> (Self, UsersyncTrigger) {
        let syncer = syncer.config().enabled.then_some(syncer);
        Self::build(syncer, shutdown)
    }

    /// Scheduler that only drains requests.
    pub fn disabled(shutdown: CancellationToken) -> (Self, UsersyncTrigger) {
        Self::build(None, shutdown)
    }

    fn build(
        syncer: Option<Arc<Usersyncer>>,
        shutdown: CancellationToken,
    ) -> (Self, UsersyncTrigger) {
        let (tx, requests) = mpsc::channel(REQUEST_BUFFER);
        (
            Self {
                syncer,
                requests,
                shutdown,
            },
            UsersyncTrigger { tx },
        )
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.syncer.is_some()
    }

    /// Run until the shutdown token is cancelled.
    pub async fn run(mut self) {
        let Some(syncer) = self.syncer.take() else {
            tracing::info!("User sync is disabled");
            self.drain().await;
            return;
        };

        let config = syncer.config();
        tracing::info!(
            interval_secs = config.interval_secs,
            tenant_domain = %config.tenant_domain,
            "User sync scheduler started"
        );

        let mut ticker =
            tokio::time::interval_at(Instant::now() + config.first_run_delay(), config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                Some(correlation_id) = self.requests.recv() => {
                    tracing::debug!(%correlation_id, "Requested user sync triggered");
                    self.run_once(&syncer, correlation_id).await;
                }
                _ = ticker.tick() => {
                    let correlation_id = CorrelationId::new();
                    tracing::debug!(%correlation_id, "Scheduled user sync triggered");
                    self.run_once(&syncer, correlation_id).await;
                }
            }
        }

        tracing::info!("User sync scheduler stopped");
    }

    async fn run_once(&self, syncer: &Usersyncer, correlation_id: CorrelationId) {
        // Failures are logged and recorded in the run history by the syncer.
        if let Err(e) = syncer
            .sync_until_cancelled(correlation_id, &self.shutdown)
            .await
        {
            tracing::debug!(%correlation_id, retryable = e.is_retryable(), "User sync run failed");
        }
    }

    async fn drain(&mut self) {
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(correlation_id) => {
                        tracing::info!(%correlation_id, "Draining user sync request");
                    }
                    None => break,
                },
            }
        }
    }
}
