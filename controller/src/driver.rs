use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use userworkers::Store;

use crate::backend::Backend;
use crate::config::Config;
use crate::error::ReconcileError;
use crate::reconciler::Reconciler;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub delay: Duration,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Schedule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            delay: Duration::from_secs(1),
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }
}

impl<B, S> Reconciler<B, S>
where
    B: Backend,
    S: Store,
{
    /// Runs one pass, cancelling it cooperatively once `timeout` elapses.
    pub async fn reconcile_with_deadline(
        &self,
        timeout: Duration,
        shutdown: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let cancel = shutdown.child_token();
        let pass = self.reconcile(&cancel);
        tokio::pin!(pass);
        tokio::select! {
            result = &mut pass => result,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!("Reconciliation exceeded {timeout:?}, cancelling");
                cancel.cancel();
                pass.await
            }
        }
    }
}

/// Reconciles on `schedule` until `shutdown` is cancelled. Passes never
/// overlap; a pass that runs long delays the next tick.
pub async fn run<B, S>(reconciler: &Reconciler<B, S>, schedule: Schedule, shutdown: CancellationToken)
where
    B: Backend,
    S: Store,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + schedule.delay, schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match reconciler
            .reconcile_with_deadline(schedule.timeout, &shutdown)
            .await
        {
            Ok(()) => {}
            Err(ReconcileError::Cancelled) if shutdown.is_cancelled() => break,
            Err(err) => tracing::error!("Error reconciling: {err}"),
        }
    }
    tracing::info!("Reconciliation loop stopped");
}
