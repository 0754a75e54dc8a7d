use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use userworkers::{Store, WorkerFilters};
use uuid::Uuid;

use crate::backend::{Backend, Scope, Snapshot};
use crate::error::{ApplyErrors, ReconcileError};
use crate::reconciler::Reconciler;

/// Owned workers the store no longer reports as existing and enabled.
pub fn wandering_ids(owned: &BTreeSet<Uuid>, existing: &[Uuid]) -> BTreeSet<Uuid> {
    let existing = existing.iter().collect::<BTreeSet<_>>();
    owned
        .iter()
        .filter(|id| !existing.contains(id))
        .copied()
        .collect()
}

impl<B, S> Reconciler<B, S>
where
    B: Backend,
    S: Store,
{
    /// Deletes every owned object whose worker is gone or disabled.
    ///
    /// Failing to find them aborts the pass; failing to delete them is
    /// recorded in `failures`.
    pub(crate) async fn delete_wandering(
        &self,
        cancel: &CancellationToken,
        failures: &mut ApplyErrors,
    ) -> Result<(), ReconcileError> {
        tracing::info!("Preparing to delete wandering resources...");
        let owned = self
            .backend
            .current_state(Scope::Owned, cancel)
            .await
            .map_err(ReconcileError::wandering)?;
        let owned_ids = owned.worker_ids();
        if owned_ids.is_empty() {
            return Ok(());
        }
        let ids = owned_ids.iter().copied().collect::<Vec<_>>();
        let filters = WorkerFilters::enabled();
        let existing = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReconcileError::Cancelled),
            existing = self.store.workers_exist(&ids, &filters) => {
                existing.map_err(ReconcileError::WorkersExist)?
            }
        };
        let wandering = wandering_ids(&owned_ids, &existing);
        tracing::info!("Removing resources of {} wandering workers", wandering.len());
        if wandering.is_empty() {
            return Ok(());
        }
        let work = self.backend.plan_deletions(&owned, &wandering);
        if let Err(errors) = self.backend.apply(work, cancel).await {
            tracing::error!("Error deleting wandering resources: {errors}");
            failures.extend(errors);
        }
        Ok(())
    }
}
