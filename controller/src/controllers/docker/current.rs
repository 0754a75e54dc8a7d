use tokio_util::sync::CancellationToken;
use userworkers::{ContainerRecord, FilterParams};

use crate::error::BackendError;
use crate::resource::{ManagedResource, WorkerResource};

use super::DockerBackend;

impl DockerBackend {
    pub(super) async fn list_containers(
        &self,
        params: &FilterParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkerResource<ContainerRecord>>, BackendError> {
        let containers = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            containers = self.engine.list_containers(params) => {
                containers.map_err(|source| BackendError::List {
                    kind: ContainerRecord::KIND,
                    source,
                })?
            }
        };
        Ok(containers
            .into_iter()
            .filter_map(|container| {
                let id = container.id.clone();
                WorkerResource::from_labelled(container)
                    .inspect_err(|err| {
                        tracing::warn!(%id, "Skipping container with bad labels: {err}");
                    })
                    .ok()
            })
            .collect())
    }
}
