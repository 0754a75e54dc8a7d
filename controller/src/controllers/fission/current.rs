use std::sync::Arc;

use futures::prelude::*;
use tokio_util::sync::CancellationToken;
use userworkers::{ApiListStreamExt, FilterParams, ResourceApi};

use crate::error::BackendError;
use crate::resource::{ManagedResource, WorkerResource};

/// Lists every object matching `params`, skipping those whose worker labels
/// cannot be read.
pub(super) async fn list<K>(
    api: &Arc<dyn ResourceApi<K>>,
    params: &FilterParams,
    cancel: &CancellationToken,
) -> Result<Vec<WorkerResource<K>>, BackendError>
where
    K: ManagedResource + Unpin,
{
    let objects: Vec<K> = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(BackendError::Cancelled),
        objects = api.list_stream(params).try_collect::<Vec<K>>() => {
            objects.map_err(|source| BackendError::List { kind: K::KIND, source })?
        }
    };
    Ok(objects
        .into_iter()
        .filter_map(|object| {
            let key = object.key();
            WorkerResource::from_labelled(object)
                .inspect_err(|err| {
                    tracing::warn!(kind = K::KIND, %key, "Skipping object with bad labels: {err}");
                })
                .ok()
        })
        .collect())
}
