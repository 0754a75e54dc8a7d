use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use userworkers::{ContainerEngine, ContainerRecord, ResourceApi};
use uuid::Uuid;

use crate::diff::diff;
use crate::error::{Action, ApplyError, ApplyErrors};
use crate::resource::{ManagedResource, WorkerResource};

/// Mutations planned for one resource kind.
#[derive(Clone, Debug)]
pub struct WorkSet<T> {
    pub delete: Vec<String>,
    pub update: BTreeMap<String, T>,
    pub create: Vec<T>,
}

impl<T> Default for WorkSet<T> {
    fn default() -> Self {
        Self {
            delete: Vec::new(),
            update: BTreeMap::new(),
            create: Vec::new(),
        }
    }
}

impl<T> WorkSet<T> {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.update.is_empty() && self.create.is_empty()
    }
}

/// Plans the calls that move `current` to `desired` for one kind.
///
/// Current objects of workers absent from `desired` are left alone; removing
/// those is the wandering pass's job.
pub fn plan<T>(
    current: &[WorkerResource<T>],
    desired: &[WorkerResource<T>],
) -> serde_json::Result<WorkSet<T>>
where
    T: ManagedResource,
{
    let mut by_worker: BTreeMap<Uuid, Vec<&WorkerResource<T>>> = BTreeMap::new();
    for resource in current {
        by_worker.entry(resource.id).or_default().push(resource);
    }

    let mut work = WorkSet::default();
    for desired in desired {
        let Some(candidates) = by_worker.get(&desired.id) else {
            tracing::info!(
                kind = T::KIND,
                worker = %desired.id,
                "Creating because it does not exist"
            );
            work.create.push(desired.resource.prepare_create());
            continue;
        };
        let Some(keep) = candidates.iter().copied().reduce(|keep, candidate| {
            if candidate.revision > keep.revision {
                candidate
            } else {
                keep
            }
        }) else {
            continue;
        };
        for duplicate in candidates {
            if !std::ptr::eq(*duplicate, keep) {
                tracing::info!(
                    kind = T::KIND,
                    worker = %desired.id,
                    key = %duplicate.resource.key(),
                    revision = duplicate.revision,
                    "Deleting duplicate"
                );
                work.delete.push(duplicate.resource.key());
            }
        }
        let diff = diff(keep, desired)?;
        if diff.has_changed {
            tracing::info!(
                kind = T::KIND,
                worker = %desired.id,
                changes = ?diff.changes,
                "Updating because it changed"
            );
            work.update.insert(
                keep.resource.key(),
                keep.resource.overlay(&desired.resource),
            );
        }
    }
    Ok(work)
}

/// Schedules every object belonging to one of `ids` for deletion.
pub fn plan_deletions<T>(current: &[WorkerResource<T>], ids: &BTreeSet<Uuid>) -> WorkSet<T>
where
    T: ManagedResource,
{
    WorkSet {
        delete: current
            .iter()
            .filter(|resource| ids.contains(&resource.id))
            .map(|resource| resource.resource.key())
            .collect(),
        ..Default::default()
    }
}

/// Backend calls for one resource kind.
#[async_trait]
pub trait ResourceApplier<T>: Send + Sync {
    async fn delete(&self, key: &str) -> userworkers::Result<()>;
    async fn update(&self, key: &str, resource: &T) -> userworkers::Result<()>;
    async fn create(&self, resource: &T) -> userworkers::Result<()>;
}

#[async_trait]
impl<K> ResourceApplier<K> for Arc<dyn ResourceApi<K>>
where
    K: ManagedResource,
{
    async fn delete(&self, key: &str) -> userworkers::Result<()> {
        ResourceApi::delete(self.as_ref(), key).await
    }

    async fn update(&self, key: &str, resource: &K) -> userworkers::Result<()> {
        self.replace(key, resource).await.map(|_| ())
    }

    async fn create(&self, resource: &K) -> userworkers::Result<()> {
        ResourceApi::create(self.as_ref(), resource)
            .await
            .map(|_| ())
    }
}

/// Containers cannot be changed in place, so an update replaces the container.
pub struct ContainerApplier {
    engine: Arc<dyn ContainerEngine>,
}

impl ContainerApplier {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ResourceApplier<ContainerRecord> for ContainerApplier {
    async fn delete(&self, key: &str) -> userworkers::Result<()> {
        self.engine.remove_container(key, true).await
    }

    async fn update(&self, key: &str, resource: &ContainerRecord) -> userworkers::Result<()> {
        self.engine.remove_container(key, true).await?;
        self.create(resource).await
    }

    async fn create(&self, resource: &ContainerRecord) -> userworkers::Result<()> {
        let id = self.engine.create_container(&resource.spec).await?;
        self.engine.start_container(&id).await
    }
}

/// Runs deletes, then updates, then creates, attempting every call even when
/// earlier ones fail. Once `cancel` fires the call in flight is dropped and
/// nothing further is attempted.
pub async fn apply_work_set<T, A>(
    applier: &A,
    work: WorkSet<T>,
    cancel: &CancellationToken,
    errors: &mut ApplyErrors,
) where
    T: ManagedResource,
    A: ResourceApplier<T> + ?Sized,
{
    if work.is_empty() {
        return;
    }
    tracing::info!(
        kind = T::KIND,
        delete = work.delete.len(),
        update = work.update.len(),
        create = work.create.len(),
        "Applying work"
    );
    let mut record = |action: Action, name: String, result: userworkers::Result<()>| {
        match result {
            Ok(()) => {}
            Err(err) if action == Action::Delete && err.is_not_found() => {
                tracing::debug!(kind = T::KIND, %name, "Already deleted");
            }
            Err(source) => {
                tracing::warn!(kind = T::KIND, %action, %name, error = %source, "Failed to apply");
                errors.push(ApplyError {
                    action,
                    kind: T::KIND,
                    name,
                    source,
                });
            }
        }
    };

    for key in work.delete {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = applier.delete(&key) => result,
        };
        record(Action::Delete, key, result);
    }
    for (key, resource) in work.update {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = applier.update(&key, &resource) => result,
        };
        record(Action::Update, key, result);
    }
    for resource in work.create {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = applier.create(&resource) => result,
        };
        record(Action::Create, resource.key(), result);
    }
    if cancel.is_cancelled() {
        errors.cancelled = true;
    }
}
