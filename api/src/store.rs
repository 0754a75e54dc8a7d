use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{Error, Result, UserWorker, WorkerState};

#[derive(Clone, Copy, Debug, Default)]
pub struct WorkerFilters {
    pub state: Option<WorkerState>,
}

impl WorkerFilters {
    pub fn enabled() -> Self {
        Self {
            state: Some(WorkerState::Enabled),
        }
    }

    fn matches(&self, worker: &UserWorker) -> bool {
        self.state.is_none_or(|state| worker.state == state)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Pagination {
    pub cursor: Option<String>,
    pub limit: u32,
}

impl Pagination {
    pub fn first(limit: u32) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }

    pub fn next(&self, cursor: String) -> Self {
        Self {
            cursor: Some(cursor),
            limit: self.limit,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Present while more records follow this page.
    pub cursor: Option<String>,
}

/// Source of truth for worker records.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_user_workers(
        &self,
        filters: &WorkerFilters,
        pagination: &Pagination,
    ) -> Result<Page<UserWorker>>;

    /// Returns the subset of `ids` that exist and match `filters`.
    async fn workers_exist(&self, ids: &[Uuid], filters: &WorkerFilters) -> Result<Vec<Uuid>>;
}

fn paginate<'a>(
    workers: impl IntoIterator<Item = &'a UserWorker>,
    filters: &WorkerFilters,
    pagination: &Pagination,
) -> Result<Page<UserWorker>> {
    let after = pagination
        .cursor
        .as_deref()
        .map(|cursor| Uuid::parse_str(cursor).map_err(|_| Error::InvalidCursor(cursor.into())))
        .transpose()?;
    let limit = match pagination.limit {
        0 => usize::MAX,
        limit => limit as usize,
    };
    let mut matching = workers
        .into_iter()
        .filter(|worker| after.is_none_or(|after| worker.id > after))
        .filter(|worker| filters.matches(worker))
        .peekable();
    let mut data = Vec::new();
    while data.len() < limit {
        let Some(worker) = matching.next() else {
            break;
        };
        data.push(worker.clone());
    }
    let cursor = match (matching.peek(), data.last()) {
        (Some(_), Some(last)) => Some(last.id.to_string()),
        _ => None,
    };
    Ok(Page { data, cursor })
}

fn existing<'a>(
    workers: &BTreeMap<Uuid, UserWorker>,
    ids: impl IntoIterator<Item = &'a Uuid>,
    filters: &WorkerFilters,
) -> Vec<Uuid> {
    ids.into_iter()
        .filter(|id| workers.get(id).is_some_and(|worker| filters.matches(worker)))
        .copied()
        .collect()
}

/// Keeps workers in memory, ordered by id so that the id doubles as cursor.
#[derive(Default)]
pub struct MemoryStore {
    workers: RwLock<BTreeMap<Uuid, UserWorker>>,
}

impl MemoryStore {
    pub fn new(workers: impl IntoIterator<Item = UserWorker>) -> Self {
        Self {
            workers: RwLock::new(workers.into_iter().map(|w| (w.id, w)).collect()),
        }
    }

    pub fn upsert(&self, worker: UserWorker) {
        self.workers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(worker.id, worker);
    }

    pub fn remove(&self, id: &Uuid) -> Option<UserWorker> {
        self.workers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_user_workers(
        &self,
        filters: &WorkerFilters,
        pagination: &Pagination,
    ) -> Result<Page<UserWorker>> {
        let workers = self
            .workers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        paginate(workers.values(), filters, pagination)
    }

    async fn workers_exist(&self, ids: &[Uuid], filters: &WorkerFilters) -> Result<Vec<Uuid>> {
        let workers = self
            .workers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(existing(&workers, ids, filters))
    }
}

/// Reads a JSON array of workers from disk on every call, so edits to the
/// file are picked up by the next reconciliation pass.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<BTreeMap<Uuid, UserWorker>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| Error::WorkersFile {
                path: self.path.display().to_string(),
                source,
            })?;
        let workers: Vec<UserWorker> = serde_json::from_slice(&bytes)?;
        Ok(workers.into_iter().map(|w| (w.id, w)).collect())
    }
}

#[async_trait]
impl Store for FileStore {
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn list_user_workers(
        &self,
        filters: &WorkerFilters,
        pagination: &Pagination,
    ) -> Result<Page<UserWorker>> {
        let workers = self.load().await?;
        paginate(workers.values(), filters, pagination)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn workers_exist(&self, ids: &[Uuid], filters: &WorkerFilters) -> Result<Vec<Uuid>> {
        let workers = self.load().await?;
        Ok(existing(&workers, ids, filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(state: WorkerState) -> UserWorker {
        let mut worker = UserWorker::new(1, "w", vec![]);
        worker.state = state;
        worker
    }

    #[tokio::test]
    async fn test_pages_cover_all_enabled_workers() {
        let workers = (0..5)
            .map(|i| {
                worker(if i == 2 {
                    WorkerState::Disabled
                } else {
                    WorkerState::Enabled
                })
            })
            .collect::<Vec<_>>();
        let store = MemoryStore::new(workers.clone());
        let filters = WorkerFilters::enabled();

        let mut pagination = Pagination::first(2);
        let mut seen = Vec::new();
        let mut pages = 0;
        loop {
            let page = store.list_user_workers(&filters, &pagination).await.unwrap();
            pages += 1;
            seen.extend(page.data.iter().map(|w| w.id));
            match page.cursor {
                Some(cursor) => pagination = pagination.next(cursor),
                None => break,
            }
        }
        assert_eq!(pages, 2);
        let mut expected = workers
            .iter()
            .filter(|w| w.is_enabled())
            .map(|w| w.id)
            .collect::<Vec<_>>();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_workers_exist_filters_state() {
        let enabled = worker(WorkerState::Enabled);
        let disabled = worker(WorkerState::Disabled);
        let missing = Uuid::new_v4();
        let store = MemoryStore::new([enabled.clone(), disabled.clone()]);
        let found = store
            .workers_exist(&[enabled.id, disabled.id, missing], &WorkerFilters::enabled())
            .await
            .unwrap();
        assert_eq!(found, vec![enabled.id]);
    }

    #[tokio::test]
    async fn test_invalid_cursor() {
        let store = MemoryStore::default();
        let pagination = Pagination::first(10).next("nope".into());
        assert!(matches!(
            store
                .list_user_workers(&WorkerFilters::default(), &pagination)
                .await,
            Err(Error::InvalidCursor(_))
        ));
    }
}
