use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use userworkers::{FilterParams, UserWorker, owned_by, owned_workers};
use uuid::Uuid;

use crate::error::{ApplyErrors, BackendError};

/// Which owned objects a current-state read covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Workers(Vec<Uuid>),
    Owned,
}

impl Scope {
    /// `None` when the scope cannot match anything.
    pub fn filter_params(&self, controlled_by: &str) -> Option<FilterParams> {
        match self {
            Self::Workers(ids) if ids.is_empty() => None,
            Self::Workers(ids) => {
                Some(FilterParams::new().with_labels(owned_workers(controlled_by, ids)))
            }
            Self::Owned => Some(FilterParams::new().with_labels(owned_by(controlled_by))),
        }
    }
}

pub trait Snapshot {
    fn worker_ids(&self) -> BTreeSet<Uuid>;
}

/// An execution backend the reconciler keeps in line with the store.
#[async_trait]
pub trait Backend: Send + Sync {
    type State: Snapshot + Send + Sync;
    type Work: Send;

    const NAME: &'static str;
    /// Workers requested from the store per page.
    const PAGE_SIZE: u32;

    fn desired_state(&self, workers: &[UserWorker]) -> Self::State;

    async fn current_state(
        &self,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Result<Self::State, BackendError>;

    fn plan(&self, current: &Self::State, desired: &Self::State)
    -> Result<Self::Work, BackendError>;

    fn plan_deletions(&self, current: &Self::State, ids: &BTreeSet<Uuid>) -> Self::Work;

    async fn apply(&self, work: Self::Work, cancel: &CancellationToken) -> Result<(), ApplyErrors>;
}
