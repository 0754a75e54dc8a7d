mod apply;
mod current;
mod desired;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use userworkers::{Client, Function, MessageQueueTrigger, Package, ResourceApi, UserWorker};
use uuid::Uuid;

use crate::backend::{Backend, Scope, Snapshot};
use crate::config::{Config, FissionConfig};
use crate::error::{ApplyErrors, BackendError, SettingsError};
use crate::resource::{ManagedResource, WorkerResource};
use crate::work::{WorkSet, plan, plan_deletions};

/// Everything the Fission backend needs to derive resources from a worker.
#[derive(Clone, Debug)]
pub struct FissionSettings {
    pub controlled_by: String,
    pub namespace: String,
    pub resource_prefix: String,
    pub exchange: String,
    pub mqt_image: String,
    pub mqt_secret: String,
    pub function: FissionConfig,
}

impl FissionSettings {
    pub fn from_config(config: &Config, namespace: impl ToString) -> Result<Self, SettingsError> {
        Ok(Self {
            controlled_by: config.name.clone(),
            namespace: namespace.to_string(),
            resource_prefix: config.resource_prefix.clone(),
            exchange: config.exchange.clone(),
            mqt_image: config
                .fission
                .mqt_image
                .clone()
                .ok_or(SettingsError::Missing("fission.mqt_image"))?,
            mqt_secret: config
                .fission
                .mqt_secret
                .clone()
                .ok_or(SettingsError::Missing("fission.mqt_secret"))?,
            function: config.fission.clone(),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct FissionState {
    pub functions: Vec<WorkerResource<Function>>,
    pub packages: Vec<WorkerResource<Package>>,
    pub triggers: Vec<WorkerResource<MessageQueueTrigger>>,
}

impl Snapshot for FissionState {
    fn worker_ids(&self) -> BTreeSet<Uuid> {
        let functions = self.functions.iter().map(|r| r.id);
        let packages = self.packages.iter().map(|r| r.id);
        let triggers = self.triggers.iter().map(|r| r.id);
        functions.chain(packages).chain(triggers).collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FissionWork {
    pub functions: WorkSet<Function>,
    pub packages: WorkSet<Package>,
    pub triggers: WorkSet<MessageQueueTrigger>,
}

/// Runs every worker as a Fission Function with its Package and a
/// MessageQueueTrigger feeding it.
pub struct FissionBackend {
    settings: FissionSettings,
    functions: Arc<dyn ResourceApi<Function>>,
    packages: Arc<dyn ResourceApi<Package>>,
    triggers: Arc<dyn ResourceApi<MessageQueueTrigger>>,
}

impl FissionBackend {
    pub fn new(
        settings: FissionSettings,
        functions: Arc<dyn ResourceApi<Function>>,
        packages: Arc<dyn ResourceApi<Package>>,
        triggers: Arc<dyn ResourceApi<MessageQueueTrigger>>,
    ) -> Self {
        Self {
            settings,
            functions,
            packages,
            triggers,
        }
    }

    pub fn from_client(client: &Client, settings: FissionSettings) -> Self {
        Self::new(
            settings,
            client.resource_api(),
            client.resource_api(),
            client.resource_api(),
        )
    }

    #[inline]
    pub fn settings(&self) -> &FissionSettings {
        &self.settings
    }
}

fn compare_error<T: ManagedResource>(source: serde_json::Error) -> BackendError {
    BackendError::Compare {
        kind: T::KIND,
        source,
    }
}

#[async_trait]
impl Backend for FissionBackend {
    type State = FissionState;
    type Work = FissionWork;

    const NAME: &'static str = "fission";
    const PAGE_SIZE: u32 = 50;

    fn desired_state(&self, workers: &[UserWorker]) -> FissionState {
        let mut state = FissionState::default();
        for worker in workers {
            state.functions.push(self.desired_function(worker));
            state.packages.push(self.desired_package(worker));
            state.triggers.push(self.desired_trigger(worker));
        }
        state
    }

    async fn current_state(
        &self,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Result<FissionState, BackendError> {
        let Some(params) = scope.filter_params(&self.settings.controlled_by) else {
            return Ok(FissionState::default());
        };
        Ok(FissionState {
            functions: current::list(&self.functions, &params, cancel).await?,
            packages: current::list(&self.packages, &params, cancel).await?,
            triggers: current::list(&self.triggers, &params, cancel).await?,
        })
    }

    fn plan(
        &self,
        current: &FissionState,
        desired: &FissionState,
    ) -> Result<FissionWork, BackendError> {
        Ok(FissionWork {
            functions: plan(&current.functions, &desired.functions)
                .map_err(compare_error::<Function>)?,
            packages: plan(&current.packages, &desired.packages)
                .map_err(compare_error::<Package>)?,
            triggers: plan(&current.triggers, &desired.triggers)
                .map_err(compare_error::<MessageQueueTrigger>)?,
        })
    }

    fn plan_deletions(&self, current: &FissionState, ids: &BTreeSet<Uuid>) -> FissionWork {
        FissionWork {
            functions: plan_deletions(&current.functions, ids),
            packages: plan_deletions(&current.packages, ids),
            triggers: plan_deletions(&current.triggers, ids),
        }
    }

    async fn apply(&self, work: FissionWork, cancel: &CancellationToken) -> Result<(), ApplyErrors> {
        self.apply_work(work, cancel).await
    }
}
