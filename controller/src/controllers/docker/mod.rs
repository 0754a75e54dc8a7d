mod current;
mod desired;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use userworkers::{ContainerEngine, ContainerRecord, NetworkAttachment, UserWorker};
use uuid::Uuid;

use crate::backend::{Backend, Scope, Snapshot};
use crate::config::Config;
use crate::error::{ApplyErrors, BackendError};
use crate::resource::{ManagedResource, WorkerResource};
use crate::work::{ContainerApplier, WorkSet, apply_work_set, plan, plan_deletions};

#[derive(Clone, Debug)]
pub struct DockerSettings {
    pub controlled_by: String,
    pub resource_prefix: String,
    pub image: String,
    pub network: Option<NetworkAttachment>,
    pub workers_endpoint: String,
    pub amqp_host: String,
    pub exchange: String,
    pub endpoint_devices: String,
}

impl DockerSettings {
    /// `network_id` is the id resolved for the configured network, if any.
    pub fn from_config(config: &Config, network_id: Option<String>) -> Self {
        Self {
            controlled_by: config.name.clone(),
            resource_prefix: config.resource_prefix.clone(),
            image: config.docker.image.clone(),
            network: network_id.map(|id| NetworkAttachment {
                name: config.docker.network_name.clone(),
                id,
            }),
            workers_endpoint: config.docker.workers_endpoint.clone(),
            amqp_host: config.docker.amqp_host.clone(),
            exchange: config.exchange.clone(),
            endpoint_devices: config.docker.endpoint_devices.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DockerState {
    pub containers: Vec<WorkerResource<ContainerRecord>>,
}

impl Snapshot for DockerState {
    fn worker_ids(&self) -> BTreeSet<Uuid> {
        self.containers.iter().map(|r| r.id).collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct DockerWork {
    pub containers: WorkSet<ContainerRecord>,
}

/// Runs every worker as one long-lived container on a Docker daemon.
pub struct DockerBackend {
    settings: DockerSettings,
    engine: Arc<dyn ContainerEngine>,
    applier: ContainerApplier,
}

impl DockerBackend {
    pub fn new(settings: DockerSettings, engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            settings,
            applier: ContainerApplier::new(engine.clone()),
            engine,
        }
    }

    #[inline]
    pub fn settings(&self) -> &DockerSettings {
        &self.settings
    }
}

#[async_trait]
impl Backend for DockerBackend {
    type State = DockerState;
    type Work = DockerWork;

    const NAME: &'static str = "docker";
    const PAGE_SIZE: u32 = 10;

    fn desired_state(&self, workers: &[UserWorker]) -> DockerState {
        DockerState {
            containers: workers
                .iter()
                .map(|worker| self.desired_container(worker))
                .collect(),
        }
    }

    async fn current_state(
        &self,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Result<DockerState, BackendError> {
        let Some(params) = scope.filter_params(&self.settings.controlled_by) else {
            return Ok(DockerState::default());
        };
        Ok(DockerState {
            containers: self.list_containers(&params, cancel).await?,
        })
    }

    fn plan(&self, current: &DockerState, desired: &DockerState) -> Result<DockerWork, BackendError> {
        Ok(DockerWork {
            containers: plan(&current.containers, &desired.containers).map_err(|source| {
                BackendError::Compare {
                    kind: ContainerRecord::KIND,
                    source,
                }
            })?,
        })
    }

    fn plan_deletions(&self, current: &DockerState, ids: &BTreeSet<Uuid>) -> DockerWork {
        DockerWork {
            containers: plan_deletions(&current.containers, ids),
        }
    }

    async fn apply(&self, work: DockerWork, cancel: &CancellationToken) -> Result<(), ApplyErrors> {
        let mut errors = ApplyErrors::default();
        apply_work_set(&self.applier, work.containers, cancel, &mut errors).await;
        errors.into_result()
    }
}
