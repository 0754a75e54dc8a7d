use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, EndpointSettings, HostConfig, NetworkingConfig};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, ListContainersOptions, ListNetworksOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use serde::{Deserialize, Serialize};

use crate::{Error, FilterParams, Result};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// Endpoint alias the container is attached under.
    pub name: String,
    pub id: String,
}

/// Everything the controller decides about a container.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkAttachment>,
    pub tty: bool,
}

/// A container as observed on the daemon.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub spec: ContainerSpec,
    pub state: Option<String>,
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Lists running and stopped containers whose labels match `params`.
    async fn list_containers(&self, params: &FilterParams) -> Result<Vec<ContainerRecord>>;
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;
    async fn start_container(&self, id: &str) -> Result<()>;
    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;
}

fn parse_env(env: impl IntoIterator<Item = String>) -> BTreeMap<String, String> {
    env.into_iter()
        .filter_map(|var| {
            var.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connects through `DOCKER_HOST` or the platform default socket.
    pub fn connect() -> Result<Self> {
        Ok(Self::new(Docker::connect_with_local_defaults()?))
    }

    /// Finds the first network whose name contains `fragment`, ignoring case.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn find_network(&self, fragment: &str) -> Result<Option<String>> {
        let fragment = fragment.to_lowercase();
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions>)
            .await?;
        Ok(networks.into_iter().find_map(|network| {
            network
                .name
                .filter(|name| name.to_lowercase().contains(&fragment))
                .and(network.id)
        }))
    }

    async fn inspect(&self, id: &str) -> Result<Option<ContainerRecord>> {
        let inspect = match self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => inspect,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let config = inspect.config.unwrap_or_default();
        let network = inspect
            .network_settings
            .and_then(|settings| settings.networks)
            .and_then(|networks| {
                networks.into_iter().min_by(|a, b| a.0.cmp(&b.0)).map(
                    |(name, endpoint)| NetworkAttachment {
                        name,
                        id: endpoint.network_id.unwrap_or_default(),
                    },
                )
            });
        Ok(Some(ContainerRecord {
            id: inspect.id.unwrap_or_else(|| id.to_string()),
            spec: ContainerSpec {
                name: inspect
                    .name
                    .map(|name| name.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                image: config.image.unwrap_or_default(),
                env: parse_env(config.env.unwrap_or_default()),
                labels: config.labels.unwrap_or_default().into_iter().collect(),
                network,
                tty: config.tty.unwrap_or_default(),
            },
            state: inspect
                .state
                .and_then(|state| state.status)
                .map(|status| status.to_string()),
        }))
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn list_containers(&self, params: &FilterParams) -> Result<Vec<ContainerRecord>> {
        let options = ListContainersOptions {
            all: true,
            filters: Some(HashMap::from(params)),
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(options)).await?;
        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else {
                continue;
            };
            let labels = summary.labels.unwrap_or_default();
            if !params.matches(|key| labels.get(key).map(String::as_str)) {
                continue;
            }
            if let Some(record) = self.inspect(&id).await? {
                containers.push(record);
            }
        }
        Ok(containers)
    }

    #[tracing::instrument(level = "debug", skip(self, spec), fields(name = %spec.name), err)]
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let networking_config = spec.network.as_ref().map(|network| NetworkingConfig {
            endpoints_config: Some(HashMap::from([(
                network.name.clone(),
                EndpointSettings {
                    network_id: Some(network.id.clone()),
                    ..Default::default()
                },
            )])),
        });
        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            env: Some(
                spec.env
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect(),
            ),
            labels: Some(spec.labels.clone().into_iter().collect()),
            tty: Some(spec.tty),
            host_config: Some(HostConfig {
                auto_remove: Some(false),
                ..Default::default()
            }),
            networking_config,
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: Some(spec.name.clone()),
            platform: String::new(),
        };
        let response = self.docker.create_container(Some(options), body).await?;
        if !response.warnings.is_empty() {
            tracing::warn!(
                name = %spec.name,
                warnings = ?response.warnings,
                "Docker reported warnings creating container"
            );
        }
        Ok(response.id)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(Error::from)
    }
}
