use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

fn default_manager_name() -> String {
    "userworkers".to_string()
}

fn default_resource_prefix() -> String {
    "worker".to_string()
}

fn default_exchange() -> String {
    "pipeline.messages".to_string()
}

fn default_workers_file() -> PathBuf {
    PathBuf::from("workers.json")
}

fn default_interval_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, Display, EnumString, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Kubernetes,
    Docker,
    None,
}

fn default_environment() -> String {
    "python".to_string()
}

fn default_concurrency() -> i32 {
    10
}

fn default_requests_per_pod() -> i32 {
    5
}

fn default_function_timeout() -> i32 {
    120
}

fn default_idle_timeout() -> i32 {
    900
}

fn default_min_scale() -> i32 {
    1
}

fn default_max_scale() -> i32 {
    100
}

fn default_specialization_timeout() -> i32 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FissionConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
    pub mqt_image: Option<String>,
    pub mqt_secret: Option<String>,
    pub image_pull_secret: Option<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: i32,
    #[serde(default = "default_requests_per_pod")]
    pub requests_per_pod: i32,
    #[serde(default = "default_function_timeout")]
    pub function_timeout: i32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: i32,
    #[serde(default = "default_min_scale")]
    pub min_scale: i32,
    #[serde(default = "default_max_scale")]
    pub max_scale: i32,
    #[serde(default = "default_specialization_timeout")]
    pub specialization_timeout: i32,
}

impl Default for FissionConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            mqt_image: None,
            mqt_secret: None,
            image_pull_secret: None,
            concurrency: default_concurrency(),
            requests_per_pod: default_requests_per_pod(),
            function_timeout: default_function_timeout(),
            idle_timeout: default_idle_timeout(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            specialization_timeout: default_specialization_timeout(),
        }
    }
}

fn default_worker_image() -> String {
    "sensorbucket/docker-worker:latest".to_string()
}

fn default_network_name() -> String {
    "sensorbucket".to_string()
}

fn default_workers_endpoint() -> String {
    "http://userworkers:3001".to_string()
}

fn default_amqp_host() -> String {
    "amqp://guest:guest@mq:5672".to_string()
}

fn default_endpoint_devices() -> String {
    "http://caddy/api/devices".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DockerConfig {
    #[serde(default = "default_worker_image")]
    pub image: String,
    /// Network alias, also used to look the network up when no id is given.
    #[serde(default = "default_network_name")]
    pub network_name: String,
    pub network_id: Option<String>,
    #[serde(default = "default_workers_endpoint")]
    pub workers_endpoint: String,
    #[serde(default = "default_amqp_host")]
    pub amqp_host: String,
    #[serde(default = "default_endpoint_devices")]
    pub endpoint_devices: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            image: default_worker_image(),
            network_name: default_network_name(),
            network_id: None,
            workers_endpoint: default_workers_endpoint(),
            amqp_host: default_amqp_host(),
            endpoint_devices: default_endpoint_devices(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_manager_name")]
    pub name: String,
    #[serde(default)]
    pub backend: BackendKind,
    pub namespace: Option<String>,
    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_workers_file")]
    pub workers_file: PathBuf,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Overrides the backend's own page size.
    pub page_size: Option<u32>,
    #[serde(default)]
    pub fission: FissionConfig,
    #[serde(default)]
    pub docker: DockerConfig,
}

impl Config {
    pub fn load() -> Result<Config, config::ConfigError> {
        Self::from_env(None)
    }

    fn from_env(source: Option<config::Map<String, String>>) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("USERWORKERS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(source),
            )
            .build()?
            .try_deserialize()
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
