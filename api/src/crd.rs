//! Fission `fission.io/v1` resources managed by the controller.
//!
//! Fission installs and owns these CRDs, so only the fields the controller
//! writes or reads are modelled and no schema is generated.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct EnvironmentReference {
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct PackageRef {
    pub namespace: String,
    pub name: String,
    #[serde(rename = "resourceversion", skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FunctionPackageRef {
    #[serde(rename = "packageref", default)]
    pub package_ref: PackageRef,
    #[serde(rename = "functionName", skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ExecutorType {
    #[strum(serialize = "poolmgr")]
    PoolManager,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ExecutionStrategy {
    #[serde(rename = "ExecutorType", skip_serializing_if = "Option::is_none")]
    pub executor_type: Option<String>,
    #[serde(rename = "MinScale", skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<i32>,
    #[serde(rename = "MaxScale", skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<i32>,
    #[serde(rename = "TargetCPUPercent", skip_serializing_if = "Option::is_none")]
    pub target_cpu_percent: Option<i32>,
    #[serde(
        rename = "SpecializationTimeout",
        skip_serializing_if = "Option::is_none"
    )]
    pub specialization_timeout: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct InvokeStrategy {
    #[serde(rename = "ExecutionStrategy", default)]
    pub execution_strategy: ExecutionStrategy,
    #[serde(rename = "StrategyType", skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "fission.io",
    version = "v1",
    kind = "Function",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
pub struct FunctionSpec {
    pub environment: EnvironmentReference,
    #[serde(default)]
    pub package: FunctionPackageRef,
    #[serde(rename = "InvokeStrategy", default)]
    pub invoke_strategy: InvokeStrategy,
    #[serde(rename = "functionTimeout", skip_serializing_if = "Option::is_none")]
    pub function_timeout: Option<i32>,
    #[serde(rename = "idletimeout", skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<i32>,
    #[serde(rename = "requestsPerPod", skip_serializing_if = "Option::is_none")]
    pub requests_per_pod: Option<i32>,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ArchiveType {
    #[strum(serialize = "literal")]
    Literal,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Checksum {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Archive {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<ByteString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct PackageStatus {
    #[serde(rename = "buildstatus", skip_serializing_if = "Option::is_none")]
    pub build_status: Option<String>,
    #[serde(rename = "buildlog", skip_serializing_if = "Option::is_none")]
    pub build_log: Option<String>,
    #[serde(rename = "lastUpdateTimestamp", skip_serializing_if = "Option::is_none")]
    pub last_update_timestamp: Option<Time>,
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "fission.io",
    version = "v1",
    kind = "Package",
    namespaced,
    status = "PackageStatus",
    schema = "disabled",
    derive = "PartialEq"
)]
pub struct PackageSpec {
    pub environment: EnvironmentReference,
    #[serde(default)]
    pub source: Archive,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Archive>,
    #[serde(rename = "buildcmd", skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FunctionReference {
    #[serde(rename = "type")]
    pub type_: String,
    pub name: String,
    #[serde(rename = "functionweights", skip_serializing_if = "Option::is_none")]
    pub function_weights: Option<BTreeMap<String, i32>>,
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "fission.io",
    version = "v1",
    kind = "MessageQueueTrigger",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
pub struct MessageQueueTriggerSpec {
    #[serde(rename = "functionref")]
    pub function_reference: FunctionReference,
    #[serde(rename = "messageQueueType")]
    pub message_queue_type: String,
    pub topic: String,
    #[serde(rename = "respTopic", skip_serializing_if = "Option::is_none")]
    pub response_topic: Option<String>,
    #[serde(rename = "errorTopic", skip_serializing_if = "Option::is_none")]
    pub error_topic: Option<String>,
    #[serde(rename = "maxRetries", default)]
    pub max_retries: i32,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(rename = "pollingInterval", skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<i32>,
    #[serde(rename = "cooldownPeriod", skip_serializing_if = "Option::is_none")]
    pub cooldown_period: Option<i32>,
    #[serde(rename = "minReplicaCount", skip_serializing_if = "Option::is_none")]
    pub min_replica_count: Option<i32>,
    #[serde(rename = "maxReplicaCount", skip_serializing_if = "Option::is_none")]
    pub max_replica_count: Option<i32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(rename = "mqtkind", skip_serializing_if = "Option::is_none")]
    pub mqt_kind: Option<String>,
    #[serde(rename = "podspec", skip_serializing_if = "Option::is_none")]
    pub pod_spec: Option<PodSpec>,
}
