use std::collections::BTreeMap;

use userworkers::k8s_openapi::ByteString;
use userworkers::k8s_openapi::api::core::v1::{Container, EnvVar, LocalObjectReference, PodSpec};
use userworkers::kube::api::ObjectMeta;
use userworkers::{
    Archive, ArchiveType, EnvironmentReference, ExecutionStrategy, ExecutorType, Function,
    FunctionPackageRef, FunctionReference, FunctionSpec, InvokeStrategy, MessageQueueTrigger,
    MessageQueueTriggerSpec, Package, PackageRef, PackageSpec, PackageStatus, UserWorker,
    WorkerLabel, WorkerLabels,
};

use crate::resource::WorkerResource;

use super::FissionBackend;

impl FissionBackend {
    pub(crate) fn resource_name(&self, worker: &UserWorker) -> String {
        format!("{}-{}", self.settings.resource_prefix, worker.id)
    }

    fn metadata(&self, worker: &UserWorker) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.resource_name(worker)),
            namespace: Some(self.settings.namespace.clone()),
            labels: Some(
                WorkerLabels::new(&self.settings.controlled_by, worker.id, worker.revision)
                    .to_map(),
            ),
            annotations: Some(BTreeMap::from([(
                WorkerLabel::WorkerRevision.key().to_string(),
                worker.revision.to_string(),
            )])),
            ..Default::default()
        }
    }

    fn environment(&self) -> EnvironmentReference {
        EnvironmentReference {
            namespace: self.settings.namespace.clone(),
            name: self.settings.function.environment.clone(),
        }
    }

    fn resource<T>(&self, worker: &UserWorker, resource: T) -> WorkerResource<T> {
        WorkerResource {
            id: worker.id,
            revision: worker.revision,
            resource,
        }
    }

    pub(crate) fn desired_function(&self, worker: &UserWorker) -> WorkerResource<Function> {
        let defaults = &self.settings.function;
        let spec = FunctionSpec {
            environment: self.environment(),
            package: FunctionPackageRef {
                package_ref: PackageRef {
                    namespace: self.settings.namespace.clone(),
                    name: self.resource_name(worker),
                    resource_version: None,
                },
                function_name: Some(worker.entrypoint.clone()),
            },
            invoke_strategy: InvokeStrategy {
                strategy_type: Some("execution".to_string()),
                execution_strategy: ExecutionStrategy {
                    executor_type: Some(ExecutorType::PoolManager.to_string()),
                    min_scale: Some(defaults.min_scale),
                    max_scale: Some(defaults.max_scale),
                    target_cpu_percent: None,
                    specialization_timeout: Some(defaults.specialization_timeout),
                },
            },
            function_timeout: Some(defaults.function_timeout),
            idle_timeout: Some(defaults.idle_timeout),
            concurrency: Some(defaults.concurrency),
            requests_per_pod: Some(defaults.requests_per_pod),
        };
        self.resource(
            worker,
            Function {
                metadata: self.metadata(worker),
                spec,
            },
        )
    }

    pub(crate) fn desired_package(&self, worker: &UserWorker) -> WorkerResource<Package> {
        let spec = PackageSpec {
            environment: self.environment(),
            source: Archive {
                type_: Some(ArchiveType::Literal.to_string()),
                literal: Some(ByteString(worker.source.0.clone())),
                url: None,
                checksum: None,
            },
            deployment: None,
            build_command: None,
        };
        self.resource(
            worker,
            Package {
                metadata: self.metadata(worker),
                spec,
                status: Some(PackageStatus {
                    build_status: Some("pending".to_string()),
                    ..Default::default()
                }),
            },
        )
    }

    pub(crate) fn desired_trigger(
        &self,
        worker: &UserWorker,
    ) -> WorkerResource<MessageQueueTrigger> {
        let name = self.resource_name(worker);
        let pod_spec = PodSpec {
            containers: vec![Container {
                name: name.clone(),
                image: Some(self.settings.mqt_image.clone()),
                image_pull_policy: Some("IfNotPresent".to_string()),
                env: Some(vec![EnvVar {
                    name: "EXCHANGE".to_string(),
                    value: Some(self.settings.exchange.clone()),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            image_pull_secrets: self
                .settings
                .function
                .image_pull_secret
                .as_ref()
                .map(|secret| {
                    vec![LocalObjectReference {
                        name: secret.clone(),
                    }]
                }),
            ..Default::default()
        };
        let spec = MessageQueueTriggerSpec {
            function_reference: FunctionReference {
                type_: "name".to_string(),
                name: name.clone(),
                function_weights: None,
            },
            message_queue_type: "rabbitmq".to_string(),
            topic: worker.id.to_string(),
            max_retries: 3,
            min_replica_count: Some(0),
            max_replica_count: Some(10),
            metadata: BTreeMap::from([("queueName".to_string(), name)]),
            secret: Some(self.settings.mqt_secret.clone()),
            mqt_kind: Some("keda".to_string()),
            pod_spec: Some(pod_spec),
            ..Default::default()
        };
        self.resource(
            worker,
            MessageQueueTrigger {
                metadata: self.metadata(worker),
                spec,
            },
        )
    }
}
