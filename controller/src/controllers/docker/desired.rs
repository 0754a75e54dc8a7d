use std::collections::BTreeMap;

use userworkers::{ContainerRecord, ContainerSpec, Language, UserWorker, WorkerLabels};

use crate::resource::WorkerResource;

use super::DockerBackend;

impl DockerBackend {
    pub(crate) fn container_name(&self, worker: &UserWorker) -> String {
        format!("{}-{}", self.settings.resource_prefix, worker.id)
    }

    fn container_env(&self, worker: &UserWorker) -> BTreeMap<String, String> {
        let settings = &self.settings;
        [
            ("WORKER_ID", worker.id.to_string()),
            ("AMQP_HOST", settings.amqp_host.clone()),
            ("AMQP_XCHG", settings.exchange.clone()),
            (
                "CODE_URL",
                format!("{}/{}/source", settings.workers_endpoint, worker.id),
            ),
            ("CODE_ENTRYPOINT", worker.entrypoint.clone()),
            ("ENDPOINT_DEVICES", settings.endpoint_devices.clone()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    pub(crate) fn desired_container(&self, worker: &UserWorker) -> WorkerResource<ContainerRecord> {
        let image = match worker.language {
            Language::Python => self.settings.image.clone(),
        };
        WorkerResource {
            id: worker.id,
            revision: worker.revision,
            resource: ContainerRecord {
                id: String::new(),
                spec: ContainerSpec {
                    name: self.container_name(worker),
                    image,
                    env: self.container_env(worker),
                    labels: WorkerLabels::new(
                        &self.settings.controlled_by,
                        worker.id,
                        worker.revision,
                    )
                    .to_map(),
                    network: self.settings.network.clone(),
                    tty: true,
                },
                state: None,
            },
        }
    }
}
