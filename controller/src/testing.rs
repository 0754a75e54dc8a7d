use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use userworkers::kube::Resource;
use userworkers::kube::error::ErrorResponse;
use userworkers::{
    ContainerEngine, ContainerRecord, ContainerSpec, FilterParams, ListPage, ResourceApi,
    UserWorker, WorkerState,
};

use crate::config::{Config, FissionConfig};
use crate::controllers::fission::FissionSettings;
use crate::resource::ManagedResource;

/// Calls made against every fake sharing it, in order.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

pub(crate) fn kube_error(code: u16, reason: &str, message: String) -> userworkers::Error {
    userworkers::kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    })
    .into()
}

/// An in-memory API server for one namespaced kind.
pub(crate) struct FakeApi<K> {
    objects: Mutex<BTreeMap<String, K>>,
    journal: Journal,
    failing: Mutex<BTreeSet<String>>,
    fail_list: Mutex<bool>,
    page_size: usize,
    versions: AtomicU64,
}

impl<K> FakeApi<K>
where
    K: ManagedResource + Resource,
{
    pub(crate) fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            objects: Mutex::default(),
            journal,
            failing: Mutex::default(),
            fail_list: Mutex::new(false),
            page_size: 2,
            versions: AtomicU64::new(1),
        })
    }

    /// Makes every `action` call on the object `name` fail.
    pub(crate) fn fail(&self, action: &str, name: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(format!("{action} {name}"));
    }

    pub(crate) fn fail_list(&self) {
        *self.fail_list.lock().unwrap() = true;
    }

    pub(crate) fn insert(&self, mut object: K) {
        self.stamp(&mut object);
        self.objects.lock().unwrap().insert(object.key(), object);
    }

    pub(crate) fn get(&self, name: &str) -> Option<K> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    fn stamp(&self, object: &mut K) {
        let version = self.versions.fetch_add(1, Ordering::SeqCst);
        let meta = object.meta_mut();
        meta.resource_version = Some(version.to_string());
        meta.uid.get_or_insert_with(|| format!("uid-{version}"));
    }

    fn call(&self, action: &str, name: &str) -> userworkers::Result<()> {
        self.journal.record(format!("{action} {} {name}", K::KIND));
        if self
            .failing
            .lock()
            .unwrap()
            .contains(&format!("{action} {name}"))
        {
            return Err(kube_error(500, "InternalError", format!("{action} {name} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl<K> ResourceApi<K> for FakeApi<K>
where
    K: ManagedResource + Resource,
{
    async fn list_page(
        &self,
        params: &FilterParams,
        continue_token: Option<String>,
    ) -> userworkers::Result<ListPage<K>> {
        if *self.fail_list.lock().unwrap() {
            return Err(kube_error(503, "ServiceUnavailable", "list failed".into()));
        }
        let offset = continue_token
            .map(|token| token.parse::<usize>().unwrap())
            .unwrap_or_default();
        let matching = self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|object| {
                let labels = object.labels();
                params.matches(|key| labels.get(key).map(String::as_str))
            })
            .cloned()
            .collect::<Vec<_>>();
        let next = offset + self.page_size;
        Ok(ListPage {
            items: matching.iter().skip(offset).take(self.page_size).cloned().collect(),
            continue_token: (next < matching.len()).then(|| next.to_string()),
        })
    }

    async fn create(&self, resource: &K) -> userworkers::Result<K> {
        let name = resource.key();
        self.call("create", &name)?;
        assert!(
            resource.meta().resource_version.is_none(),
            "created objects must not carry a resource version"
        );
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&name) {
            return Err(kube_error(409, "AlreadyExists", format!("{name} exists")));
        }
        let mut object = resource.clone();
        self.stamp(&mut object);
        objects.insert(name, object.clone());
        Ok(object)
    }

    async fn replace(&self, name: &str, resource: &K) -> userworkers::Result<K> {
        self.call("update", name)?;
        let mut objects = self.objects.lock().unwrap();
        let Some(existing) = objects.get(name) else {
            return Err(kube_error(404, "NotFound", format!("{name} not found")));
        };
        assert_eq!(
            existing.meta().uid,
            resource.meta().uid,
            "updates must keep the object identity"
        );
        let mut object = resource.clone();
        self.stamp(&mut object);
        objects.insert(name.to_string(), object.clone());
        Ok(object)
    }

    async fn delete(&self, name: &str) -> userworkers::Result<()> {
        self.call("delete", name)?;
        match self.objects.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(kube_error(404, "NotFound", format!("{name} not found"))),
        }
    }
}

fn docker_error(status_code: u16, message: String) -> userworkers::Error {
    bollard::errors::Error::DockerResponseServerError {
        status_code,
        message,
    }
    .into()
}

/// An in-memory Docker daemon.
#[derive(Default)]
pub(crate) struct FakeEngine {
    containers: Mutex<BTreeMap<String, ContainerRecord>>,
    journal: Journal,
    failing: Mutex<BTreeSet<String>>,
    ids: AtomicU64,
}

impl FakeEngine {
    pub(crate) fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            journal,
            ..Default::default()
        })
    }

    pub(crate) fn fail(&self, action: &str, name: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(format!("{action} {name}"));
    }

    pub(crate) fn insert(&self, spec: ContainerSpec, state: &str) -> String {
        let id = format!("c{}", self.ids.fetch_add(1, Ordering::SeqCst));
        self.containers.lock().unwrap().insert(
            id.clone(),
            ContainerRecord {
                id: id.clone(),
                spec,
                state: Some(state.to_string()),
            },
        );
        id
    }

    pub(crate) fn set_state(&self, id: &str, state: &str) {
        if let Some(container) = self.containers.lock().unwrap().get_mut(id) {
            container.state = Some(state.to_string());
        }
    }

    pub(crate) fn containers(&self) -> Vec<ContainerRecord> {
        self.containers.lock().unwrap().values().cloned().collect()
    }

    fn call(&self, action: &str, name: &str) -> userworkers::Result<()> {
        self.journal.record(format!("{action} {name}"));
        if self
            .failing
            .lock()
            .unwrap()
            .contains(&format!("{action} {name}"))
        {
            return Err(docker_error(500, format!("{action} {name} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn list_containers(
        &self,
        params: &FilterParams,
    ) -> userworkers::Result<Vec<ContainerRecord>> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .values()
            .filter(|container| {
                params.matches(|key| container.spec.labels.get(key).map(String::as_str))
            })
            .cloned()
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> userworkers::Result<String> {
        self.call("create", &spec.name)?;
        if self
            .containers
            .lock()
            .unwrap()
            .values()
            .any(|container| container.spec.name == spec.name)
        {
            return Err(docker_error(409, format!("name {} in use", spec.name)));
        }
        Ok(self.insert(spec.clone(), "created"))
    }

    async fn start_container(&self, id: &str) -> userworkers::Result<()> {
        self.call("start", id)?;
        self.set_state(id, "running");
        Ok(())
    }

    async fn remove_container(&self, id: &str, _force: bool) -> userworkers::Result<()> {
        self.call("remove", id)?;
        match self.containers.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(docker_error(404, format!("no such container {id}"))),
        }
    }
}

pub(crate) fn enabled_worker(source: &str) -> UserWorker {
    let mut worker = UserWorker::new(1, "worker", source.as_bytes().to_vec());
    worker.state = WorkerState::Enabled;
    worker
}

pub(crate) fn config() -> Config {
    Config {
        name: "userworkers".to_string(),
        backend: Default::default(),
        namespace: Some("workers".to_string()),
        resource_prefix: "worker".to_string(),
        exchange: "pipeline.messages".to_string(),
        workers_file: "workers.json".into(),
        interval_secs: 10,
        timeout_secs: 30,
        page_size: None,
        fission: FissionConfig {
            mqt_image: Some("connector:latest".to_string()),
            mqt_secret: Some("mqt-secret".to_string()),
            ..Default::default()
        },
        docker: Default::default(),
    }
}

pub(crate) fn fission_settings() -> FissionSettings {
    FissionSettings::from_config(&config(), "workers").unwrap()
}

pub(crate) struct FissionFixture {
    pub(crate) journal: Journal,
    pub(crate) functions: Arc<FakeApi<userworkers::Function>>,
    pub(crate) packages: Arc<FakeApi<userworkers::Package>>,
    pub(crate) triggers: Arc<FakeApi<userworkers::MessageQueueTrigger>>,
    pub(crate) reconciler: crate::Reconciler<crate::FissionBackend, userworkers::MemoryStore>,
}

impl FissionFixture {
    pub(crate) fn new(workers: impl IntoIterator<Item = UserWorker>) -> Self {
        let journal = Journal::default();
        let functions = FakeApi::new(journal.clone());
        let packages = FakeApi::new(journal.clone());
        let triggers = FakeApi::new(journal.clone());
        let backend = crate::FissionBackend::new(
            fission_settings(),
            functions.clone(),
            packages.clone(),
            triggers.clone(),
        );
        Self {
            journal,
            functions,
            packages,
            triggers,
            reconciler: crate::Reconciler::new(backend, userworkers::MemoryStore::new(workers)),
        }
    }

    /// Seeds the fakes with what the controller would create for `worker`.
    pub(crate) fn seed(&self, worker: &UserWorker) {
        let backend = self.reconciler.backend();
        self.functions.insert(backend.desired_function(worker).resource);
        self.packages.insert(backend.desired_package(worker).resource);
        self.triggers.insert(backend.desired_trigger(worker).resource);
    }
}

pub(crate) struct DockerFixture {
    pub(crate) journal: Journal,
    pub(crate) engine: Arc<FakeEngine>,
    pub(crate) reconciler: crate::Reconciler<crate::DockerBackend, userworkers::MemoryStore>,
}

impl DockerFixture {
    pub(crate) fn new(workers: impl IntoIterator<Item = UserWorker>) -> Self {
        let journal = Journal::default();
        let engine = FakeEngine::new(journal.clone());
        let settings = crate::DockerSettings::from_config(&config(), Some("net-1".to_string()));
        let backend = crate::DockerBackend::new(settings, engine.clone());
        Self {
            journal,
            engine,
            reconciler: crate::Reconciler::new(backend, userworkers::MemoryStore::new(workers)),
        }
    }
}
