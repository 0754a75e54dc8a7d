use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};
use userworkers::kube::Resource;
use userworkers::kube::api::ObjectMeta;
use userworkers::{
    ContainerRecord, Function, LabelError, MessageQueueTrigger, ObjectMetaExt, Package,
    WorkerLabels,
};
use uuid::Uuid;

/// A backend object tied to the worker it was derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerResource<T> {
    pub id: Uuid,
    pub revision: u64,
    pub resource: T,
}

impl<T> WorkerResource<T>
where
    T: ManagedResource,
{
    /// Reads the worker id and revision back from the object's labels.
    pub fn from_labelled(resource: T) -> Result<Self, LabelError> {
        let labels = WorkerLabels::parse(resource.labels())?;
        Ok(Self {
            id: labels.worker_id,
            revision: labels.revision,
            resource,
        })
    }
}

/// An object kind the controller creates, compares and deletes.
pub trait ManagedResource: Clone + Send + Sync + 'static {
    const KIND: &'static str;
    /// Paths of the comparable document written only by the controller. Under
    /// these, values the desired document leaves out are drift as well.
    const OWNED_PATHS: &'static [&'static str] = &[];

    /// Identity the backend addresses the object by.
    fn key(&self) -> String;

    fn labels(&self) -> &BTreeMap<String, String>;

    /// The document compared field by field against the other side.
    fn comparable(&self) -> serde_json::Result<Value>;

    /// `self` is the current object; the result keeps its identity and takes
    /// the desired labels and spec.
    fn overlay(&self, desired: &Self) -> Self;

    /// Reason the object must be recreated regardless of its fields.
    fn health(&self) -> Option<String> {
        None
    }

    /// Strips everything the backend assigns so the object can be created anew.
    fn prepare_create(&self) -> Self;
}

fn metadata_document<T: Serialize>(meta: &ObjectMeta, spec: &T) -> serde_json::Result<Value> {
    Ok(json!({
        "metadata": {
            "name": meta.name,
            "namespace": meta.namespace,
            "labels": meta.labels,
        },
        "spec": serde_json::to_value(spec)?,
    }))
}

fn overlay_metadata(current: &ObjectMeta, desired: &ObjectMeta) -> ObjectMeta {
    let mut meta = current.clone();
    meta.labels = desired.labels.clone();
    if let Some(annotations) = desired.annotations.as_ref() {
        meta.annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(annotations.clone());
    }
    meta
}

fn empty_labels() -> &'static BTreeMap<String, String> {
    static EMPTY: BTreeMap<String, String> = BTreeMap::new();
    &EMPTY
}

fn kube_labels<K: Resource>(resource: &K) -> &BTreeMap<String, String> {
    resource.meta().labels.as_ref().unwrap_or_else(|| empty_labels())
}

fn kube_key<K: Resource>(resource: &K) -> String {
    resource.meta().name.clone().unwrap_or_default()
}

impl ManagedResource for Function {
    const KIND: &'static str = "Function";
    const OWNED_PATHS: &'static [&'static str] = &["metadata.labels", "spec"];

    fn key(&self) -> String {
        kube_key(self)
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        kube_labels(self)
    }

    fn comparable(&self) -> serde_json::Result<Value> {
        metadata_document(&self.metadata, &self.spec)
    }

    fn overlay(&self, desired: &Self) -> Self {
        let mut function = self.clone();
        function.metadata = overlay_metadata(&self.metadata, &desired.metadata);
        function.spec = desired.spec.clone();
        function
    }

    fn prepare_create(&self) -> Self {
        let mut function = self.clone();
        function.metadata = self.metadata.strip_identity();
        function
    }
}

impl ManagedResource for Package {
    const KIND: &'static str = "Package";
    // The builder fills in `spec.deployment`.
    const OWNED_PATHS: &'static [&'static str] =
        &["metadata.labels", "spec.environment", "spec.source"];

    fn key(&self) -> String {
        kube_key(self)
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        kube_labels(self)
    }

    fn comparable(&self) -> serde_json::Result<Value> {
        metadata_document(&self.metadata, &self.spec)
    }

    fn overlay(&self, desired: &Self) -> Self {
        let mut package = self.clone();
        package.metadata = overlay_metadata(&self.metadata, &desired.metadata);
        package.spec = desired.spec.clone();
        package.status = desired.status.clone();
        package
    }

    fn prepare_create(&self) -> Self {
        let mut package = self.clone();
        package.metadata = self.metadata.strip_identity();
        package
    }
}

impl ManagedResource for MessageQueueTrigger {
    const KIND: &'static str = "MessageQueueTrigger";
    const OWNED_PATHS: &'static [&'static str] = &["metadata.labels", "spec"];

    fn key(&self) -> String {
        kube_key(self)
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        kube_labels(self)
    }

    fn comparable(&self) -> serde_json::Result<Value> {
        metadata_document(&self.metadata, &self.spec)
    }

    fn overlay(&self, desired: &Self) -> Self {
        let mut trigger = self.clone();
        trigger.metadata = overlay_metadata(&self.metadata, &desired.metadata);
        trigger.spec = desired.spec.clone();
        trigger
    }

    fn prepare_create(&self) -> Self {
        let mut trigger = self.clone();
        trigger.metadata = self.metadata.strip_identity();
        trigger
    }
}

const HEALTHY_CONTAINER_STATES: [&str; 2] = ["running", "restarting"];

impl ManagedResource for ContainerRecord {
    const KIND: &'static str = "Container";

    /// Containers not yet created are addressed by name.
    fn key(&self) -> String {
        if self.id.is_empty() {
            self.spec.name.clone()
        } else {
            self.id.clone()
        }
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.spec.labels
    }

    // Network attachments are reported under the daemon's own network name,
    // so they are set on create only.
    fn comparable(&self) -> serde_json::Result<Value> {
        Ok(json!({
            "name": self.spec.name,
            "image": self.spec.image,
            "env": self.spec.env,
            "labels": self.spec.labels,
            "tty": self.spec.tty,
        }))
    }

    fn overlay(&self, desired: &Self) -> Self {
        ContainerRecord {
            id: self.id.clone(),
            spec: desired.spec.clone(),
            state: None,
        }
    }

    fn health(&self) -> Option<String> {
        match self.state.as_deref() {
            Some(state) if HEALTHY_CONTAINER_STATES.contains(&state) => None,
            state => Some(format!("state: {}", state.unwrap_or("unknown"))),
        }
    }

    fn prepare_create(&self) -> Self {
        ContainerRecord {
            id: String::new(),
            spec: self.spec.clone(),
            state: None,
        }
    }
}
