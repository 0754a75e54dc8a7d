use kube::api::ObjectMeta;

pub trait ObjectMetaExt {
    /// Drops every field the API server assigns, so the object can be posted as new.
    fn strip_identity(&self) -> Self;
}

impl ObjectMetaExt for ObjectMeta {
    fn strip_identity(&self) -> Self {
        ObjectMeta {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            generate_name: self.generate_name.clone(),
            annotations: self.annotations.clone(),
            labels: self.labels.clone(),
            finalizers: self.finalizers.clone(),
            owner_references: self.owner_references.clone(),
            ..Default::default()
        }
    }
}
