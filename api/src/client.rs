use std::fmt::Debug;
use std::sync::Arc;

use hyper_util::{client::legacy::Client as HttpClient, rt::TokioExecutor};
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use kube::client::ConfigExt as _;
use serde::{Serialize, de::DeserializeOwned};
use tower::ServiceBuilder;
use tower_http::{BoxError, trace::TraceLayer};

use crate::{Api, ClientBuildError, ResourceApi};

#[derive(Clone)]
pub struct Client {
    name: String,
    kube: kube::Client,
}

#[derive(Default)]
pub struct ClientBuilder {
    name: Option<String>,
    namespace: Option<String>,
    config: Option<kube::Config>,
}

impl ClientBuilder {
    pub fn name(&mut self, name: impl ToString) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn namespace(&mut self, namespace: impl ToString) -> &mut Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn config(&mut self, config: kube::Config) -> &mut Self {
        self.config = Some(config);
        self
    }

    pub async fn build(&mut self) -> Result<Client, ClientBuildError> {
        let name = self.name.take().unwrap_or_else(|| "userworkers".into());
        let config = if let Some(config) = self.config.take() {
            config
        } else {
            kube::Config::infer().await?
        };
        let kube_service = ServiceBuilder::new()
            .layer(config.base_uri_layer())
            .option_layer(config.auth_layer()?)
            .layer(TraceLayer::new_for_http())
            .map_err(BoxError::from)
            .service(
                HttpClient::builder(TokioExecutor::new()).build(config.rustls_https_connector()?),
            );
        let kube_client = kube::Client::new(
            kube_service,
            self.namespace.take().unwrap_or(config.default_namespace),
        );
        Ok(Client {
            name,
            kube: kube_client,
        })
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn default_namespace(&self) -> &str {
        self.kube.default_namespace()
    }

    #[inline]
    pub fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::new(
            self.name.clone(),
            kube::Api::default_namespaced(self.kube.clone()),
        )
    }

    pub fn resource_api<K>(&self) -> Arc<dyn ResourceApi<K>>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Serialize
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + Sync
            + 'static,
        <K as Resource>::DynamicType: Default,
    {
        Arc::new(self.api::<K>())
    }
}
