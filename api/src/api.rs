use std::fmt::Debug;

use async_trait::async_trait;
use kube::{
    Resource,
    api::{DeleteParams, ListParams, PostParams},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{FilterParams, Result};

#[derive(Clone, Debug)]
pub struct ListPage<K> {
    pub items: Vec<K>,
    pub continue_token: Option<String>,
}

/// The subset of the Kubernetes API the controller drives for one resource kind.
#[async_trait]
pub trait ResourceApi<K>: Send + Sync {
    async fn list_page(
        &self,
        params: &FilterParams,
        continue_token: Option<String>,
    ) -> Result<ListPage<K>>;
    async fn create(&self, resource: &K) -> Result<K>;
    async fn replace(&self, name: &str, resource: &K) -> Result<K>;
    async fn delete(&self, name: &str) -> Result<()>;
}

pub struct Api<K> {
    name: String,
    inner: kube::Api<K>,
}

impl<K> Api<K> {
    pub fn new(name: String, inner: kube::Api<K>) -> Self {
        Self { name, inner }
    }

    #[inline]
    pub fn kube(&self) -> &kube::Api<K> {
        &self.inner
    }

    #[inline]
    pub fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.name.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl<K> ResourceApi<K> for Api<K>
where
    K: Resource + Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static,
{
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn list_page(
        &self,
        params: &FilterParams,
        continue_token: Option<String>,
    ) -> Result<ListPage<K>> {
        let mut list_params = ListParams::from(params);
        list_params.continue_token = continue_token;
        let list = self.inner.list(&list_params).await?;
        Ok(ListPage {
            items: list.items,
            continue_token: list.metadata.continue_.filter(|token| !token.is_empty()),
        })
    }

    #[tracing::instrument(level = "debug", skip(self, resource), err)]
    async fn create(&self, resource: &K) -> Result<K> {
        Ok(self.inner.create(&self.post_params(), resource).await?)
    }

    #[tracing::instrument(level = "debug", skip(self, resource), err)]
    async fn replace(&self, name: &str, resource: &K) -> Result<K> {
        Ok(self
            .inner
            .replace(name, &self.post_params(), resource)
            .await?)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}
