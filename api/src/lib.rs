mod api;
mod client;
mod crd;
mod docker;
mod error;
mod filter_params;
mod label;
mod list_stream;
mod meta;
mod selector;
mod store;
mod worker;

pub use k8s_openapi;
pub use kube;

pub use api::{Api, ListPage, ResourceApi};
pub use client::{Client, ClientBuilder};
pub use crd::{
    Archive, ArchiveType, Checksum, EnvironmentReference, ExecutionStrategy, ExecutorType,
    Function, FunctionPackageRef, FunctionReference, FunctionSpec, InvokeStrategy,
    MessageQueueTrigger, MessageQueueTriggerSpec, Package, PackageRef, PackageSpec,
    PackageStatus,
};
pub use docker::{ContainerEngine, ContainerRecord, ContainerSpec, DockerEngine, NetworkAttachment};
pub use error::{ClientBuildError, Error, Result};
pub use filter_params::FilterParams;
pub use label::{LabelError, WorkerLabel, WorkerLabels, owned_by, owned_workers};
pub use list_stream::{ApiListStreamExt, ListStream};
pub use meta::ObjectMetaExt;
pub use selector::{Expr, Expression, Selector};
pub use store::{FileStore, MemoryStore, Page, Pagination, Store, WorkerFilters};
pub use worker::{Language, UserWorker, WorkerState};
