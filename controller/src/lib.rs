pub mod backend;
mod config;
pub mod controllers;
pub mod diff;
mod driver;
mod error;
mod reconciler;
pub mod resource;
#[cfg(test)]
mod testing;
mod wandering;
pub mod work;

pub use backend::{Backend, Scope, Snapshot};
pub use config::{BackendKind, Config, DockerConfig, FissionConfig};
pub use controllers::docker::{DockerBackend, DockerSettings};
pub use controllers::fission::{FissionBackend, FissionSettings};
pub use driver::{Schedule, run};
pub use error::{
    Action, ApplyError, ApplyErrors, BackendError, ReconcileError, SettingsError,
};
pub use reconciler::Reconciler;
