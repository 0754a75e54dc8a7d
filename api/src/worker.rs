use k8s_openapi::ByteString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(
    Clone, Copy, Debug, Default, Display, EnumString, Deserialize, Serialize, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkerState {
    #[default]
    Disabled,
    Enabled,
}

#[derive(
    Clone, Copy, Debug, Default, Display, EnumString, Deserialize, Serialize, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
}

fn default_entrypoint() -> String {
    "main.main".to_string()
}

fn default_revision() -> u64 {
    1
}

/// A tenant-owned unit of code. The controller only ever reads these.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct UserWorker {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: WorkerState,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub tenant_id: i64,
    #[serde(default = "default_revision")]
    pub revision: u64,
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    pub source: ByteString,
    #[serde(skip)]
    dirty: bool,
}

impl UserWorker {
    pub fn new(tenant_id: i64, name: impl ToString, source: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            state: WorkerState::Disabled,
            language: Language::Python,
            tenant_id,
            revision: default_revision(),
            entrypoint: default_entrypoint(),
            source: ByteString(source),
            dirty: false,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.state == WorkerState::Enabled
    }

    pub fn enable(&mut self) {
        self.set_state(WorkerState::Enabled);
    }

    pub fn disable(&mut self) {
        self.set_state(WorkerState::Disabled);
    }

    fn set_state(&mut self, state: WorkerState) {
        if self.state != state {
            self.state = state;
            self.dirty = true;
        }
    }

    pub fn set_description(&mut self, description: &str) {
        let description = description.trim();
        if self.description != description {
            self.description = description.to_string();
            self.dirty = true;
        }
    }

    pub fn set_source(&mut self, source: Vec<u8>) {
        self.source = ByteString(source);
        self.dirty = true;
    }

    /// Bumps the revision once for all changes made since the last commit.
    pub fn commit(&mut self) {
        if self.dirty {
            self.revision += 1;
            self.dirty = false;
        }
    }
}
