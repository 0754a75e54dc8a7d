use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::selector::{Expr, Selector};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerLabel {
    ControlledBy,
    WorkerId,
    WorkerRevision,
}

impl WorkerLabel {
    pub const fn key(self) -> &'static str {
        match self {
            Self::ControlledBy => "controlled-by",
            Self::WorkerId => "worker-id",
            Self::WorkerRevision => "worker-revision",
        }
    }
}

impl fmt::Display for WorkerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("label {0} is missing")]
    Missing(WorkerLabel),
    #[error("label {label} has invalid value {value:?}")]
    Invalid { label: WorkerLabel, value: String },
}

/// Ownership and staleness metadata carried by every managed backend object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerLabels {
    pub controlled_by: String,
    pub worker_id: Uuid,
    pub revision: u64,
}

impl WorkerLabels {
    pub fn new(controlled_by: impl ToString, worker_id: Uuid, revision: u64) -> Self {
        Self {
            controlled_by: controlled_by.to_string(),
            worker_id,
            revision,
        }
    }

    pub fn to_map<M>(&self) -> M
    where
        M: FromIterator<(String, String)>,
    {
        [
            (WorkerLabel::ControlledBy, self.controlled_by.clone()),
            (WorkerLabel::WorkerId, self.worker_id.to_string()),
            (WorkerLabel::WorkerRevision, self.revision.to_string()),
        ]
        .into_iter()
        .map(|(label, value)| (label.key().to_string(), value))
        .collect()
    }

    pub fn parse<'a, I>(labels: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let labels: BTreeMap<&str, &str> = labels
            .into_iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        let get = |label: WorkerLabel| {
            labels
                .get(label.key())
                .copied()
                .ok_or(LabelError::Missing(label))
        };
        let controlled_by = get(WorkerLabel::ControlledBy)?;
        let worker_id = get(WorkerLabel::WorkerId)?;
        let worker_id = Uuid::parse_str(worker_id).map_err(|_| LabelError::Invalid {
            label: WorkerLabel::WorkerId,
            value: worker_id.to_string(),
        })?;
        let revision = get(WorkerLabel::WorkerRevision)?;
        let revision = revision.parse::<u64>().map_err(|_| LabelError::Invalid {
            label: WorkerLabel::WorkerRevision,
            value: revision.to_string(),
        })?;
        Ok(Self {
            controlled_by: controlled_by.to_string(),
            worker_id,
            revision,
        })
    }
}

pub fn owned_by(controlled_by: &str) -> Selector {
    Selector::from(Expr::new(WorkerLabel::ControlledBy).eq(controlled_by))
}

pub fn owned_workers<'a>(
    controlled_by: &str,
    ids: impl IntoIterator<Item = &'a Uuid>,
) -> Selector {
    let mut selector = owned_by(controlled_by);
    selector.with(Expr::new(WorkerLabel::WorkerId).in_(ids));
    selector
}
