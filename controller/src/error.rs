use std::fmt;

use strum::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("error getting {kind} from backend: {source}")]
    List {
        kind: &'static str,
        #[source]
        source: userworkers::Error,
    },
    #[error("error comparing {kind}: {source}")]
    Compare {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Delete,
    Update,
    Create,
}

#[derive(Debug, Error)]
#[error("{action} {kind} {name}: {source}")]
pub struct ApplyError {
    pub action: Action,
    pub kind: &'static str,
    pub name: String,
    #[source]
    pub source: userworkers::Error,
}

/// Every failure of one apply run, in the order the calls were made.
#[derive(Debug, Default)]
pub struct ApplyErrors {
    pub errors: Vec<ApplyError>,
    pub cancelled: bool,
}

impl ApplyErrors {
    pub fn push(&mut self, error: ApplyError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ApplyErrors) {
        self.errors.extend(other.errors);
        self.cancelled |= other.cancelled;
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    pub fn into_result(self) -> Result<(), ApplyErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ApplyErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("multiple errors occurred:")?;
        for error in &self.errors {
            write!(f, "\n{error}")?;
        }
        if self.cancelled {
            f.write_str("\napply cancelled before completion")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApplyErrors {}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("error finding wandering resources: {0}")]
    Wandering(#[source] BackendError),
    #[error("error fetching which workers exist from store: {0}")]
    WorkersExist(#[source] userworkers::Error),
    #[error("error listing user workers from database: {0}")]
    ListWorkers(#[source] userworkers::Error),
    #[error("error getting current state: {0}")]
    CurrentState(#[source] BackendError),
    #[error("error calculating changes: {0}")]
    Plan(#[source] BackendError),
    #[error("error applying work: {0}")]
    Apply(#[source] ApplyErrors),
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl ReconcileError {
    pub(crate) fn wandering(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => Self::Cancelled,
            err => Self::Wandering(err),
        }
    }

    pub(crate) fn current_state(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => Self::Cancelled,
            err => Self::CurrentState(err),
        }
    }
}

impl From<ApplyErrors> for ReconcileError {
    fn from(errors: ApplyErrors) -> Self {
        if errors.errors.is_empty() && errors.cancelled {
            Self::Cancelled
        } else {
            Self::Apply(errors)
        }
    }
}
