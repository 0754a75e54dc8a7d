use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),
    #[error(transparent)]
    ClientBuildError(#[from] ClientBuildError),
    #[error("Could not read workers from {path}: {source}")]
    WorkersFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid pagination cursor: {0}")]
    InvalidCursor(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error(transparent)]
    Config(#[from] kube::config::InferConfigError),
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Kube(kube::Error::Api(response)) => response.code == 404,
            Self::Docker(bollard::errors::Error::DockerResponseServerError {
                status_code, ..
            }) => *status_code == 404,
            _ => false,
        }
    }
}
