//! Error taxonomy for a reconciliation run.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Startup configuration is missing or unreadable. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A container image string lacks the `name:version` shape.
    #[error("malformed image reference '{0}', expected [namespace/]name:version")]
    MalformedImageReference(String),

    /// The container runtime could not be queried.
    #[error("container runtime unavailable: {0}")]
    ContainerRuntime(String),

    /// The registry could not be reached for a read or a write.
    #[error("registry unavailable during {operation}: {reason}")]
    RegistryUnavailable { operation: String, reason: String },

    /// An add or remove touched only part of an identifier's subtree.
    ///
    /// `done` lists the keys already written (add) or deleted (remove),
    /// `left` the keys that are still missing or still present.
    #[error("partial subtree at {subtree}: {reason} (done: {done:?}, left: {left:?})")]
    PartialSubtreeWrite {
        subtree: String,
        done: Vec<String>,
        left: Vec<String>,
        reason: String,
    },
}

impl Error {
    pub fn registry(operation: impl Into<String>, reason: impl ToString) -> Self {
        Error::RegistryUnavailable {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<bollard::errors::Error> for Error {
    fn from(e: bollard::errors::Error) -> Self {
        Error::ContainerRuntime(e.to_string())
    }
}

/// Runs `fut` for at most `limit`, mapping a stall through `on_timeout`.
pub async fn within<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce(Duration) -> Error,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}

/// Runs a registry call with an upper bound on how long it may block.
pub async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    within(limit, fut, |limit| {
        Error::registry(operation, format!("timed out after {:?}", limit))
    })
    .await
}
