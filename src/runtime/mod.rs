use async_trait::async_trait;

use crate::error::Result;

pub mod docker;
pub use docker::DockerRuntime;

/// A port exposed by a container. `external` is `None` for ports that are
/// not published on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub internal: u16,
    pub external: Option<u16>,
}

/// What the runtime reports about one running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    /// Container id, used for log messages only.
    pub id: String,
    pub image: String,
    pub ports: Vec<PortBinding>,
}

#[async_trait]
pub trait ContainerSource: Send + Sync {
    /// List the containers currently running on this host.
    async fn list(&self) -> Result<Vec<ContainerDescriptor>>;
}

/// Fixed container list, for tests.
#[cfg(test)]
pub struct StaticContainers(pub Vec<ContainerDescriptor>);

#[cfg(test)]
#[async_trait]
impl ContainerSource for StaticContainers {
    async fn list(&self) -> Result<Vec<ContainerDescriptor>> {
        Ok(self.0.clone())
    }
}
