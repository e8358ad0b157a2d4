use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::{ContainerSummary, Port};
use bollard::Docker;
use log::{debug, info};

use super::{ContainerDescriptor, ContainerSource, PortBinding};
use crate::error::Result;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon using default settings.
    /// This handles the unix socket on Linux and `DOCKER_HOST` overrides.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerSource for DockerRuntime {
    async fn list(&self) -> Result<Vec<ContainerDescriptor>> {
        let opts = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(opts)).await?;
        info!("Docker reports {} running containers", containers.len());

        Ok(containers.into_iter().filter_map(describe).collect())
    }
}

fn describe(summary: ContainerSummary) -> Option<ContainerDescriptor> {
    let id = summary.id.unwrap_or_default();
    let image = match summary.image {
        Some(image) if !image.is_empty() => image,
        _ => {
            debug!("Container {} has no image reference, ignoring", id);
            return None;
        }
    };
    let ports = summary
        .ports
        .unwrap_or_default()
        .iter()
        .map(binding)
        .collect();

    Some(ContainerDescriptor { id, image, ports })
}

fn binding(port: &Port) -> PortBinding {
    PortBinding {
        internal: port.private_port,
        external: port.public_port,
    }
}
