//! Desired state: backends derived from the running containers.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::runtime::{ContainerDescriptor, PortBinding};
use crate::types::{Backend, BackendAttributes, PortMapping};

/// Builds desired backends for one host.
pub struct BackendSnapshotBuilder {
    host_ip: String,
}

impl BackendSnapshotBuilder {
    pub fn new(host_ip: impl Into<String>) -> Self {
        Self {
            host_ip: host_ip.into(),
        }
    }

    /// One backend per container.  Containers whose image cannot be parsed
    /// are logged and skipped.
    pub fn build(&self, containers: &[ContainerDescriptor]) -> Vec<Backend> {
        containers
            .iter()
            .filter_map(|container| match self.backend_for(container) {
                Ok(backend) => {
                    debug!("Container {} -> {}", container.id, backend);
                    Some(backend)
                }
                Err(e) => {
                    warn!("Skipping container {}: {}", container.id, e);
                    None
                }
            })
            .collect()
    }

    pub fn backend_for(&self, container: &ContainerDescriptor) -> Result<Backend> {
        let (service, version) = parse_image_reference(&container.image)?;
        let attributes = BackendAttributes::new(
            service,
            version,
            self.host_ip.as_str(),
            filter_published_ports(&container.ports),
        );
        Ok(Backend::derived(attributes))
    }
}

/// Split an image reference into `(service, version)`.
///
/// `registry.example.com/team/foo:1.2.3` and `foo:1.2.3` both give
/// `("foo", "1.2.3")`.  A `:` before the last `/` belongs to a registry host
/// and a trailing `@digest` is ignored.  Fails with
/// [`Error::MalformedImageReference`] when there is no tag.
pub fn parse_image_reference(image: &str) -> Result<(String, String)> {
    let malformed = || Error::MalformedImageReference(image.to_string());

    // Untagged images are reported by id alone.
    if image.starts_with("sha256:") {
        return Err(malformed());
    }
    let without_digest = image.split_once('@').map_or(image, |(name, _)| name);
    let last_segment = without_digest
        .rsplit_once('/')
        .map_or(without_digest, |(_, name)| name);
    let (service, version) = last_segment.split_once(':').ok_or_else(malformed)?;

    if service.is_empty() || version.is_empty() || version.contains(':') {
        return Err(malformed());
    }
    Ok((service.to_string(), version.to_string()))
}

/// Keep only bindings published on the host, as string port pairs.
///
/// The registry holds one public port per private port.  When a private
/// port is published more than once, the lowest host port wins.
pub fn filter_published_ports(bindings: &[PortBinding]) -> Vec<PortMapping> {
    let mut published: BTreeMap<u16, u16> = BTreeMap::new();
    for binding in bindings {
        let Some(external) = binding.external else {
            continue;
        };
        match published.entry(binding.internal) {
            Entry::Vacant(slot) => {
                slot.insert(external);
            }
            Entry::Occupied(mut slot) => {
                let current = *slot.get();
                if current != external {
                    let kept = current.min(external);
                    warn!(
                        "Port {} is published on both {} and {}, registering {}",
                        binding.internal, current, external, kept
                    );
                    slot.insert(kept);
                }
            }
        }
    }
    published
        .into_iter()
        .map(|(internal, external)| PortMapping::new(internal.to_string(), external.to_string()))
        .collect()
}
