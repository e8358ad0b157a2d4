//! Observed state: backends currently persisted in the registry.

use log::{debug, warn};

use crate::error::Result;
use crate::registry::{
    tree::RegistryNode, RegistryStore, RegistryTree, ENV_KEY, HEALTHCHECK_KEY, IP_KEY, PORT_DIR,
};
use crate::types::{Backend, BackendAttributes, BackendId, PortMapping, DEFAULT_ENV, NO_HEALTHCHECK};

/// A backend read back from the registry.
#[derive(Debug, Clone)]
pub struct ObservedBackend {
    pub backend: Backend,
    /// Leaf keys `add` always writes that were not found.
    pub missing: Vec<&'static str>,
}

impl ObservedBackend {
    /// An entry missing any key `add` writes was left behind by an
    /// interrupted write.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct BackendSnapshotReader<'a, S: ?Sized> {
    store: &'a S,
    prefix: &'a str,
}

impl<'a, S: RegistryStore + ?Sized> BackendSnapshotReader<'a, S> {
    pub fn new(store: &'a S, prefix: &'a str) -> Self {
        Self { store, prefix }
    }

    /// Read the whole backends subtree in one call and rebuild every entry.
    pub async fn read(&self) -> Result<Vec<ObservedBackend>> {
        let entries = self.store.read(self.prefix).await?;
        let tree = RegistryTree::from_entries(self.prefix, entries);
        Ok(backends_in(&tree))
    }
}

/// Walk service → version → identifier and rebuild one backend per leaf.
pub fn backends_in(tree: &RegistryTree) -> Vec<ObservedBackend> {
    let mut observed = Vec::new();
    for (service, versions) in tree.root().children() {
        for (version, identifiers) in versions.children() {
            for (id, node) in identifiers.children() {
                match observed_backend(service, version, id, node) {
                    Some(backend) => observed.push(backend),
                    None => warn!(
                        "Registry entry {}/{}/{} has no {} key, cannot tell which host owns it",
                        service, version, id, IP_KEY
                    ),
                }
            }
        }
    }
    observed
}

fn observed_backend(
    service: &str,
    version: &str,
    id: &str,
    node: &RegistryNode,
) -> Option<ObservedBackend> {
    let host_ip = node.child_value(IP_KEY)?;

    let mut missing = Vec::new();
    let env = node.child_value(ENV_KEY).unwrap_or_else(|| {
        missing.push(ENV_KEY);
        DEFAULT_ENV
    });
    let healthcheck = node.child_value(HEALTHCHECK_KEY).unwrap_or_else(|| {
        missing.push(HEALTHCHECK_KEY);
        NO_HEALTHCHECK
    });

    let ports: Vec<PortMapping> = node
        .child(PORT_DIR)
        .map(|dir| {
            dir.children()
                .filter_map(|(private, leaf)| {
                    leaf.value().map(|public| PortMapping::new(private, public))
                })
                .collect()
        })
        .unwrap_or_default();

    for (name, _) in node.children() {
        if ![IP_KEY, PORT_DIR, ENV_KEY, HEALTHCHECK_KEY].contains(&name) {
            debug!("Ignoring unknown key {}/{}/{}/{}", service, version, id, name);
        }
    }

    let attributes = BackendAttributes::new(service, version, host_ip, ports)
        .with_env(env)
        .with_healthcheck(healthcheck);

    Some(ObservedBackend {
        backend: Backend::persisted(BackendId::new(id), attributes),
        missing,
    })
}
