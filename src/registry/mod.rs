//! Registry store abstraction and the key layout backends live under.
//!
//! ```text
//! <prefix>/<service>/<version>/<identifier>/ip
//! <prefix>/<service>/<version>/<identifier>/port/<private>
//! <prefix>/<service>/<version>/<identifier>/env
//! <prefix>/<service>/<version>/<identifier>/healthcheck
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Backend;

pub mod etcd;
#[cfg(test)]
pub mod memory;
pub mod tree;

pub use etcd::EtcdStore;
pub use tree::RegistryTree;

pub const IP_KEY: &str = "ip";
pub const PORT_DIR: &str = "port";
pub const ENV_KEY: &str = "env";
pub const HEALTHCHECK_KEY: &str = "healthcheck";

/// Hierarchical key-value store holding the registrations.
///
/// Keys are `/`-separated paths.  `delete` removes a whole subtree and must
/// be a no-op when nothing lives under the prefix.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Every key/value pair under `prefix`.
    async fn read(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    async fn write(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, prefix: &str) -> Result<()>;

    /// Direct child segments under `prefix`.
    async fn list_children(&self, prefix: &str) -> Result<Vec<String>> {
        let tree = RegistryTree::from_entries(prefix, self.read(prefix).await?);
        Ok(tree.root().children().map(|(name, _)| name.to_string()).collect())
    }
}

/// Subtree key of a backend: `<prefix>/<service>/<version>/<identifier>`.
pub fn backend_key(prefix: &str, backend: &Backend) -> String {
    format!(
        "{}/{}/{}/{}",
        prefix.trim_end_matches('/'),
        backend.service(),
        backend.version(),
        backend.id.as_str()
    )
}

/// Every key/value pair `add` writes for a backend, in write order.
///
/// `ip` goes first so that a partially written entry can still be
/// attributed to its host; `env` and `healthcheck` go last so that an
/// interrupted write is always visibly incomplete.
pub fn backend_entries(prefix: &str, backend: &Backend) -> Vec<(String, String)> {
    let base = backend_key(prefix, backend);
    let attrs = &backend.attributes;

    let mut entries = Vec::with_capacity(attrs.ports.len() + 3);
    entries.push((format!("{}/{}", base, IP_KEY), attrs.host_ip.clone()));
    for port in &attrs.ports {
        entries.push((
            format!("{}/{}/{}", base, PORT_DIR, port.private),
            port.public.clone(),
        ));
    }
    entries.push((format!("{}/{}", base, ENV_KEY), attrs.env.clone()));
    entries.push((
        format!("{}/{}", base, HEALTHCHECK_KEY),
        attrs.healthcheck.clone(),
    ));
    entries
}
