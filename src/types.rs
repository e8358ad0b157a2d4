//! Data structures shared by the snapshot builders and the engine.
//!
//! A [`Backend`] is one running service instance as it is (or should be)
//! registered.  Its [`BackendAttributes`] are the semantic part used for
//! comparison; its [`BackendId`] is the path segment under which it lives in
//! the registry.  Values are built fresh on every run and never mutated.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::identity;

/// Environment recorded when a container does not declare one.
pub const DEFAULT_ENV: &str = "default";

/// Health-check path meaning "no health check configured".
pub const NO_HEALTHCHECK: &str = "none";

/// A container-internal port published on a host port.
///
/// Ports are kept as strings because that is how they live in the registry;
/// ordering is lexical, which only has to be deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortMapping {
    pub private: String,
    pub public: String,
}

impl PortMapping {
    pub fn new(private: impl Into<String>, public: impl Into<String>) -> Self {
        Self {
            private: private.into(),
            public: public.into(),
        }
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.private, self.public)
    }
}

/// Everything that distinguishes one backend from another.
///
/// The port set is a `BTreeSet`, so insertion order never leaks into
/// equality, hashing or the derived identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendAttributes {
    pub service: String,
    pub version: String,
    pub host_ip: String,
    pub ports: BTreeSet<PortMapping>,
    pub env: String,
    pub healthcheck: String,
}

impl BackendAttributes {
    /// Attributes with the default environment and no health check.
    pub fn new(
        service: impl Into<String>,
        version: impl Into<String>,
        host_ip: impl Into<String>,
        ports: impl IntoIterator<Item = PortMapping>,
    ) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            host_ip: host_ip.into(),
            ports: ports.into_iter().collect(),
            env: DEFAULT_ENV.to_string(),
            healthcheck: NO_HEALTHCHECK.to_string(),
        }
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    pub fn with_healthcheck(mut self, path: impl Into<String>) -> Self {
        self.healthcheck = path.into();
        self
    }
}

/// Registry path segment naming a backend inside `service/version`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One backend together with its identifier.
///
/// Equality and hashing look at the attributes only: two backends that
/// describe the same service instance are equal even when they were stored
/// under different identifiers.
#[derive(Debug, Clone, Serialize)]
pub struct Backend {
    pub id: BackendId,
    #[serde(flatten)]
    pub attributes: BackendAttributes,
}

impl Backend {
    /// A backend whose identifier is derived from its attributes.
    pub fn derived(attributes: BackendAttributes) -> Self {
        Self {
            id: identity::derive(&attributes),
            attributes,
        }
    }

    /// A backend read back from the registry, keeping the stored identifier.
    pub fn persisted(id: BackendId, attributes: BackendAttributes) -> Self {
        Self { id, attributes }
    }

    pub fn service(&self) -> &str {
        &self.attributes.service
    }

    pub fn version(&self) -> &str {
        &self.attributes.version
    }

    pub fn host_ip(&self) -> &str {
        &self.attributes.host_ip
    }
}

impl PartialEq for Backend {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
    }
}

impl Eq for Backend {}

impl Hash for Backend {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attributes.hash(state);
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ports: Vec<String> = self.attributes.ports.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "{}/{}/{} ip={} ports=[{}] env={} healthcheck={}",
            self.attributes.service,
            self.attributes.version,
            self.id,
            self.attributes.host_ip,
            ports.join(","),
            self.attributes.env,
            self.attributes.healthcheck
        )
    }
}
