//! Content-derived backend identifiers.
//!
//! The identifier is the hex SHA-256 of every semantic attribute.  Identical
//! attribute sets always collapse to the same identifier, no matter whether
//! they came from the container runtime or from the registry, and any
//! attribute change yields a fresh identifier.  The host address is part of
//! the digest, so two hosts never collide.

use sha2::{Digest, Sha256};

use crate::types::{BackendAttributes, BackendId};

/// Derive the registry identifier for a set of attributes.
pub fn derive(attributes: &BackendAttributes) -> BackendId {
    let mut hasher = Sha256::new();
    field(&mut hasher, &attributes.service);
    field(&mut hasher, &attributes.version);
    field(&mut hasher, &attributes.host_ip);
    // BTreeSet iterates in sorted order.
    for port in &attributes.ports {
        field(&mut hasher, &port.private);
        field(&mut hasher, &port.public);
    }
    field(&mut hasher, &attributes.env);
    field(&mut hasher, &attributes.healthcheck);
    BackendId::new(hex::encode(hasher.finalize()))
}

/// Whether `id` is what [`derive`] would produce for `attributes`.
pub fn matches(id: &BackendId, attributes: &BackendAttributes) -> bool {
    derive(attributes) == *id
}

// NUL-terminate every field so neighbouring values cannot run together.
fn field(hasher: &mut Sha256, value: &str) {
    hasher.update(value.as_bytes());
    hasher.update([0u8]);
}
