//! In-memory view of a registry subtree.
//!
//! etcd v3 has a flat keyspace; the registry layout is hierarchical.  This
//! rebuilds the hierarchy from a prefix read so the snapshot reader can walk
//! it level by level.

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryNode {
    value: Option<String>,
    children: BTreeMap<String, RegistryNode>,
}

impl RegistryNode {
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn child(&self, name: &str) -> Option<&RegistryNode> {
        self.children.get(name)
    }

    /// Value of a direct child leaf, if present.
    pub fn child_value(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(RegistryNode::value)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &RegistryNode)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    fn insert(&mut self, segments: &[&str], value: String) {
        match segments.split_first() {
            None => self.value = Some(value),
            Some((head, rest)) => self
                .children
                .entry((*head).to_string())
                .or_default()
                .insert(rest, value),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryTree {
    root: RegistryNode,
}

impl RegistryTree {
    /// Build a tree from `(key, value)` pairs read under `prefix`.
    ///
    /// Keys are made relative to `prefix`; keys outside it are dropped and
    /// empty segments (`a//b`, trailing `/`) are ignored.
    pub fn from_entries(
        prefix: &str,
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let mut root = RegistryNode::default();

        for (key, value) in entries {
            let Some(relative) = key.strip_prefix(prefix) else {
                continue;
            };
            // "backends2/x" is not under "backends".
            if !prefix.is_empty() && !relative.is_empty() && !relative.starts_with('/') {
                continue;
            }
            let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
            root.insert(&segments, value);
        }

        Self { root }
    }

    pub fn root(&self) -> &RegistryNode {
        &self.root
    }
}
