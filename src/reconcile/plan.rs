//! Pure diff between desired and observed backends.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::Serialize;

use crate::identity;
use crate::snapshot::ObservedBackend;
use crate::types::{Backend, BackendAttributes, BackendId};

/// Why an observed entry is scheduled for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    /// No running container matches it any more.
    Stale,
    /// Another entry on this host has the same attributes.
    Duplicate,
    /// Left behind by an interrupted write.
    Incomplete,
}

/// The mutations a run needs, before anything is applied.
#[derive(Debug, Default, Clone)]
pub struct Plan {
    pub new: Vec<Backend>,
    pub removed: Vec<(Backend, RemovalReason)>,
    pub unchanged: Vec<Backend>,
}

impl Plan {
    pub fn is_converged(&self) -> bool {
        self.new.is_empty() && self.removed.is_empty()
    }
}

/// Diff `desired` against the entries of `observed` owned by `host_ip`.
///
/// Entries of other hosts are left alone.  Incomplete entries and every
/// member of a group of entries with identical attributes are removed; the
/// rest are matched against `desired` by attributes, not by identifier.
pub fn classify(desired: &[Backend], observed: &[ObservedBackend], host_ip: &str) -> Plan {
    let mut plan = Plan::default();

    let (local, foreign): (Vec<&ObservedBackend>, Vec<&ObservedBackend>) = observed
        .iter()
        .partition(|entry| entry.backend.host_ip() == host_ip);
    if !foreign.is_empty() {
        debug!("Ignoring {} registry entries owned by other hosts", foreign.len());
    }

    let mut complete = Vec::with_capacity(local.len());
    for entry in local {
        if entry.is_complete() {
            complete.push(&entry.backend);
        } else {
            info!("{} is missing {:?}", entry.backend, entry.missing);
            plan.removed.push((entry.backend.clone(), RemovalReason::Incomplete));
        }
    }

    let mut occurrences: HashMap<&BackendAttributes, usize> = HashMap::new();
    for backend in &complete {
        *occurrences.entry(&backend.attributes).or_default() += 1;
    }

    let mut survivors: Vec<&Backend> = Vec::with_capacity(complete.len());
    for backend in complete {
        if occurrences[&backend.attributes] > 1 {
            plan.removed.push((backend.clone(), RemovalReason::Duplicate));
        } else {
            survivors.push(backend);
        }
    }
    let by_attributes: HashMap<&BackendAttributes, &Backend> = survivors
        .iter()
        .map(|backend| (&backend.attributes, *backend))
        .collect();

    let mut scheduled: HashSet<&BackendId> = HashSet::new();
    let mut kept: HashSet<&BackendId> = HashSet::new();
    for backend in desired {
        match by_attributes.get(&backend.attributes) {
            Some(existing) => {
                if kept.insert(&existing.id) {
                    if !identity::matches(&existing.id, &existing.attributes) {
                        debug!("{} is kept under a non-derived identifier", existing);
                    }
                    plan.unchanged.push((*existing).clone());
                }
            }
            None => {
                if scheduled.insert(&backend.id) {
                    plan.new.push(backend.clone());
                }
            }
        }
    }

    let wanted: HashSet<&BackendAttributes> = desired.iter().map(|b| &b.attributes).collect();
    for backend in survivors {
        if !wanted.contains(&backend.attributes) {
            plan.removed.push((backend.clone(), RemovalReason::Stale));
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortMapping;

    const HOST: &str = "10.0.0.1";

    fn attrs(service: &str, public: &str) -> BackendAttributes {
        BackendAttributes::new(service, "2.0", HOST, [PortMapping::new("8080", public)])
    }

    fn stored(id: &str, attributes: BackendAttributes) -> ObservedBackend {
        ObservedBackend {
            backend: Backend::persisted(BackendId::new(id), attributes),
            missing: Vec::new(),
        }
    }

    fn registered(attributes: BackendAttributes) -> ObservedBackend {
        let backend = Backend::derived(attributes);
        ObservedBackend {
            backend,
            missing: Vec::new(),
        }
    }

    fn removed_ids(plan: &Plan) -> Vec<(&str, RemovalReason)> {
        plan.removed
            .iter()
            .map(|(b, reason)| (b.id.as_str(), *reason))
            .collect()
    }

    #[test]
    fn splits_new_removed_and_unchanged() {
        let desired = vec![
            Backend::derived(attrs("api", "33000")),
            Backend::derived(attrs("web", "33001")),
        ];
        let observed = vec![registered(attrs("api", "33000")), stored("old", attrs("db", "33002"))];

        let plan = classify(&desired, &observed, HOST);

        assert_eq!(plan.new, vec![Backend::derived(attrs("web", "33001"))]);
        assert_eq!(plan.unchanged, vec![Backend::derived(attrs("api", "33000"))]);
        assert_eq!(removed_ids(&plan), vec![("old", RemovalReason::Stale)]);
    }

    #[test]
    fn changed_environment_is_new_plus_stale() {
        let desired = vec![Backend::derived(attrs("api", "33000").with_env("blue"))];
        let observed = vec![registered(attrs("api", "33000"))];

        let plan = classify(&desired, &observed, HOST);

        assert_eq!(plan.new.len(), 1);
        assert_eq!(plan.new[0].attributes.env, "blue");
        assert_eq!(plan.removed.len(), 1);
        assert_eq!(plan.removed[0].0.attributes.env, "default");
        assert_eq!(plan.removed[0].1, RemovalReason::Stale);
        assert!(plan.unchanged.is_empty());
    }

    #[test]
    fn duplicates_are_all_removed_never_unchanged() {
        let desired = vec![Backend::derived(attrs("api", "33000"))];
        let observed = vec![
            stored("md5-one", attrs("api", "33000")),
            stored("md5-two", attrs("api", "33000")),
        ];

        let plan = classify(&desired, &observed, HOST);

        assert_eq!(
            removed_ids(&plan),
            vec![
                ("md5-one", RemovalReason::Duplicate),
                ("md5-two", RemovalReason::Duplicate)
            ]
        );
        assert!(plan.unchanged.is_empty());
        assert_eq!(plan.new, desired);
    }

    #[test]
    fn duplicates_are_removed_even_without_a_container() {
        let observed = vec![
            stored("a", attrs("api", "33000")),
            stored("b", attrs("api", "33000")),
        ];
        let plan = classify(&[], &observed, HOST);
        assert_eq!(plan.removed.len(), 2);
        assert!(plan.removed.iter().all(|(_, r)| *r == RemovalReason::Duplicate));
    }

    #[test]
    fn incomplete_entries_are_removed_and_rewritten() {
        let desired = vec![Backend::derived(attrs("api", "33000"))];
        let mut partial = registered(attrs("api", "33000"));
        partial.missing = vec!["env", "healthcheck"];

        let plan = classify(&desired, &[partial], HOST);

        assert_eq!(plan.removed.len(), 1);
        assert_eq!(plan.removed[0].1, RemovalReason::Incomplete);
        assert_eq!(plan.new, desired);
    }

    #[test]
    fn other_hosts_are_never_touched() {
        let mut theirs = attrs("api", "33000");
        theirs.host_ip = "10.0.0.2".into();
        let plan = classify(&[], &[registered(theirs)], HOST);
        assert!(plan.is_converged());
        assert!(plan.unchanged.is_empty());
    }

    #[test]
    fn identical_containers_schedule_one_add() {
        let desired = vec![
            Backend::derived(attrs("worker", "33000")),
            Backend::derived(attrs("worker", "33000")),
        ];
        let plan = classify(&desired, &[], HOST);
        assert_eq!(plan.new.len(), 1);

        let observed = vec![registered(attrs("worker", "33000"))];
        let plan = classify(&desired, &observed, HOST);
        assert!(plan.is_converged());
        assert_eq!(plan.unchanged.len(), 1);
    }

    #[test]
    fn legacy_identifier_with_matching_attributes_is_unchanged() {
        let desired = vec![Backend::derived(attrs("api", "33000"))];
        let observed = vec![stored("5d41402abc4b2a76b9719d911017c592", attrs("api", "33000"))];

        let plan = classify(&desired, &observed, HOST);

        assert!(plan.is_converged());
        assert_eq!(plan.unchanged[0].id.as_str(), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn port_order_does_not_create_changes() {
        let forward = BackendAttributes::new(
            "api",
            "2.0",
            HOST,
            [PortMapping::new("8080", "33000"), PortMapping::new("9090", "33001")],
        );
        let backward = BackendAttributes::new(
            "api",
            "2.0",
            HOST,
            [PortMapping::new("9090", "33001"), PortMapping::new("8080", "33000")],
        );
        let plan = classify(&[Backend::derived(forward)], &[registered(backward)], HOST);
        assert!(plan.is_converged());
    }
}
