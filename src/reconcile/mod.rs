//! Reconciliation engine.
//!
//! One pass reads the registry, diffs it against the desired backends and
//! applies the difference: all removals first, then all additions, one
//! mutation at a time.  The first registry failure stops the pass; every
//! mutation is reported as applied, failed or not attempted.

use std::time::Duration;

use log::{error, info, warn};

use crate::error::{bounded, Error, Result};
use crate::registry::{backend_entries, backend_key, RegistryStore};
use crate::snapshot::{BackendSnapshotReader, ObservedBackend};
use crate::types::Backend;

pub mod plan;
pub mod report;

pub use plan::{classify, Plan, RemovalReason};
pub use report::{Classification, Outcome, Report, ReportEntry};

pub struct ReconciliationEngine<S> {
    store: S,
    host_ip: String,
    prefix: String,
    io_timeout: Duration,
    dry_run: bool,
}

impl<S: RegistryStore> ReconciliationEngine<S> {
    pub fn new(
        store: S,
        host_ip: impl Into<String>,
        prefix: impl Into<String>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            store,
            host_ip: host_ip.into(),
            prefix: prefix.into(),
            io_timeout,
            dry_run: false,
        }
    }

    /// Compute and report the plan without touching the registry.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Everything currently registered under the backends prefix.
    pub async fn observe(&self) -> Result<Vec<ObservedBackend>> {
        let reader = BackendSnapshotReader::new(&self.store, &self.prefix);
        bounded(self.io_timeout, &format!("read {}", self.prefix), reader.read()).await
    }

    /// Bring the registry in line with `desired`.
    ///
    /// Fails only when the registry cannot be read; failures while applying
    /// are recorded in the returned report.
    pub async fn reconcile(&self, desired: &[Backend]) -> Result<Report> {
        let observed = self.observe().await?;
        info!(
            "Reconciling {} running backends against {} registry entries",
            desired.len(),
            observed.len()
        );

        let plan = classify(desired, &observed, &self.host_ip);
        if plan.is_converged() {
            info!("Registry already matches the running containers");
        } else if self.dry_run {
            info!(
                "Dry run: {} additions and {} removals will not be applied",
                plan.new.len(),
                plan.removed.len()
            );
        }
        Ok(self.apply(plan).await)
    }

    /// Apply a plan, stopping at the first registry error.
    pub async fn apply(&self, plan: Plan) -> Report {
        let mut report = Report {
            unchanged: plan
                .unchanged
                .iter()
                .map(|b| ReportEntry::new(b, Classification::Unchanged))
                .collect(),
            ..Default::default()
        };

        for (backend, reason) in &plan.removed {
            let mut entry = ReportEntry::new(backend, Classification::Removed(*reason));
            entry.outcome = Some(self.step(&mut report.aborted, self.remove(backend)).await);
            report.removed.push(entry);
        }
        for backend in &plan.new {
            let mut entry = ReportEntry::new(backend, Classification::New);
            entry.outcome = Some(self.step(&mut report.aborted, self.add(backend)).await);
            report.new.push(entry);
        }

        report
    }

    async fn step(
        &self,
        aborted: &mut Option<String>,
        mutation: impl std::future::Future<Output = Result<()>>,
    ) -> Outcome {
        if self.dry_run {
            return Outcome::Skipped;
        }
        if aborted.is_some() {
            return Outcome::NotAttempted;
        }
        match mutation.await {
            Ok(()) => Outcome::Applied,
            Err(e) => {
                let message = e.to_string();
                *aborted = Some(message.clone());
                Outcome::Failed(message)
            }
        }
    }

    /// Write every key of a backend's subtree.  Rewriting an existing
    /// backend leaves the same keys behind.
    pub async fn add(&self, backend: &Backend) -> Result<()> {
        let subtree = backend_key(&self.prefix, backend);
        info!("Registering {}", backend);

        let entries = backend_entries(&self.prefix, backend);
        let mut done = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            let operation = format!("write {}", key);
            if let Err(e) = bounded(self.io_timeout, &operation, self.store.write(key, value)).await {
                if done.is_empty() {
                    return Err(e);
                }
                let left = entries
                    .iter()
                    .skip(done.len())
                    .map(|(k, _)| k.clone())
                    .collect();
                return Err(partial(subtree, done, left, e));
            }
            done.push(key.clone());
        }
        Ok(())
    }

    /// Delete a backend's subtree.  Deleting an absent backend is a no-op.
    pub async fn remove(&self, backend: &Backend) -> Result<()> {
        let subtree = backend_key(&self.prefix, backend);
        info!("Deregistering {}", backend);

        bounded(
            self.io_timeout,
            &format!("delete {}", subtree),
            self.store.delete(&subtree),
        )
        .await?;

        let left = bounded(
            self.io_timeout,
            &format!("list {}", subtree),
            self.store.list_children(&subtree),
        )
        .await?;
        if !left.is_empty() {
            let left = left.into_iter().map(|k| format!("{}/{}", subtree, k)).collect();
            return Err(partial(
                subtree,
                Vec::new(),
                left,
                Error::registry("delete", "keys still present after delete"),
            ));
        }
        Ok(())
    }
}

fn partial(subtree: String, done: Vec<String>, left: Vec<String>, cause: Error) -> Error {
    error!(
        "Partial subtree at {}: done {:?}, left {:?}: {}",
        subtree, done, left, cause
    );
    warn!("The next run will find {} incomplete and repair it", subtree);
    Error::PartialSubtreeWrite {
        subtree,
        done,
        left,
        reason: cause.to_string(),
    }
}
