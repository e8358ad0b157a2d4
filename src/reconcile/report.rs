//! What a run decided and what actually happened to the registry.

use log::{error, info};
use serde::Serialize;

use super::plan::RemovalReason;
use crate::types::{Backend, BackendAttributes, BackendId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    New,
    Unchanged,
    Removed(RemovalReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "error")]
pub enum Outcome {
    Applied,
    Failed(String),
    /// An earlier mutation aborted the run.
    NotAttempted,
    /// Dry run.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub id: BackendId,
    pub classification: Classification,
    pub backend: BackendAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl ReportEntry {
    pub fn new(backend: &Backend, classification: Classification) -> Self {
        Self {
            id: backend.id.clone(),
            classification,
            backend: backend.attributes.clone(),
            outcome: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub new: Vec<ReportEntry>,
    pub removed: Vec<ReportEntry>,
    pub unchanged: Vec<ReportEntry>,
    /// The error that stopped the apply phase, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl Report {
    /// True when every scheduled mutation went through (or was skipped on
    /// purpose in a dry run).
    pub fn succeeded(&self) -> bool {
        self.aborted.is_none()
            && self
                .new
                .iter()
                .chain(&self.removed)
                .all(|entry| matches!(entry.outcome, Some(Outcome::Applied | Outcome::Skipped)))
    }

    pub fn log(&self) {
        log_section("New backends", &self.new);
        log_section("Removed backends", &self.removed);
        log_section("Unchanged backends", &self.unchanged);
        match &self.aborted {
            Some(reason) => error!("Reconciliation aborted: {}", reason),
            None => info!(
                "Reconciliation finished: {} new, {} removed, {} unchanged",
                self.new.len(),
                self.removed.len(),
                self.unchanged.len()
            ),
        }
    }
}

fn log_section(title: &str, entries: &[ReportEntry]) {
    info!("{} ({})", title, entries.len());
    for entry in entries {
        let reason = match entry.classification {
            Classification::Removed(reason) => format!(" reason={:?}", reason),
            _ => String::new(),
        };
        let outcome = match &entry.outcome {
            Some(outcome) => format!(" outcome={:?}", outcome),
            None => String::new(),
        };
        info!(
            "  {} {}/{} ip={} ports={:?} env={} healthcheck={}{}{}",
            entry.id,
            entry.backend.service,
            entry.backend.version,
            entry.backend.host_ip,
            entry.backend.ports,
            entry.backend.env,
            entry.backend.healthcheck,
            reason,
            outcome
        );
    }
}
