//! Registrar entry point.
//!
//! Runs one reconciliation pass between the containers running on this host
//! and the backend registrations in etcd, then exits.  Meant to be invoked
//! periodically by an external scheduler.

use std::process::ExitCode;

use anyhow::Context;
use log::{error, info};

mod config;
mod error;
mod identity;
mod reconcile;
mod registry;
mod runtime;
mod snapshot;
mod types;

use config::Config;
use error::{bounded, within, Error};
use reconcile::ReconciliationEngine;
use registry::EtcdStore;
use runtime::{ContainerSource, DockerRuntime};
use snapshot::BackendSnapshotBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    env_logger::init();

    // Load configuration; a missing host address is fatal.
    let cfg = Config::load()?;
    info!("Starting registrar with config: {:?}", cfg);

    // Desired state from the container runtime
    let runtime = DockerRuntime::connect()?;
    let containers = within(cfg.io_timeout(), runtime.list(), |limit| {
        Error::ContainerRuntime(format!("listing containers timed out after {:?}", limit))
    })
    .await?;
    let desired = BackendSnapshotBuilder::new(cfg.host_ip()).build(&containers);

    // Observed state and apply
    let store = bounded(
        cfg.io_timeout(),
        "connect",
        EtcdStore::connect(&cfg.etcd_endpoints),
    )
    .await?;
    let engine = ReconciliationEngine::new(
        store,
        cfg.host_ip(),
        cfg.backends_prefix.as_str(),
        cfg.io_timeout(),
    )
    .dry_run(cfg.dry_run);

    let report = engine
        .reconcile(&desired)
        .await
        .context("reconciliation aborted before any mutation")?;
    report.log();

    if cfg.json_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if report.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!("Not every scheduled mutation was applied");
        Ok(ExitCode::FAILURE)
    }
}
