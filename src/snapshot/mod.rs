//! The two snapshots a reconciliation run compares.

pub mod builder;
pub mod reader;

pub use builder::BackendSnapshotBuilder;
pub use reader::{BackendSnapshotReader, ObservedBackend};
