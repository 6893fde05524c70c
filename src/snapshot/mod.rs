//! Snapshot pipeline: periodic compilation of all contacts into one vCard
//! artifact, and the gate that decides who may download it.

pub mod artifact;
pub mod compiler;
pub mod gate;
pub mod model;
pub mod scheduler;
pub mod server;
pub mod vcard;

pub use artifact::{ArtifactStore, FileArtifactStore};
pub use compiler::{CycleOutcome, SnapshotCompiler};
pub use gate::{AccessDecision, GateInput, evaluate};
pub use model::Snapshot;
pub use scheduler::{SnapshotSchedule, spawn_snapshot_ticker};
pub use server::artifact_routes;
