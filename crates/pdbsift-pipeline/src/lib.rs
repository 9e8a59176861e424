//! Staged pipeline that expands, filters, and consolidates PDB shard folders.
#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Layout: `model/` (work units and messages), `queue.rs` (bounded stage
//! queues), `structure.rs` (PDB scanner), `stages/` (the five workers and
//! their shared loop), `report.rs` (accounting), `coordinator.rs`,
//! `error.rs`.

pub mod coordinator;
pub mod error;
pub mod model;
pub mod queue;
pub mod report;
pub mod stages;
pub mod structure;

pub use coordinator::Coordinator;
pub use error::{PipelineError, PipelineResult};
pub use model::{
    CompressionState, FileEntry, Folder, Message, StageKind, ValidatedFolder, Verdict, WorkUnit,
};
pub use queue::{Delivery, QueueReceiver, QueueSender, stage_queue};
pub use report::{FileOutcome, FolderFailure, RunReport, StageRecorder, StageReport};
pub use stages::{
    CleanupStage, DecompressStage, Outbound, ReclaimStage, RelocateStage, Stage, ValidateStage,
};
pub use structure::{StructureVerdict, inspect_bytes, inspect_structure};
