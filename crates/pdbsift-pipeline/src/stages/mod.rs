//! Pipeline stages and the worker loop that drives them.
//!
//! # Design
//! - A stage handles one work unit at a time; the shared loop owns queue
//!   traffic, ordering, and termination.
//! - A folder-level error withholds the folder from every later stage.
//! - The terminal marker is forwarded only after the inbound queue delivered
//!   it. If the upstream sender vanished instead, the outbound sender is
//!   dropped so the disconnect propagates.

mod cleanup;
mod decompress;
mod reclaim;
mod relocate;
mod validate;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use pdbsift_telemetry::Metrics;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{PipelineError, PipelineResult};
use crate::model::{FileEntry, StageKind, WorkUnit};
use crate::queue::{Delivery, QueueReceiver, QueueSender};
use crate::report::{StageRecorder, StageReport};

pub use cleanup::CleanupStage;
pub use decompress::DecompressStage;
pub use reclaim::ReclaimStage;
pub use relocate::RelocateStage;
pub use validate::ValidateStage;

/// One step of the pipeline.
pub trait Stage: Send + 'static {
    /// Stage identity used in logs, metrics, and reports.
    const KIND: StageKind;
    /// Unit pulled from the inbound queue.
    type Input: WorkUnit + Send + 'static;
    /// Unit pushed to the outbound queue.
    type Output: Send + 'static;

    /// Handle a single unit.
    ///
    /// # Errors
    ///
    /// Returns an error when the folder cannot be handed downstream; the
    /// worker loop logs it and withholds the folder.
    fn process(
        &mut self,
        unit: Self::Input,
        recorder: &mut StageRecorder,
    ) -> PipelineResult<Self::Output>;
}

/// Where a stage sends its output.
pub enum Outbound<T> {
    /// Next stage's inbound queue.
    Queue(QueueSender<T>),
    /// Last stage; output is dropped.
    Terminal,
}

impl<T> Outbound<T> {
    fn send(&self, unit: T) -> PipelineResult<()> {
        match self {
            Self::Queue(sender) => sender.send_blocking(unit),
            Self::Terminal => Ok(()),
        }
    }

    fn close(self) -> PipelineResult<()> {
        match self {
            Self::Queue(sender) => sender.close_blocking(),
            Self::Terminal => Ok(()),
        }
    }
}

/// Run `stage` on the blocking pool until its inbound queue is drained.
pub fn spawn_stage<S: Stage>(
    stage: S,
    inbound: QueueReceiver<S::Input>,
    outbound: Outbound<S::Output>,
    metrics: Metrics,
) -> JoinHandle<StageReport> {
    tokio::task::spawn_blocking(move || run_stage(stage, inbound, outbound, metrics))
}

/// Drive `stage` on the current thread until the terminal marker arrives.
///
/// Blocks; call from a dedicated thread or the blocking pool.
pub fn run_stage<S: Stage>(
    mut stage: S,
    mut inbound: QueueReceiver<S::Input>,
    outbound: Outbound<S::Output>,
    metrics: Metrics,
) -> StageReport {
    let kind = S::KIND;
    let mut recorder = StageRecorder::new(kind, metrics);
    debug!(stage = kind.as_str(), queue = inbound.name(), "stage started");

    let upstream_ended = loop {
        match inbound.recv_blocking() {
            Delivery::Unit(unit) => {
                let folder = unit.folder().path().to_path_buf();
                recorder.dequeued(&folder);
                match stage.process(unit, &mut recorder) {
                    Ok(output) => {
                        if let Err(err) = outbound.send(output) {
                            error!(
                                stage = kind.as_str(),
                                folder = %folder.display(),
                                error = %err.detail(),
                                "downstream stage disappeared; stopping"
                            );
                            recorder.failed(&folder, &err);
                            recorder.downstream_lost();
                            return recorder.finish();
                        }
                        recorder.completed();
                    }
                    Err(err) => {
                        error!(
                            stage = kind.as_str(),
                            folder = %folder.display(),
                            error = %err.detail(),
                            "folder withheld from downstream stages"
                        );
                        recorder.failed(&folder, &err);
                    }
                }
            }
            Delivery::EndOfStream => break true,
            Delivery::Disconnected => break false,
        }
    };

    if upstream_ended {
        recorder.end_of_stream();
        match outbound.close() {
            Ok(()) => recorder.forwarded_end_of_stream(),
            Err(err) => {
                warn!(
                    stage = kind.as_str(),
                    error = %err.detail(),
                    "could not forward terminal marker"
                );
                recorder.downstream_lost();
            }
        }
    } else {
        error!(
            stage = kind.as_str(),
            queue = inbound.name(),
            "inbound queue disconnected before the terminal marker"
        );
    }

    let report = recorder.finish();
    info!(
        stage = kind.as_str(),
        completed = report.completed,
        failed = report.failed.len(),
        "stage finished"
    );
    report
}

/// Compressed originals directly inside `folder` whose names end with
/// `suffix`, sorted by name.
pub(crate) fn compressed_files(folder: &Path, suffix: &str) -> PipelineResult<Vec<FileEntry>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry
            .map_err(|source| PipelineError::walkdir("stage.list_folder", folder, source))?;
        if entry.file_type().is_file() && has_suffix(entry.file_name(), suffix) {
            files.push(FileEntry::compressed(entry.into_path()));
        }
    }
    Ok(files)
}

/// Sibling path of a compressed file with the suffix removed.
pub(crate) fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(suffix)?;
    if stem.is_empty() {
        return None;
    }
    Some(path.with_file_name(stem))
}

fn has_suffix(name: &OsStr, suffix: &str) -> bool {
    name.to_str().is_some_and(|name| name.ends_with(suffix))
}
