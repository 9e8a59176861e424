//! Per-stage and per-run accounting.
//!
//! # Design
//! - Each stage worker owns one [`StageRecorder`] and hands back the finished
//!   [`StageReport`] when it exits, so no report state is shared across threads.
//! - Every recorded outcome is mirrored into the Prometheus registry.
//! - Reports serialise to JSON for `--report`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pdbsift_telemetry::Metrics;
use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};
use crate::model::StageKind;

/// What happened to a single file inside a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    /// Compressed file expanded next to its original.
    Decompressed,
    /// Compressed file could not be expanded and was skipped.
    DecompressFailed,
    /// Decompressed file passed the structure predicate.
    Kept,
    /// Decompressed file failed the predicate and was deleted.
    RemovedInvalid,
    /// No decompressed sibling existed for a compressed file.
    SkippedMissing,
    /// Compressed original deleted.
    RemovedCompressed,
    /// A file that should have been deleted could not be.
    RemoveFailed,
    /// Survivor moved into the output directory.
    Moved,
    /// A move replaced an existing file of the same name.
    Overwrote,
    /// Survivor could not be moved.
    MoveFailed,
}

impl FileOutcome {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decompressed => "decompressed",
            Self::DecompressFailed => "decompress_failed",
            Self::Kept => "kept",
            Self::RemovedInvalid => "removed_invalid",
            Self::SkippedMissing => "skipped_missing",
            Self::RemovedCompressed => "removed_compressed",
            Self::RemoveFailed => "remove_failed",
            Self::Moved => "moved",
            Self::Overwrote => "overwrote",
            Self::MoveFailed => "move_failed",
        }
    }

    /// Whether the outcome represents an error that was logged and absorbed.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::DecompressFailed | Self::RemoveFailed | Self::MoveFailed
        )
    }
}

/// A folder a stage could not finish; it was not forwarded downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderFailure {
    /// Stage that gave up on the folder.
    pub stage: StageKind,
    /// Folder path.
    pub folder: PathBuf,
    /// Rendered error chain.
    pub detail: String,
}

/// Accounting for one stage worker.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    /// Stage this report belongs to.
    pub stage: StageKind,
    /// Folders in the order they were pulled from the inbound queue.
    pub dequeued: Vec<PathBuf>,
    /// Folders processed to completion.
    pub completed: u64,
    /// Folders withheld from downstream stages.
    pub failed: Vec<FolderFailure>,
    /// Per-file outcome counters.
    pub files: BTreeMap<FileOutcome, u64>,
    /// Whether the inbound terminal marker was observed.
    pub end_of_stream: bool,
    /// Whether the terminal marker was forwarded downstream.
    pub forwarded_end_of_stream: bool,
    /// Whether the downstream queue disappeared while the stage was running.
    pub downstream_lost: bool,
}

impl StageReport {
    /// Empty report for `stage`.
    #[must_use]
    pub const fn new(stage: StageKind) -> Self {
        Self {
            stage,
            dequeued: Vec::new(),
            completed: 0,
            failed: Vec::new(),
            files: BTreeMap::new(),
            end_of_stream: false,
            forwarded_end_of_stream: false,
            downstream_lost: false,
        }
    }

    /// Counter value for a file outcome.
    #[must_use]
    pub fn file_count(&self, outcome: FileOutcome) -> u64 {
        self.files.get(&outcome).copied().unwrap_or(0)
    }

    /// Number of absorbed file-level failures.
    #[must_use]
    pub fn file_failures(&self) -> u64 {
        self.files
            .iter()
            .filter(|(outcome, _)| outcome.is_failure())
            .map(|(_, count)| *count)
            .sum()
    }

    /// Whether the stage drained its queue and shut down through the marker.
    #[must_use]
    pub const fn drained_cleanly(&self) -> bool {
        self.end_of_stream && !self.downstream_lost
    }
}

/// Mutable handle stages use to record outcomes while they run.
pub struct StageRecorder {
    report: StageReport,
    metrics: Metrics,
}

impl StageRecorder {
    /// Start recording for `stage`.
    #[must_use]
    pub const fn new(stage: StageKind, metrics: Metrics) -> Self {
        Self {
            report: StageReport::new(stage),
            metrics,
        }
    }

    /// Stage being recorded.
    #[must_use]
    pub const fn stage(&self) -> StageKind {
        self.report.stage
    }

    /// Count a file outcome.
    pub fn record_file(&mut self, outcome: FileOutcome) {
        *self.report.files.entry(outcome).or_insert(0) += 1;
        self.metrics.inc_file(self.stage().as_str(), outcome.as_str());
    }

    /// Report accumulated so far.
    #[must_use]
    pub const fn report(&self) -> &StageReport {
        &self.report
    }

    pub(crate) fn dequeued(&mut self, folder: &Path) {
        self.report.dequeued.push(folder.to_path_buf());
    }

    pub(crate) fn completed(&mut self) {
        self.report.completed += 1;
        self.metrics.inc_unit(self.stage().as_str(), "completed");
    }

    pub(crate) fn failed(&mut self, folder: &Path, error: &PipelineError) {
        self.report.failed.push(FolderFailure {
            stage: self.stage(),
            folder: folder.to_path_buf(),
            detail: error.detail(),
        });
        self.metrics.inc_unit(self.stage().as_str(), "failed");
    }

    pub(crate) const fn end_of_stream(&mut self) {
        self.report.end_of_stream = true;
    }

    pub(crate) const fn forwarded_end_of_stream(&mut self) {
        self.report.forwarded_end_of_stream = true;
    }

    pub(crate) const fn downstream_lost(&mut self) {
        self.report.downstream_lost = true;
    }

    pub(crate) fn finish(self) -> StageReport {
        self.report
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Directory whose subdirectories were processed.
    pub root: PathBuf,
    /// Consolidated output directory.
    pub output_dir: PathBuf,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Shard folders found under the root.
    pub folders_discovered: usize,
    /// Shard folders accepted by the first queue.
    pub folders_enqueued: usize,
    /// Reports of the stages that exited normally, upstream first.
    pub stages: Vec<StageReport>,
    /// Stages whose worker panicked or was cancelled.
    pub aborted_stages: Vec<StageKind>,
}

impl RunReport {
    /// Report for `stage`, if its worker exited normally.
    #[must_use]
    pub fn stage(&self, stage: StageKind) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    /// Folders withheld by any stage.
    #[must_use]
    pub fn failed_folders(&self) -> Vec<&FolderFailure> {
        self.stages
            .iter()
            .flat_map(|report| report.failed.iter())
            .collect()
    }

    /// Folders removed by the reclamation stage.
    #[must_use]
    pub fn reclaimed(&self) -> u64 {
        self.stage(StageKind::Reclaim)
            .map_or(0, |report| report.completed)
    }

    /// Counter value for a file outcome summed over every stage.
    #[must_use]
    pub fn file_count(&self, outcome: FileOutcome) -> u64 {
        self.stages
            .iter()
            .map(|report| report.file_count(outcome))
            .sum()
    }

    /// Whether every stage exited through the terminal marker.
    #[must_use]
    pub fn completed_cleanly(&self) -> bool {
        self.aborted_stages.is_empty()
            && self.stages.len() == StageKind::ALL.len()
            && self.stages.iter().all(StageReport::drained_cleanly)
            && self.folders_enqueued == self.folders_discovered
    }

    /// Whether any file- or folder-level failure was absorbed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.stages
            .iter()
            .any(|report| !report.failed.is_empty() || report.file_failures() > 0)
    }

    /// Persist the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the write fails.
    pub fn write_json(&self, path: &Path) -> PipelineResult<()> {
        let rendered = serde_json::to_vec_pretty(self)
            .map_err(|source| PipelineError::json("report.serialize", path, source))?;
        fs::write(path, rendered).map_err(|source| PipelineError::io("report.write", path, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io;

    fn sample_run(stages: Vec<StageReport>) -> RunReport {
        let now = Utc::now();
        RunReport {
            root: PathBuf::from("pdb"),
            output_dir: PathBuf::from("processed"),
            started_at: now,
            finished_at: now,
            elapsed_ms: 5,
            folders_discovered: 1,
            folders_enqueued: 1,
            stages,
            aborted_stages: Vec::new(),
        }
    }

    fn drained(stage: StageKind) -> StageReport {
        let mut report = StageReport::new(stage);
        report.end_of_stream = true;
        report.forwarded_end_of_stream = true;
        report
    }

    #[test]
    fn recorder_mirrors_outcomes_into_metrics() -> Result<()> {
        let metrics = Metrics::new()?;
        let mut recorder = StageRecorder::new(StageKind::Validate, metrics.clone());
        recorder.dequeued(Path::new("pdb/a"));
        recorder.record_file(FileOutcome::Kept);
        recorder.record_file(FileOutcome::RemovedInvalid);
        recorder.record_file(FileOutcome::Kept);
        recorder.completed();
        recorder.dequeued(Path::new("pdb/b"));
        recorder.failed(
            Path::new("pdb/b"),
            &PipelineError::io("list", "pdb/b", io::Error::other("denied")),
        );
        recorder.end_of_stream();

        let report = recorder.finish();
        assert_eq!(report.file_count(FileOutcome::Kept), 2);
        assert_eq!(report.file_count(FileOutcome::Moved), 0);
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(
            report.failed[0].detail,
            "pipeline io failure (operation=list, path=pdb/b): denied"
        );
        assert_eq!(
            report.dequeued,
            vec![PathBuf::from("pdb/a"), PathBuf::from("pdb/b")]
        );
        assert_eq!(metrics.file_count("validate", "kept"), 2);
        assert_eq!(metrics.snapshot().units_total, 2);
        Ok(())
    }

    #[test]
    fn run_report_flags_failures_and_incomplete_runs() {
        let clean = sample_run(StageKind::ALL.iter().copied().map(drained).collect());
        assert!(clean.completed_cleanly());
        assert!(!clean.has_failures());

        let mut stages: Vec<_> = StageKind::ALL.iter().copied().map(drained).collect();
        stages[0].files.insert(FileOutcome::DecompressFailed, 1);
        let failing = sample_run(stages);
        assert!(failing.completed_cleanly());
        assert!(failing.has_failures());
        assert_eq!(failing.file_count(FileOutcome::DecompressFailed), 1);

        let mut aborted = sample_run(vec![drained(StageKind::Decompress)]);
        aborted.aborted_stages.push(StageKind::Validate);
        assert!(!aborted.completed_cleanly());
        assert_eq!(aborted.reclaimed(), 0);
    }

    #[test]
    fn write_json_persists_stage_accounting() -> Result<()> {
        let mut reclaim = drained(StageKind::Reclaim);
        reclaim.completed = 3;
        let report = sample_run(vec![reclaim]);
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("report.json");
        report.write_json(&path)?;

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
        assert_eq!(value["stages"][0]["stage"], "reclaim");
        assert_eq!(value["stages"][0]["completed"], 3);
        assert_eq!(report.reclaimed(), 3);
        Ok(())
    }
}
