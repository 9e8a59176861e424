//! Pipeline coordinator.
//!
//! # Design
//! - Discovers shard folders once, wires the five stages together with
//!   bounded queues, feeds the first queue, and joins every worker.
//! - Queues are created here and moved into the workers; nothing is global.
//! - The coordinator never touches shard files itself.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use pdbsift_config::{PipelineConfig, validate};
use pdbsift_telemetry::Metrics;
use tokio::task::JoinHandle;
use tracing::{error, info};
use walkdir::WalkDir;

use crate::error::{PipelineError, PipelineResult};
use crate::model::{Folder, StageKind};
use crate::queue::{QueueSender, stage_queue};
use crate::report::{RunReport, StageReport};
use crate::stages::{
    CleanupStage, DecompressStage, Outbound, ReclaimStage, RelocateStage, ValidateStage,
    spawn_stage,
};

/// Runs the shard pipeline for one configuration.
#[derive(Clone)]
pub struct Coordinator {
    config: PipelineConfig,
    metrics: Metrics,
}

impl Coordinator {
    /// Build a coordinator for an already validated configuration.
    #[must_use]
    pub const fn new(config: PipelineConfig, metrics: Metrics) -> Self {
        Self { config, metrics }
    }

    /// Validate `config` and build a coordinator for it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when validation fails.
    pub fn from_config(config: PipelineConfig, metrics: Metrics) -> PipelineResult<Self> {
        validate(&config)?;
        Ok(Self::new(config, metrics))
    }

    /// Immediate subdirectories of `root`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Walkdir`] if the root cannot be listed.
    pub fn discover_folders(root: &Path) -> PipelineResult<Vec<Folder>> {
        let mut folders = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry
                .map_err(|source| PipelineError::walkdir("coordinator.discover", root, source))?;
            if entry.file_type().is_dir() {
                folders.push(Folder::new(entry.into_path()));
            }
        }
        Ok(folders)
    }

    /// Process every shard folder under the root and wait for all stages to drain.
    ///
    /// File- and folder-level problems are logged and recorded in the returned
    /// report; a worker that panics is listed in
    /// [`RunReport::aborted_stages`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the root cannot be listed.
    pub async fn run(&self) -> PipelineResult<RunReport> {
        let started = Instant::now();
        let started_at = Utc::now();
        let folders = Self::discover_folders(&self.config.root)?;
        let folders_discovered = folders.len();
        info!(
            root = %self.config.root.display(),
            output = %self.config.output_dir.display(),
            folders = folders_discovered,
            "starting pipeline"
        );

        let (feed, workers) = self.spawn_workers();
        let folders_enqueued = feed_folders(feed, folders).await;

        let mut stages: Vec<StageReport> = Vec::with_capacity(workers.len());
        let mut aborted_stages = Vec::new();
        for (kind, handle) in workers {
            match handle.await {
                Ok(report) => stages.push(report),
                Err(err) => {
                    error!(stage = kind.as_str(), error = %err, "stage worker aborted");
                    aborted_stages.push(kind);
                }
            }
        }

        let elapsed = started.elapsed();
        self.metrics.observe_run_duration(elapsed);
        let report = RunReport {
            root: self.config.root.clone(),
            output_dir: self.config.output_dir.clone(),
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            folders_discovered,
            folders_enqueued,
            stages,
            aborted_stages,
        };
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            reclaimed = report.reclaimed(),
            failed_folders = report.failed_folders().len(),
            "pipeline finished"
        );
        Ok(report)
    }

    fn spawn_workers(
        &self,
    ) -> (
        QueueSender<Folder>,
        Vec<(StageKind, JoinHandle<StageReport>)>,
    ) {
        let capacity = self.config.queue_capacity;
        let suffix = &self.config.compressed_suffix;
        let (feed, decompress_rx) = stage_queue(StageKind::Decompress.inbound_queue(), capacity);
        let (validate_tx, validate_rx) = stage_queue(StageKind::Validate.inbound_queue(), capacity);
        let (cleanup_tx, cleanup_rx) = stage_queue(StageKind::Cleanup.inbound_queue(), capacity);
        let (relocate_tx, relocate_rx) = stage_queue(StageKind::Relocate.inbound_queue(), capacity);
        let (reclaim_tx, reclaim_rx) = stage_queue(StageKind::Reclaim.inbound_queue(), capacity);

        let workers = vec![
            (
                StageKind::Decompress,
                spawn_stage(
                    DecompressStage::new(suffix.as_str()),
                    decompress_rx,
                    Outbound::Queue(validate_tx),
                    self.metrics.clone(),
                ),
            ),
            (
                StageKind::Validate,
                spawn_stage(
                    ValidateStage::new(suffix.as_str()),
                    validate_rx,
                    Outbound::Queue(cleanup_tx),
                    self.metrics.clone(),
                ),
            ),
            (
                StageKind::Cleanup,
                spawn_stage(
                    CleanupStage::new(suffix.as_str()),
                    cleanup_rx,
                    Outbound::Queue(relocate_tx),
                    self.metrics.clone(),
                ),
            ),
            (
                StageKind::Relocate,
                spawn_stage(
                    RelocateStage::new(&self.config.output_dir),
                    relocate_rx,
                    Outbound::Queue(reclaim_tx),
                    self.metrics.clone(),
                ),
            ),
            (
                StageKind::Reclaim,
                spawn_stage(
                    ReclaimStage,
                    reclaim_rx,
                    Outbound::Terminal,
                    self.metrics.clone(),
                ),
            ),
        ];
        (feed, workers)
    }
}

/// Push every folder followed by the terminal marker; returns how many were accepted.
async fn feed_folders(feed: QueueSender<Folder>, folders: Vec<Folder>) -> usize {
    let mut enqueued = 0;
    for folder in folders {
        let path = folder.path().to_path_buf();
        if let Err(err) = feed.send(folder).await {
            error!(
                folder = %path.display(),
                queue = feed.name(),
                error = %err.detail(),
                "first stage stopped accepting folders"
            );
            return enqueued;
        }
        enqueued += 1;
    }
    if let Err(err) = feed.close().await {
        error!(error = %err.detail(), "could not send terminal marker");
    }
    enqueued
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pdbsift_test_support::fixtures::ShardTree;
    use std::fs;

    #[test]
    fn discovery_lists_directories_in_name_order() -> Result<()> {
        let tree = ShardTree::new()?;
        for name in ["c", "a", "b"] {
            tree.shard(name)?;
        }
        fs::write(tree.root().join("README"), b"not a shard")?;

        let folders = Coordinator::discover_folders(tree.root())?;
        let names: Vec<_> = folders
            .iter()
            .filter_map(|folder| folder.path().file_name()?.to_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        Ok(())
    }

    #[test]
    fn from_config_rejects_output_inside_root() -> Result<()> {
        let tree = ShardTree::new()?;
        let config = PipelineConfig::new(tree.root(), tree.root().join("processed"));
        let result = Coordinator::from_config(config, Metrics::new()?);
        assert!(matches!(result, Err(PipelineError::Config { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn missing_root_fails_before_any_stage_starts() -> Result<()> {
        let tree = ShardTree::new()?;
        let config = PipelineConfig::new(tree.base().join("absent"), tree.output());
        let coordinator = Coordinator::new(config, Metrics::new()?);
        assert!(matches!(
            coordinator.run().await,
            Err(PipelineError::Walkdir { .. })
        ));
        Ok(())
    }
}
