use std::fs;

use tracing::{info, warn};

use super::{Stage, compressed_files};
use crate::error::PipelineResult;
use crate::model::{FileEntry, StageKind, ValidatedFolder};
use crate::report::{FileOutcome, StageRecorder};

/// Deletes every compressed original left in a folder, whatever the
/// validation outcome was.
#[derive(Debug, Clone)]
pub struct CleanupStage {
    suffix: String,
}

impl CleanupStage {
    /// Stage removing files whose names end in `suffix`.
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Stage for CleanupStage {
    const KIND: StageKind = StageKind::Cleanup;
    type Input = ValidatedFolder;
    type Output = ValidatedFolder;

    fn process(
        &mut self,
        unit: ValidatedFolder,
        recorder: &mut StageRecorder,
    ) -> PipelineResult<ValidatedFolder> {
        for original in compressed_files(unit.folder.path(), &self.suffix)? {
            remove_compressed(&original, recorder);
        }
        Ok(unit)
    }
}

fn remove_compressed(original: &FileEntry, recorder: &mut StageRecorder) {
    match fs::remove_file(&original.path) {
        Ok(()) => {
            info!(path = %original.path.display(), "removed compressed file");
            recorder.record_file(FileOutcome::RemovedCompressed);
        }
        Err(err) => {
            warn!(
                path = %original.path.display(),
                error = %err,
                "failed to remove compressed file"
            );
            recorder.record_file(FileOutcome::RemoveFailed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Folder, Verdict};
    use anyhow::Result;
    use pdbsift_telemetry::Metrics;
    use pdbsift_test_support::fixtures::{PDB_WITH_ALPHA_CARBON, ShardTree, list_names};

    #[test]
    fn removes_all_compressed_files_and_forwards_survivors_unchanged() -> Result<()> {
        let tree = ShardTree::new()?;
        tree.add_gz("s1", "1abc.pdb.gz", PDB_WITH_ALPHA_CARBON)?;
        tree.add_gz("s1", "2def.pdb.gz", "")?;
        let shard = tree.shard("s1")?;
        fs::write(shard.join("1abc.pdb"), PDB_WITH_ALPHA_CARBON)?;

        let survivors =
            vec![FileEntry::decompressed(shard.join("1abc.pdb")).with_verdict(Verdict::Valid)];
        let unit = ValidatedFolder::new(Folder::new(&shard), survivors.clone());
        let mut recorder = StageRecorder::new(StageKind::Cleanup, Metrics::new()?);
        let out = CleanupStage::new(".gz").process(unit, &mut recorder)?;

        assert_eq!(out.survivors, survivors);
        assert_eq!(list_names(&shard)?, vec!["1abc.pdb"]);
        assert_eq!(recorder.report().file_count(FileOutcome::RemovedCompressed), 2);
        Ok(())
    }

    #[test]
    fn undeletable_original_counts_as_remove_failed() -> Result<()> {
        let tree = ShardTree::new()?;
        let shard = tree.shard("s1")?;
        let blocker = shard.join("stuck.pdb.gz");
        fs::create_dir(&blocker)?;

        let mut recorder = StageRecorder::new(StageKind::Cleanup, Metrics::new()?);
        remove_compressed(&FileEntry::compressed(&blocker), &mut recorder);

        assert!(blocker.is_dir());
        assert_eq!(recorder.report().file_count(FileOutcome::RemoveFailed), 1);
        assert_eq!(recorder.report().file_count(FileOutcome::RemovedCompressed), 0);
        assert_eq!(recorder.report().file_failures(), 1);
        Ok(())
    }

    #[test]
    fn empty_folder_is_a_no_op() -> Result<()> {
        let tree = ShardTree::new()?;
        let shard = tree.shard("empty")?;
        let mut recorder = StageRecorder::new(StageKind::Cleanup, Metrics::new()?);
        let out = CleanupStage::new(".gz")
            .process(ValidatedFolder::new(Folder::new(&shard), Vec::new()), &mut recorder)?;
        assert!(out.survivors.is_empty());
        assert!(recorder.report().files.is_empty());
        Ok(())
    }
}
