use std::fs;

use tracing::{debug, info, warn};

use super::{Stage, compressed_files, strip_suffix};
use crate::error::PipelineResult;
use crate::model::{FileEntry, Folder, StageKind, ValidatedFolder, Verdict};
use crate::report::{FileOutcome, StageRecorder};
use crate::structure::inspect_structure;

/// Applies the structure predicate to every decompressed file and deletes the
/// ones that fail it.
#[derive(Debug, Clone)]
pub struct ValidateStage {
    suffix: String,
}

impl ValidateStage {
    /// Stage deriving decompressed names by removing `suffix`.
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Stage for ValidateStage {
    const KIND: StageKind = StageKind::Validate;
    type Input = Folder;
    type Output = ValidatedFolder;

    fn process(
        &mut self,
        unit: Folder,
        recorder: &mut StageRecorder,
    ) -> PipelineResult<ValidatedFolder> {
        let mut survivors = Vec::new();
        for original in compressed_files(unit.path(), &self.suffix)? {
            let Some(candidate) = strip_suffix(&original.path, &self.suffix) else {
                continue;
            };
            if !candidate.is_file() {
                debug!(path = %candidate.display(), "no decompressed file; skipping");
                recorder.record_file(FileOutcome::SkippedMissing);
                continue;
            }

            let (entry, reason) = judge(FileEntry::decompressed(candidate));
            match entry.verdict {
                Verdict::Valid => {
                    info!(path = %entry.path.display(), "kept (CA atom exists)");
                    recorder.record_file(FileOutcome::Kept);
                    survivors.push(entry);
                }
                Verdict::Invalid | Verdict::Unknown => remove_invalid(&entry, &reason, recorder),
            }
        }
        Ok(ValidatedFolder::new(unit, survivors))
    }
}

/// Inspect `entry` and attach its verdict, with the rejection reason for
/// invalid files.
fn judge(entry: FileEntry) -> (FileEntry, String) {
    match inspect_structure(&entry.path) {
        Ok(verdict) if verdict.is_qualified() => {
            (entry.with_verdict(Verdict::Valid), String::new())
        }
        Ok(verdict) => (
            entry.with_verdict(Verdict::Invalid),
            verdict.reason().to_string(),
        ),
        Err(err) => (entry.with_verdict(Verdict::Invalid), err.detail()),
    }
}

fn remove_invalid(entry: &FileEntry, reason: &str, recorder: &mut StageRecorder) {
    match fs::remove_file(&entry.path) {
        Ok(()) => {
            info!(path = %entry.path.display(), reason, "removed invalid structure");
            recorder.record_file(FileOutcome::RemovedInvalid);
        }
        Err(err) => {
            warn!(
                path = %entry.path.display(),
                reason,
                error = %err,
                "failed to remove invalid structure"
            );
            recorder.record_file(FileOutcome::RemoveFailed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pdbsift_telemetry::Metrics;
    use pdbsift_test_support::fixtures::{
        PDB_MALFORMED, PDB_WITH_ALPHA_CARBON, PDB_WITHOUT_ALPHA_CARBON, ShardTree, list_names,
    };

    #[test]
    fn keeps_qualified_and_deletes_the_rest() -> Result<()> {
        let tree = ShardTree::new()?;
        let shard = tree.shard("s1")?;
        for (name, body) in [
            ("1abc.pdb", PDB_WITH_ALPHA_CARBON),
            ("2def.pdb", PDB_WITHOUT_ALPHA_CARBON),
            ("3ghi.pdb", PDB_MALFORMED),
            ("4jkl.pdb", ""),
        ] {
            fs::write(shard.join(name), body)?;
            fs::write(shard.join(format!("{name}.gz")), b"original")?;
        }

        let mut recorder = StageRecorder::new(StageKind::Validate, Metrics::new()?);
        let out = ValidateStage::new(".gz").process(Folder::new(&shard), &mut recorder)?;

        assert_eq!(out.survivors.len(), 1);
        assert_eq!(out.survivors[0].path, shard.join("1abc.pdb"));
        assert_eq!(out.survivors[0].verdict, Verdict::Valid);
        assert_eq!(
            list_names(&shard)?,
            vec!["1abc.pdb", "1abc.pdb.gz", "2def.pdb.gz", "3ghi.pdb.gz", "4jkl.pdb.gz"]
        );
        assert_eq!(recorder.report().file_count(FileOutcome::Kept), 1);
        assert_eq!(recorder.report().file_count(FileOutcome::RemovedInvalid), 3);
        Ok(())
    }

    #[test]
    fn judge_marks_files_without_marker_invalid() -> Result<()> {
        let tree = ShardTree::new()?;
        let shard = tree.shard("s1")?;
        fs::write(shard.join("good.pdb"), PDB_WITH_ALPHA_CARBON)?;
        fs::write(shard.join("bad.pdb"), PDB_WITHOUT_ALPHA_CARBON)?;

        let (good, reason) = judge(FileEntry::decompressed(shard.join("good.pdb")));
        assert_eq!(good.verdict, Verdict::Valid);
        assert!(reason.is_empty());

        let (bad, reason) = judge(FileEntry::decompressed(shard.join("bad.pdb")));
        assert_eq!(bad.verdict, Verdict::Invalid);
        assert!(!reason.is_empty());
        Ok(())
    }

    #[test]
    fn undeletable_invalid_file_counts_as_remove_failed() -> Result<()> {
        let tree = ShardTree::new()?;
        let shard = tree.shard("s1")?;
        let blocker = shard.join("blocker.pdb");
        fs::create_dir(&blocker)?;

        let entry = FileEntry::decompressed(&blocker).with_verdict(Verdict::Invalid);
        let mut recorder = StageRecorder::new(StageKind::Validate, Metrics::new()?);
        remove_invalid(&entry, "no_marker", &mut recorder);

        assert!(blocker.is_dir());
        assert_eq!(recorder.report().file_count(FileOutcome::RemoveFailed), 1);
        assert_eq!(recorder.report().file_count(FileOutcome::RemovedInvalid), 0);
        assert_eq!(recorder.report().file_failures(), 1);
        Ok(())
    }

    #[test]
    fn missing_sibling_is_skipped_and_empty_survivors_still_forwarded() -> Result<()> {
        let tree = ShardTree::new()?;
        tree.add_raw("s1", "lost.pdb.gz", b"never decompressed")?;
        let shard = tree.shard("s1")?;

        let mut recorder = StageRecorder::new(StageKind::Validate, Metrics::new()?);
        let out = ValidateStage::new(".gz").process(Folder::new(&shard), &mut recorder)?;

        assert!(out.survivors.is_empty());
        assert_eq!(out.folder.path(), shard.as_path());
        assert_eq!(recorder.report().file_count(FileOutcome::SkippedMissing), 1);
        Ok(())
    }

    #[test]
    fn plain_files_without_compressed_origin_are_ignored() -> Result<()> {
        let tree = ShardTree::new()?;
        tree.add_raw("s1", "stray.pdb", PDB_WITHOUT_ALPHA_CARBON.as_bytes())?;
        let shard = tree.shard("s1")?;

        let mut recorder = StageRecorder::new(StageKind::Validate, Metrics::new()?);
        let out = ValidateStage::new(".gz").process(Folder::new(&shard), &mut recorder)?;

        assert!(out.survivors.is_empty());
        assert_eq!(list_names(&shard)?, vec!["stray.pdb"]);
        Ok(())
    }
}
