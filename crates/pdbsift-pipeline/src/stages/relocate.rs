use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::Stage;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{Folder, StageKind, ValidatedFolder};
use crate::report::{FileOutcome, StageRecorder};

/// Moves survivors into the flat output directory.
///
/// Same-named files from different folders replace each other; every
/// replacement is logged and counted.
#[derive(Debug, Clone)]
pub struct RelocateStage {
    output_dir: PathBuf,
}

impl RelocateStage {
    /// Stage moving files into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl Stage for RelocateStage {
    const KIND: StageKind = StageKind::Relocate;
    type Input = ValidatedFolder;
    type Output = Folder;

    fn process(
        &mut self,
        unit: ValidatedFolder,
        recorder: &mut StageRecorder,
    ) -> PipelineResult<Folder> {
        ensure_output_dir(&self.output_dir)?;

        let mut failed = 0;
        for survivor in &unit.survivors {
            let Some(name) = survivor.file_name() else {
                continue;
            };
            let destination = self.output_dir.join(name);
            let replaced = destination.exists();
            match move_file(&survivor.path, &destination) {
                Ok(()) => {
                    if replaced {
                        warn!(
                            path = %destination.display(),
                            source = %survivor.path.display(),
                            "replaced existing output file"
                        );
                        recorder.record_file(FileOutcome::Overwrote);
                    }
                    info!(
                        path = %survivor.path.display(),
                        destination = %destination.display(),
                        "moved"
                    );
                    recorder.record_file(FileOutcome::Moved);
                }
                Err(err) => {
                    error!(
                        path = %survivor.path.display(),
                        error = %err.detail(),
                        "failed to move survivor"
                    );
                    recorder.record_file(FileOutcome::MoveFailed);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(PipelineError::RelocationIncomplete {
                folder: unit.folder.path().to_path_buf(),
                failed,
            });
        }
        Ok(unit.folder)
    }
}

/// Create the output directory if it does not exist; safe under concurrent use.
pub(crate) fn ensure_output_dir(path: &Path) -> PipelineResult<()> {
    fs::create_dir_all(path)
        .map_err(|source| PipelineError::io("relocate.create_output", path, source))
}

/// Move a file, falling back to copy-then-remove when a rename is not possible.
pub(crate) fn move_file(source: &Path, destination: &Path) -> PipelineResult<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    fs::copy(source, destination)
        .map_err(|err| PipelineError::io("relocate.copy", destination, err))?;
    fs::remove_file(source).map_err(|err| PipelineError::io("relocate.remove_source", source, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileEntry, Verdict};
    use anyhow::Result;
    use pdbsift_telemetry::Metrics;
    use pdbsift_test_support::fixtures::{ShardTree, list_names};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn survivor(path: PathBuf) -> FileEntry {
        FileEntry::decompressed(path).with_verdict(Verdict::Valid)
    }

    #[test]
    fn moves_survivors_and_counts_overwrites() -> Result<()> {
        let tree = ShardTree::new()?;
        let a = tree.add_raw("a", "1abc.pdb", b"from a")?;
        let b = tree.add_raw("b", "1abc.pdb", b"from b")?;
        let metrics = Metrics::new()?;
        let mut stage = RelocateStage::new(tree.output());

        let mut recorder = StageRecorder::new(StageKind::Relocate, metrics.clone());
        let first =
            ValidatedFolder::new(Folder::new(tree.shard("a")?), vec![survivor(a.clone())]);
        let out = stage.process(first, &mut recorder)?;
        assert_eq!(out.path(), tree.shard("a")?.as_path());

        let second = ValidatedFolder::new(Folder::new(tree.shard("b")?), vec![survivor(b)]);
        stage.process(second, &mut recorder)?;

        assert_eq!(tree.output_names()?, vec!["1abc.pdb"]);
        assert_eq!(fs::read(tree.output().join("1abc.pdb"))?, b"from b");
        assert!(!a.exists());
        assert_eq!(recorder.report().file_count(FileOutcome::Moved), 2);
        assert_eq!(recorder.report().file_count(FileOutcome::Overwrote), 1);
        assert_eq!(metrics.file_count("relocate", "overwrote"), 1);
        Ok(())
    }

    #[test]
    fn missing_survivor_withholds_the_folder() -> Result<()> {
        let tree = ShardTree::new()?;
        let shard = tree.shard("a")?;
        let kept = tree.add_raw("a", "keep.pdb", b"ok")?;
        let unit = ValidatedFolder::new(
            Folder::new(&shard),
            vec![survivor(shard.join("vanished.pdb")), survivor(kept)],
        );

        let mut recorder = StageRecorder::new(StageKind::Relocate, Metrics::new()?);
        let result = RelocateStage::new(tree.output()).process(unit, &mut recorder);

        assert!(matches!(
            result,
            Err(PipelineError::RelocationIncomplete { failed: 1, .. })
        ));
        assert_eq!(tree.output_names()?, vec!["keep.pdb"]);
        assert_eq!(recorder.report().file_count(FileOutcome::MoveFailed), 1);
        Ok(())
    }

    #[test]
    fn output_dir_that_is_a_file_fails_the_folder() -> Result<()> {
        let tree = ShardTree::new()?;
        fs::write(tree.output(), b"occupied")?;
        let kept = tree.add_raw("a", "keep.pdb", b"ok")?;
        let unit =
            ValidatedFolder::new(Folder::new(tree.shard("a")?), vec![survivor(kept.clone())]);

        let mut recorder = StageRecorder::new(StageKind::Relocate, Metrics::new()?);
        let result = RelocateStage::new(tree.output()).process(unit, &mut recorder);

        assert!(matches!(
            result,
            Err(PipelineError::Io {
                operation: "relocate.create_output",
                ..
            })
        ));
        assert!(kept.exists());
        Ok(())
    }

    #[test]
    fn concurrent_first_use_creates_one_directory() -> Result<()> {
        let tree = ShardTree::new()?;
        let first = tree.add_raw("a", "1abc.pdb", b"a")?;
        let second = tree.add_raw("b", "2def.pdb", b"b")?;
        let barrier = Arc::new(Barrier::new(2));

        let workers: Vec<_> = [("a", first), ("b", second)]
            .into_iter()
            .map(|(shard, file)| {
                let barrier = Arc::clone(&barrier);
                let output = tree.output().to_path_buf();
                let folder = Folder::new(tree.root().join(shard));
                thread::spawn(move || -> Result<Folder> {
                    let mut recorder = StageRecorder::new(StageKind::Relocate, Metrics::new()?);
                    let unit = ValidatedFolder::new(folder, vec![survivor(file)]);
                    barrier.wait();
                    Ok(RelocateStage::new(output).process(unit, &mut recorder)?)
                })
            })
            .collect();

        for worker in workers {
            worker
                .join()
                .map_err(|_| anyhow::anyhow!("relocation worker panicked"))??;
        }
        assert!(tree.output().is_dir());
        assert_eq!(tree.output_names()?, vec!["1abc.pdb", "2def.pdb"]);
        assert_eq!(list_names(tree.base())?, vec!["pdb", "processed"]);
        Ok(())
    }
}
