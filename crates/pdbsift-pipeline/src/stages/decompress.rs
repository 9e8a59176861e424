use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::{info, warn};

use super::{Stage, compressed_files, strip_suffix};
use crate::error::{PipelineError, PipelineResult};
use crate::model::{Folder, StageKind};
use crate::report::{FileOutcome, StageRecorder};

/// Expands every compressed file of a folder next to its original.
#[derive(Debug, Clone)]
pub struct DecompressStage {
    suffix: String,
}

impl DecompressStage {
    /// Stage that treats names ending in `suffix` as compressed.
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Stage for DecompressStage {
    const KIND: StageKind = StageKind::Decompress;
    type Input = Folder;
    type Output = Folder;

    fn process(&mut self, unit: Folder, recorder: &mut StageRecorder) -> PipelineResult<Folder> {
        for original in compressed_files(unit.path(), &self.suffix)? {
            let source = original.path;
            let Some(target) = strip_suffix(&source, &self.suffix) else {
                continue;
            };
            match decompress_file(&source, &target) {
                Ok(bytes) => {
                    info!(
                        path = %source.display(),
                        target = %target.display(),
                        bytes,
                        "decompressed"
                    );
                    recorder.record_file(FileOutcome::Decompressed);
                }
                Err(err) => {
                    warn!(
                        path = %source.display(),
                        error = %err.detail(),
                        "decompression failed; skipping file"
                    );
                    discard_partial(&target);
                    recorder.record_file(FileOutcome::DecompressFailed);
                }
            }
        }
        Ok(unit)
    }
}

/// Expand the gzip stream at `source` into `target`, returning bytes written.
pub(crate) fn decompress_file(source: &Path, target: &Path) -> PipelineResult<u64> {
    let input = File::open(source).map_err(|err| decompress_error(source, err))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(input));
    let output = File::create(target).map_err(|err| decompress_error(source, err))?;
    let mut writer = BufWriter::new(output);
    let bytes =
        io::copy(&mut decoder, &mut writer).map_err(|err| decompress_error(source, err))?;
    writer.flush().map_err(|err| decompress_error(source, err))?;
    Ok(bytes)
}

fn decompress_error(path: &Path, source: io::Error) -> PipelineError {
    PipelineError::Decompress {
        path: path.to_path_buf(),
        source,
    }
}

fn discard_partial(target: &Path) {
    match fs::remove_file(target) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            path = %target.display(),
            error = %err,
            "failed to remove partial decompression output"
        ),
    }
}
