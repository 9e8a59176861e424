use std::fs;
use std::io;

use tracing::{info, warn};

use super::Stage;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{Folder, StageKind};
use crate::report::StageRecorder;

/// Recursively removes a drained shard folder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReclaimStage;

impl Stage for ReclaimStage {
    const KIND: StageKind = StageKind::Reclaim;
    type Input = Folder;
    type Output = ();

    fn process(&mut self, unit: Folder, _recorder: &mut StageRecorder) -> PipelineResult<()> {
        match fs::remove_dir_all(unit.path()) {
            Ok(()) => {
                info!(path = %unit.path().display(), "removed folder");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(path = %unit.path().display(), "folder already absent");
                Ok(())
            }
            Err(source) => Err(PipelineError::io("reclaim.remove_dir_all", unit.path(), source)),
        }
    }
}
