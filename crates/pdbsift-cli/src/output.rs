//! Human-readable run summary.

use std::fmt::Write as _;

use pdbsift_pipeline::{FileOutcome, RunReport, StageReport};

pub(crate) fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "processed {} of {} folders in {:.2}s",
        report.reclaimed(),
        report.folders_discovered,
        elapsed_secs(report.elapsed_ms)
    );
    let _ = writeln!(
        out,
        "kept {} / removed {} invalid / moved {} into {}",
        report.file_count(FileOutcome::Kept),
        report.file_count(FileOutcome::RemovedInvalid),
        report.file_count(FileOutcome::Moved),
        report.output_dir.display()
    );
    let overwrites = report.file_count(FileOutcome::Overwrote);
    if overwrites > 0 {
        let _ = writeln!(out, "replaced {overwrites} same-named output files");
    }
    for stage in &report.stages {
        if let Some(line) = stage_problems(stage) {
            out.push_str(&line);
        }
    }
    for failure in report.failed_folders() {
        let _ = writeln!(
            out,
            "withheld {} at {}: {}",
            failure.folder.display(),
            failure.stage.as_str(),
            failure.detail
        );
    }
    for stage in &report.aborted_stages {
        let _ = writeln!(out, "stage {} aborted", stage.as_str());
    }
    out
}

fn stage_problems(stage: &StageReport) -> Option<String> {
    let failures = stage.file_failures();
    if failures == 0 {
        return None;
    }
    Some(format!(
        "{}: {failures} file-level failures\n",
        stage.stage.as_str()
    ))
}

#[allow(clippy::cast_precision_loss)]
fn elapsed_secs(elapsed_ms: u64) -> f64 {
    elapsed_ms as f64 / 1000.0
}
