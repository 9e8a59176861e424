//! PDB record scanner deciding whether a structure file is worth keeping.
//!
//! A file qualifies when every coordinate record (`ATOM`/`HETATM`) carries
//! parseable x/y/z fields and at least one of them names an alpha-carbon
//! (`CA`) atom. Scanning stops at the first `END` record.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};

const MARKER_ATOM: &str = "CA";
const ATOM_NAME: std::ops::Range<usize> = 12..16;
const COORDINATES: [std::ops::Range<usize>; 3] = [30..38, 38..46, 46..54];

/// Result of scanning a structure file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum StructureVerdict {
    /// Parsed cleanly and contains an alpha-carbon atom.
    Qualified {
        /// One-based line of the first alpha-carbon record.
        marker_line: usize,
    },
    /// Parsed cleanly but no coordinate record names an alpha-carbon.
    NoMarker {
        /// Number of coordinate records seen.
        records: usize,
    },
    /// The file is not a well-formed PDB structure.
    Malformed {
        /// One-based line where parsing failed.
        line: usize,
        /// Machine-friendly failure reason.
        reason: &'static str,
    },
}

impl StructureVerdict {
    /// Whether the file should be kept.
    #[must_use]
    pub const fn is_qualified(self) -> bool {
        matches!(self, Self::Qualified { .. })
    }

    /// Short label for logs.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Qualified { .. } => "alpha_carbon_present",
            Self::NoMarker { .. } => "no_alpha_carbon",
            Self::Malformed { reason, .. } => reason,
        }
    }
}

/// Read and scan the structure file at `path`.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the file cannot be read.
pub fn inspect_structure(path: &Path) -> PipelineResult<StructureVerdict> {
    let bytes =
        fs::read(path).map_err(|source| PipelineError::io("structure.read", path, source))?;
    Ok(inspect_bytes(&bytes))
}

/// Scan an in-memory structure.
#[must_use]
pub fn inspect_bytes(bytes: &[u8]) -> StructureVerdict {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let valid = &bytes[..err.valid_up_to()];
            let line = valid.iter().filter(|byte| **byte == b'\n').count() + 1;
            return StructureVerdict::Malformed {
                line,
                reason: "non_utf8",
            };
        }
    };

    let mut records = 0;
    let mut marker_line = None;
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        let number = index + 1;
        match record_name(line) {
            "END" => break,
            "ATOM" | "HETATM" => {
                records += 1;
                if let Err(reason) = parse_coordinates(line) {
                    return StructureVerdict::Malformed {
                        line: number,
                        reason,
                    };
                }
                if marker_line.is_none()
                    && line.get(ATOM_NAME).map(str::trim) == Some(MARKER_ATOM)
                {
                    marker_line = Some(number);
                }
            }
            _ => {}
        }
    }

    marker_line.map_or(StructureVerdict::NoMarker { records }, |marker_line| {
        StructureVerdict::Qualified { marker_line }
    })
}

fn record_name(line: &str) -> &str {
    line.get(..6).unwrap_or(line).trim_end()
}

fn parse_coordinates(line: &str) -> Result<(), &'static str> {
    for range in COORDINATES {
        let field = line.get(range).ok_or("truncated_coordinates")?;
        field
            .trim()
            .parse::<f64>()
            .map_err(|_| "invalid_coordinate")?;
    }
    Ok(())
}
