//! Domain models flowing through the shard pipeline.
//!
//! # Design
//! - Work units own their paths; a hand-off over a queue moves the value.
//! - Stage-specific payloads implement [`WorkUnit`] so the shared worker loop
//!   can identify the folder it is handling.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Message carried by a stage queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    /// A work unit for the receiving stage.
    Unit(T),
    /// Terminal marker; always the last message on a queue.
    EndOfStream,
}

/// The five pipeline stages in data-flow order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Expands compressed files next to their originals.
    Decompress,
    /// Applies the structure predicate and deletes failures.
    Validate,
    /// Removes compressed originals.
    Cleanup,
    /// Moves survivors into the output directory.
    Relocate,
    /// Removes the drained shard folder.
    Reclaim,
}

impl StageKind {
    /// Every stage, upstream first.
    pub const ALL: [Self; 5] = [
        Self::Decompress,
        Self::Validate,
        Self::Cleanup,
        Self::Relocate,
        Self::Reclaim,
    ];

    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decompress => "decompress",
            Self::Validate => "validate",
            Self::Cleanup => "cleanup",
            Self::Relocate => "relocate",
            Self::Reclaim => "reclaim",
        }
    }

    /// Name of the queue feeding this stage.
    #[must_use]
    pub const fn inbound_queue(self) -> &'static str {
        match self {
            Self::Decompress => "decompress.inbound",
            Self::Validate => "validate.inbound",
            Self::Cleanup => "cleanup.inbound",
            Self::Relocate => "relocate.inbound",
            Self::Reclaim => "reclaim.inbound",
        }
    }
}

/// A shard directory identified by its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    path: PathBuf,
}

impl Folder {
    /// Wrap a shard directory path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the shard directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether a file entry is still compressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionState {
    /// File still carries the compression suffix.
    Compressed,
    /// File was expanded from a compressed sibling.
    Decompressed,
}

/// Outcome of applying the structure predicate to a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Not inspected yet.
    Unknown,
    /// Parsed and carries an alpha-carbon marker.
    Valid,
    /// Failed to parse or carries no marker.
    Invalid,
}

/// A single structure file inside a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Location of the file.
    pub path: PathBuf,
    /// Compression state of the file at `path`.
    pub compression: CompressionState,
    /// Validation verdict.
    pub verdict: Verdict,
}

impl FileEntry {
    /// Entry for a compressed original.
    #[must_use]
    pub fn compressed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compression: CompressionState::Compressed,
            verdict: Verdict::Unknown,
        }
    }

    /// Entry for a decompressed file that has not been inspected yet.
    #[must_use]
    pub fn decompressed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compression: CompressionState::Decompressed,
            verdict: Verdict::Unknown,
        }
    }

    /// Return the entry with `verdict` applied.
    #[must_use]
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = verdict;
        self
    }

    /// File name component, if the path has one.
    #[must_use]
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

/// A folder together with the files that passed validation, in name order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedFolder {
    /// Shard the survivors live in.
    pub folder: Folder,
    /// Decompressed files whose verdict is [`Verdict::Valid`].
    pub survivors: Vec<FileEntry>,
}

impl ValidatedFolder {
    /// Pair a folder with its survivors.
    #[must_use]
    pub const fn new(folder: Folder, survivors: Vec<FileEntry>) -> Self {
        Self { folder, survivors }
    }
}

/// Envelope handed between stages.
pub trait WorkUnit {
    /// Shard folder the unit belongs to.
    fn folder(&self) -> &Folder;
}

impl WorkUnit for Folder {
    fn folder(&self) -> &Folder {
        self
    }
}

impl WorkUnit for ValidatedFolder {
    fn folder(&self) -> &Folder {
        &self.folder
    }
}
