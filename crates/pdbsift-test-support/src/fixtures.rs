//! Test fixtures for building shard trees of compressed structure files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

/// Structure with two residues, one of which carries an alpha-carbon atom.
pub const PDB_WITH_ALPHA_CARBON: &str = "\
HEADER    TEST STRUCTURE
ATOM      1  N   MET A   1      38.198  19.582  28.998  1.00 56.34           N
ATOM      2  CA  MET A   1      37.312  20.484  29.721  1.00 55.96           C
ATOM      3  C   MET A   1      36.019  19.725  29.983  1.00 54.12           C
END
";

/// Structure that parses but has no alpha-carbon atom anywhere.
pub const PDB_WITHOUT_ALPHA_CARBON: &str = "\
HEADER    TEST STRUCTURE
ATOM      1  N   MET A   1      38.198  19.582  28.998  1.00 56.34           N
ATOM      3  C   MET A   1      36.019  19.725  29.983  1.00 54.12           C
END
";

/// Structure whose alpha-carbon record carries a non-numeric coordinate.
pub const PDB_MALFORMED: &str = "\
ATOM      2  CA  MET A   1      37.312  xx.484  29.721  1.00 55.96           C
";

/// Bytes that are not a gzip stream.
pub const NOT_GZIP: &[u8] = b"definitely not gzip";

/// Compress `contents` into an in-memory gzip stream.
///
/// # Errors
///
/// Returns an error if the encoder fails.
pub fn gzip_bytes(contents: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(contents).context("gzip encode")?;
    encoder.finish().context("gzip finish")
}

/// Write `contents` gzip-compressed to `path`.
///
/// # Errors
///
/// Returns an error if compression or the write fails.
pub fn write_gzip(path: &Path, contents: &[u8]) -> Result<()> {
    let compressed = gzip_bytes(contents)?;
    fs::write(path, compressed).with_context(|| format!("write {}", path.display()))
}

/// Write a gzip stream cut off halfway through.
///
/// # Errors
///
/// Returns an error if compression or the write fails.
pub fn write_truncated_gzip(path: &Path, contents: &[u8]) -> Result<()> {
    let compressed = gzip_bytes(contents)?;
    let cut = compressed.len() / 2;
    fs::write(path, &compressed[..cut]).with_context(|| format!("write {}", path.display()))
}

/// Create a temporary directory with the workspace prefix.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("pdbsift-")
        .tempdir()
        .context("create temp dir")
}

/// Input root and output directory laid out inside a temp directory.
pub struct ShardTree {
    temp: TempDir,
    root: PathBuf,
    output: PathBuf,
}

impl ShardTree {
    /// Create an empty input root (`<temp>/pdb`) and an output path
    /// (`<temp>/processed`) that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn new() -> Result<Self> {
        let temp = temp_dir()?;
        let root = temp.path().join("pdb");
        fs::create_dir_all(&root).context("create root")?;
        let output = temp.path().join("processed");
        Ok(Self { temp, root, output })
    }

    /// Directory holding the shard folders.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Consolidated output directory.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Backing temp directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        self.temp.path()
    }

    /// Create (or reuse) a shard folder and return its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created.
    pub fn shard(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        fs::create_dir_all(&path).with_context(|| format!("create shard {name}"))?;
        Ok(path)
    }

    /// Add a gzip-compressed structure file to a shard.
    ///
    /// # Errors
    ///
    /// Returns an error if the shard or the file cannot be written.
    pub fn add_gz(&self, shard: &str, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.shard(shard)?.join(file_name);
        write_gzip(&path, contents.as_bytes())?;
        Ok(path)
    }

    /// Add raw bytes to a shard without compressing them.
    ///
    /// # Errors
    ///
    /// Returns an error if the shard or the file cannot be written.
    pub fn add_raw(&self, shard: &str, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.shard(shard)?.join(file_name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Names of the files currently in the output directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub fn output_names(&self) -> Result<Vec<String>> {
        list_names(&self.output)
    }

    /// Names of the entries currently under the root, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be listed.
    pub fn remaining_shards(&self) -> Result<Vec<String>> {
        list_names(&self.root)
    }
}

/// Sorted entry names of `dir`; an absent directory yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be listed.
pub fn list_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
