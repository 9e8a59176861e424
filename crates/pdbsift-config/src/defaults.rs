//! Default values for pipeline configuration.
//!
//! # Design
//! - Centralize defaults so the CLI, the YAML overlay, and tests agree.

/// Suffix identifying compressed structure files inside a shard folder.
pub const COMPRESSED_SUFFIX: &str = ".gz";
/// Bounded capacity of every stage queue.
pub const QUEUE_CAPACITY: usize = 64;
/// Log file written next to the working directory when none is supplied.
pub const LOG_FILE: &str = "process.log";
/// Log level used when neither the CLI nor `RUST_LOG` provide one.
pub const LOG_LEVEL: &str = "info";
