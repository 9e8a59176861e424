#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Configuration for the pdbsift pipeline.
//!
//! Layout: `model.rs` (typed config and overlay), `defaults.rs`, `loader.rs`
//! (YAML overlay), `validate.rs` (pre-flight checks), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_overlay;
pub use model::{ConfigOverlay, PipelineConfig};
pub use validate::validate;
