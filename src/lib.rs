//! # satchel
//!
//! Pulls and packs container images between private registries.
//!
//! Given a TOML manifest of images, satchel pulls each image through the
//! local container daemon, retags it without its registry, exports all of
//! them into one gzip archive and writes a `load-images.sh` script. Copy both
//! files to the destination and run the script with the target registry to
//! load, retag and push every image there.
//!
//! ## Usage
//!
//! ```bash
//! satchel                                   # satchel.toml -> satchel-images.tgz
//! satchel -in images.toml -out images.tgz   # custom paths
//! satchel -public                           # include images marked public
//! ./load-images.sh registry.internal:5000   # at the destination
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive;
pub mod cli;
pub mod daemon;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod resolver;
pub mod script;

pub use cli::Args;
pub use daemon::{DockerCli, ImageDaemon, ImageExport, ImageSummary};
pub use error::{Result, SatchelError};
pub use manifest::{Image, Manifest};
pub use pipeline::RunSummary;

use std::path::PathBuf;

/// Default manifest path
pub const DEFAULT_MANIFEST: &str = "satchel.toml";

/// Default archive path
pub const DEFAULT_ARCHIVE: &str = "satchel-images.tgz";

/// Configuration for a satchel run, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatchelConfig {
    /// Manifest to read
    pub manifest_path: PathBuf,
    /// Archive to write
    pub archive_path: PathBuf,
    /// Load script to write
    pub script_path: PathBuf,
    /// Also pull, tag and archive images marked public
    pub include_public: bool,
    /// Validate the manifest and fail on images missing from the daemon
    pub strict: bool,
}

impl Default for SatchelConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST),
            archive_path: PathBuf::from(DEFAULT_ARCHIVE),
            script_path: PathBuf::from(script::LOAD_SCRIPT_NAME),
            include_public: false,
            strict: false,
        }
    }
}
