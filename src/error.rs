//! Error types for satchel runs.
//!
//! Every error is terminal: the pipeline stops at the first failure and the
//! binary reports it together with recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for satchel operations
pub type Result<T> = std::result::Result<T, SatchelError>;

/// Main error type for all satchel operations
#[derive(Error, Debug)]
pub enum SatchelError {
    /// Manifest loading and validation errors
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Container daemon errors
    #[error("Daemon error: {0}")]
    Daemon(#[from] DaemonError),

    /// Image resolution errors
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Archive creation errors
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Load script errors
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),
}

/// Manifest-specific errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file does not exist
    #[error("Input file '{}' not found", .path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Manifest file exists but could not be read
    #[error("Error reading manifest {}: {source}", .path.display())]
    Read {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid TOML or has fields of the wrong type
    #[error("Error loading file {}: {source}", .path.display())]
    Parse {
        /// Manifest path
        path: PathBuf,
        /// TOML deserialization error
        #[source]
        source: toml::de::Error,
    },

    /// Strict validation rejected the manifest
    #[error("Invalid manifest: {}", .issues.join("; "))]
    Invalid {
        /// Every problem found, in manifest order
        issues: Vec<String>,
    },
}

/// Container daemon errors
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Daemon could not be reached
    #[error("Cannot connect to the container daemon: {reason}")]
    Connection {
        /// Reason for the error
        reason: String,
    },

    /// Image pull failed
    #[error("Error pulling image {image}: {reason}")]
    Pull {
        /// Fully-qualified image name
        image: String,
        /// Reason for the error
        reason: String,
    },

    /// Image tag failed
    #[error("Error tagging image {source_image} -> {target}: {reason}")]
    Tag {
        /// Image being tagged
        source_image: String,
        /// New tag
        target: String,
        /// Reason for the error
        reason: String,
    },

    /// Listing local images failed
    #[error("Error getting docker image list: {reason}")]
    List {
        /// Reason for the error
        reason: String,
    },

    /// Exporting images failed
    #[error("Error saving images: {reason}")]
    Save {
        /// Reason for the error
        reason: String,
    },
}

/// Errors raised while matching manifest images to local images
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Selected manifest images have no matching root image locally
    #[error("No local root image found for: {}", .images.join(", "))]
    Unmatched {
        /// Local names that matched nothing
        images: Vec<String>,
    },
}

/// Archive creation errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Nothing was resolved for export
    #[error("No images resolved for export")]
    NoImages,

    /// Output file could not be created
    #[error("Error creating image file {}: {source}", .path.display())]
    Create {
        /// Archive path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading the daemon's export stream failed
    #[error("Error reading image export stream: {source}")]
    Stream {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Compressing or writing the archive failed
    #[error("Error writing compressed archive: {source}")]
    Compression {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Load script errors
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Template failed to parse
    #[error("Error parsing load script template: {0}")]
    Template(#[from] handlebars::TemplateError),

    /// Template failed to render
    #[error("Error generating load script: {0}")]
    Render(#[from] handlebars::RenderError),

    /// Script file could not be written
    #[error("Error writing load script {}: {source}", .path.display())]
    Write {
        /// Script path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl SatchelError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            SatchelError::Manifest(ManifestError::NotFound { path }) => vec![
                format!("Create a manifest at {}", path.display()),
                "Point to an existing manifest with -in <path>".to_string(),
            ],
            SatchelError::Manifest(ManifestError::Parse { .. }) => vec![
                "Declare each image as an [[image]] table with string fields registry, repository, tag and a boolean public".to_string(),
            ],
            SatchelError::Manifest(ManifestError::Invalid { .. }) => vec![
                "Fix the listed manifest entries or run without --strict".to_string(),
            ],
            SatchelError::Daemon(DaemonError::Connection { .. }) => vec![
                "Check that the docker CLI is installed and on PATH".to_string(),
                "Check that the daemon is running: docker info".to_string(),
                "Verify DOCKER_HOST / DOCKER_CONTEXT point at the intended daemon".to_string(),
            ],
            SatchelError::Daemon(DaemonError::Pull { image, .. }) => vec![
                format!("Check that {} exists and is reachable", image),
                "Log in to the source registry: docker login <registry>".to_string(),
            ],
            SatchelError::Resolve(ResolveError::Unmatched { .. }) => vec![
                "Make sure every manifest image was pulled and tagged".to_string(),
                "Run without --strict to archive the images that were found".to_string(),
            ],
            SatchelError::Archive(ArchiveError::NoImages) => vec![
                "Check that the manifest lists at least one non-public image, or pass -public"
                    .to_string(),
                "Run without --strict to write an empty archive".to_string(),
            ],
            SatchelError::Archive(ArchiveError::Create { .. } | ArchiveError::Compression { .. })
            | SatchelError::Script(ScriptError::Write { .. }) => vec![
                "Check that the output directory exists and is writable".to_string(),
                "Check free disk space".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
