//! Access to the container daemon.
//!
//! The pipeline only needs five operations from the daemon: a reachability
//! check, pull, tag, list and a combined save. [`ImageDaemon`] captures them
//! so the pipeline can be driven by the docker CLI in production and by an
//! in-memory double in tests.
//!
//! # Module Structure
//!
//! - `docker` - [`DockerCli`], the docker CLI backed implementation

mod docker;

pub use docker::{DAEMON_PROBE_TIMEOUT, DOCKER_PROGRAM, DockerCli, DockerExport};

use crate::error::DaemonError;
use std::future::Future;
use tokio::io::AsyncRead;

/// Daemon-reported description of a local image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageSummary {
    /// Image ID, e.g. `sha256:…`
    pub id: String,
    /// Parent image ID; empty for root images
    pub parent_id: String,
    /// `repository:tag` names pointing at this image
    pub repo_tags: Vec<String>,
}

impl ImageSummary {
    /// Create a summary
    pub fn new(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        repo_tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            repo_tags: repo_tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Root images have no parent and are the unit of export
    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }

    /// Whether `name` is one of this image's repo tags
    pub fn has_tag(&self, name: &str) -> bool {
        self.repo_tags.iter().any(|tag| tag == name)
    }
}

/// Stream of a multi-image export produced by [`ImageDaemon::save`].
///
/// Dropping the stream releases it. [`ImageExport::close`] additionally
/// waits for the daemon to finish and reports a failed export.
pub trait ImageExport: AsyncRead + Unpin + Send {
    /// Release the stream and report how the export ended
    fn close(self) -> impl Future<Output = Result<(), DaemonError>> + Send
    where
        Self: Sized;
}

/// Operations satchel performs against the container daemon
pub trait ImageDaemon: Sync {
    /// Stream type returned by [`ImageDaemon::save`]
    type Export: ImageExport;

    /// Verify the daemon is reachable
    fn ping(&self) -> impl Future<Output = Result<(), DaemonError>> + Send;

    /// Pull `reference` from its registry
    fn pull(&self, reference: &str) -> impl Future<Output = Result<(), DaemonError>> + Send;

    /// Add the local name `target` to the image named `source`
    fn tag(
        &self,
        source: &str,
        target: &str,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;

    /// List top-level local images in daemon order
    fn list(&self) -> impl Future<Output = Result<Vec<ImageSummary>, DaemonError>> + Send;

    /// Export all `image_ids` as a single docker-save stream
    fn save(
        &self,
        image_ids: &[String],
    ) -> impl Future<Output = Result<Self::Export, DaemonError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_detection() {
        assert!(ImageSummary::new("sha256:a", "", ["java:8"]).is_root());
        assert!(!ImageSummary::new("sha256:b", "sha256:a", ["java:8"]).is_root());
    }

    #[test]
    fn test_has_tag_is_exact() {
        let summary = ImageSummary::new("sha256:a", "", ["x/pause:1.0"]);
        assert!(summary.has_tag("x/pause:1.0"));
        assert!(!summary.has_tag("pause:1.0"));
        assert!(!summary.has_tag("x/pause:1"));
    }
}
