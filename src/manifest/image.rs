//! A single image entry of the manifest.

use serde::{Deserialize, Serialize};

/// Tag used when a manifest entry leaves `tag` empty or absent
pub const DEFAULT_TAG: &str = "latest";

/// One `[[image]]` entry of the manifest
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Image {
    /// Source registry; empty means the daemon's default namespace
    #[serde(default)]
    pub registry: String,
    /// Repository path, e.g. `x/pause`
    #[serde(default)]
    pub repository: String,
    /// Image tag, `latest` once loaded if the manifest left it empty
    #[serde(default)]
    pub tag: String,
    /// Public images are skipped unless public inclusion is requested
    #[serde(default)]
    pub public: bool,
}

impl Image {
    /// Create an image entry with the tag already defaulted
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
        public: bool,
    ) -> Self {
        let mut image = Self {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
            public,
        };
        image.apply_default_tag();
        image
    }

    pub(crate) fn apply_default_tag(&mut self) {
        if self.tag.is_empty() {
            self.tag = DEFAULT_TAG.to_string();
        }
    }

    /// `registry/repository:tag`, or `repository:tag` without a registry.
    ///
    /// This is the name pulled from the source registry.
    pub fn qualified_name(&self) -> String {
        if self.registry.is_empty() {
            self.local_name()
        } else {
            format!("{}/{}:{}", self.registry, self.repository, self.tag)
        }
    }

    /// `repository:tag`, the name the image is retagged to before export
    /// and the identity used by the load script.
    pub fn local_name(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    /// Whether pull, tag and save should touch this image
    pub fn is_selected(&self, include_public: bool) -> bool {
        include_public || !self.public
    }
}
