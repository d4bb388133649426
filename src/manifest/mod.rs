//! Manifest loading.
//!
//! A manifest is a TOML document with one `[[image]]` table per image:
//!
//! ```toml
//! [[image]]
//! registry = "gcr.io"
//! repository = "x/pause"
//! tag = "1.0"
//!
//! [[image]]
//! repository = "java"
//! tag = "8"
//! public = true
//! ```
//!
//! Loading only defaults empty tags to `latest`. Anything stricter is opt-in
//! through [`Manifest::validate_strict`].

mod image;

pub use image::{DEFAULT_TAG, Image};

use crate::error::ManifestError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Ordered list of images to package
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// Images in declaration order
    #[serde(rename = "image", default)]
    pub images: Vec<Image>,
}

impl Manifest {
    /// Load a manifest from disk.
    ///
    /// Fails with [`ManifestError::NotFound`] before reading anything if the
    /// path does not exist.
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        if tokio::fs::metadata(path).await.is_err() {
            return Err(ManifestError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ManifestError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let manifest = Self::from_toml(&contents).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!(
            "Loaded {} image(s) from {}",
            manifest.images.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Parse manifest text, defaulting empty tags
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        let mut manifest: Manifest = toml::from_str(contents)?;
        for image in &mut manifest.images {
            image.apply_default_tag();
        }
        Ok(manifest)
    }

    /// Images that pull, tag and save operate on
    pub fn selected(&self, include_public: bool) -> impl Iterator<Item = &Image> {
        self.images
            .iter()
            .filter(move |image| image.is_selected(include_public))
    }

    /// Reject empty repositories, duplicate local names and malformed
    /// registries. All problems are reported at once.
    pub fn validate_strict(&self) -> Result<(), ManifestError> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for (index, image) in self.images.iter().enumerate() {
            let entry = index + 1;

            if image.repository.trim().is_empty() {
                issues.push(format!("image #{entry} has an empty repository"));
                continue;
            }

            if let Some(problem) = registry_problem(&image.registry) {
                issues.push(format!(
                    "image #{entry} ({}) {problem}",
                    image.qualified_name()
                ));
            }

            let local_name = image.local_name();
            if !seen.insert(local_name.clone()) {
                issues.push(format!("image #{entry} duplicates {local_name}"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid { issues })
        }
    }
}

impl FromStr for Manifest {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml(s)
    }
}

fn registry_problem(registry: &str) -> Option<&'static str> {
    if registry.contains("://") {
        Some("has a URL scheme in its registry")
    } else if registry.chars().any(char::is_whitespace) {
        Some("has whitespace in its registry")
    } else if registry.ends_with('/') {
        Some("has a trailing '/' in its registry")
    } else {
        None
    }
}
