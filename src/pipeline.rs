//! The satchel run: load → pull → tag → save → script.
//!
//! Stages run strictly in order and the first error ends the run. Nothing is
//! rolled back: images already pulled or tagged stay in the daemon, and a
//! partial archive may be left on disk.

use crate::SatchelConfig;
use crate::archive;
use crate::daemon::ImageDaemon;
use crate::error::{ArchiveError, ResolveError, Result};
use crate::manifest::{Image, Manifest};
use crate::resolver;
use crate::script;
use std::path::PathBuf;

/// What a successful run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of root images written to the archive
    pub images_archived: usize,
    /// Archive location
    pub archive_path: PathBuf,
    /// Compressed archive size in bytes
    pub archive_size: u64,
    /// Load script location
    pub script_path: PathBuf,
    /// Number of images listed in the load script
    pub images_scripted: usize,
}

/// Run every stage against `daemon`.
///
/// The manifest is loaded, and validated under strict mode, before the
/// daemon is contacted at all.
pub async fn run<D: ImageDaemon>(config: &SatchelConfig, daemon: &D) -> Result<RunSummary> {
    let manifest = Manifest::load(&config.manifest_path).await?;
    if config.strict {
        manifest.validate_strict()?;
    }

    daemon.ping().await?;

    pull_images(daemon, &manifest, config.include_public).await?;
    tag_images(daemon, &manifest, config.include_public).await?;
    let (images_archived, archive_size) = save_images(daemon, &manifest, config).await?;
    generate_script(config, &manifest).await?;

    Ok(RunSummary {
        images_archived,
        archive_path: config.archive_path.clone(),
        archive_size,
        script_path: config.script_path.clone(),
        images_scripted: manifest.images.len(),
    })
}

/// Pull every selected image by its qualified name
pub async fn pull_images<D: ImageDaemon>(
    daemon: &D,
    manifest: &Manifest,
    include_public: bool,
) -> Result<()> {
    for image in manifest.selected(include_public) {
        let reference = image.qualified_name();
        log::info!("Pulling image {}", reference);
        daemon.pull(&reference).await?;
    }
    Ok(())
}

/// Retag every selected image to its local name
pub async fn tag_images<D: ImageDaemon>(
    daemon: &D,
    manifest: &Manifest,
    include_public: bool,
) -> Result<()> {
    for image in manifest.selected(include_public) {
        let source = image.qualified_name();
        let target = image.local_name();
        log::info!("Tagging image {} -> {}", source, target);
        daemon.tag(&source, &target).await?;
    }
    Ok(())
}

/// Resolve the selected images to root image IDs and archive them.
///
/// When nothing resolves, an empty archive is written instead of asking the
/// daemon for an export; under strict mode that is an error.
///
/// Returns the number of archived images and the archive size.
pub async fn save_images<D: ImageDaemon>(
    daemon: &D,
    manifest: &Manifest,
    config: &SatchelConfig,
) -> Result<(usize, u64)> {
    let summaries = daemon.list().await?;

    let missing = resolver::unmatched(&manifest.images, &summaries, config.include_public);
    if !missing.is_empty() {
        let names: Vec<String> = missing.into_iter().map(Image::local_name).collect();
        if config.strict {
            return Err(ResolveError::Unmatched { images: names }.into());
        }
        for name in &names {
            log::warn!("No local root image tagged {}; it will be missing from the archive", name);
        }
    }

    let image_ids = resolver::resolve(&manifest.images, &summaries, config.include_public);
    if image_ids.is_empty() {
        if config.strict {
            return Err(ArchiveError::NoImages.into());
        }
        log::warn!("No images resolved for export; the archive will be empty");
        let size = archive::write_empty(&config.archive_path).await?;
        return Ok((0, size));
    }
    log::debug!("Resolved image IDs: {}", image_ids.join(", "));

    let size = archive::archive(daemon, &image_ids, &config.archive_path).await?;
    Ok((image_ids.len(), size))
}

/// Render and write the load script for every manifest image
pub async fn generate_script(config: &SatchelConfig, manifest: &Manifest) -> Result<()> {
    if !config.include_public {
        for image in manifest.images.iter().filter(|image| image.public) {
            log::warn!(
                "Load script references public image {} which is not in the archive",
                image.local_name()
            );
        }
    }

    let output_file = config.archive_path.to_string_lossy();
    let contents = script::render(&output_file, &manifest.images)?;

    log::info!("Writing load script '{}'", config.script_path.display());
    script::write_script(&config.script_path, &contents).await?;
    Ok(())
}
