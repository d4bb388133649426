//! Matching manifest images to the daemon's local images.
//!
//! Only root images (no parent) are exported. A root image is selected when
//! one of its repo tags equals the local name of a selected manifest image.
//! Output follows the daemon's summary order, and each summary contributes
//! at most one ID.

use crate::daemon::ImageSummary;
use crate::manifest::Image;

/// IDs of the root images to export for `images`
pub fn resolve(images: &[Image], summaries: &[ImageSummary], include_public: bool) -> Vec<String> {
    let local_names = selected_local_names(images, include_public);
    let mut image_ids: Vec<String> = Vec::new();

    for summary in summaries.iter().filter(|summary| summary.is_root()) {
        let matched = local_names.iter().any(|name| summary.has_tag(name));
        if matched && !image_ids.contains(&summary.id) {
            image_ids.push(summary.id.clone());
        }
    }

    image_ids
}

/// Selected images whose local name is not a repo tag of any root image
pub fn unmatched<'a>(
    images: &'a [Image],
    summaries: &[ImageSummary],
    include_public: bool,
) -> Vec<&'a Image> {
    images
        .iter()
        .filter(|image| image.is_selected(include_public))
        .filter(|image| {
            let name = image.local_name();
            !summaries
                .iter()
                .any(|summary| summary.is_root() && summary.has_tag(&name))
        })
        .collect()
}

fn selected_local_names(images: &[Image], include_public: bool) -> Vec<String> {
    images
        .iter()
        .filter(|image| image.is_selected(include_public))
        .map(Image::local_name)
        .collect()
}
