use std::collections::HashMap;

use crate::error::Error;
use crate::model::Document;
use crate::package::{Package, Relationships};

/// Binary payload of one image, ready to be inlined.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaAsset {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Relationship id → asset, for the images that resolved.
pub type MediaAssets = HashMap<String, MediaAsset>;

/// Resolve every image the document references. Failures are per image: the
/// renderer substitutes a placeholder for ids missing from the result.
pub fn resolve(package: &Package, doc: &Document) -> Result<MediaAssets, Error> {
    let images = doc.images();
    let mut assets = MediaAssets::new();
    if images.is_empty() {
        return Ok(assets);
    }
    let rels = package.relationships(&doc.main_part)?;
    if rels.is_empty() {
        log::debug!("{} has no relationships", doc.main_part);
    } else {
        log::debug!("Resolving {} image(s) against {} relationship(s)", images.len(), rels.len());
    }

    let mut failed = 0usize;
    for image in images {
        if assets.contains_key(&image.rel_id) {
            continue;
        }
        match resolve_one(package, &rels, &image.rel_id) {
            Ok(asset) => {
                log::debug!(
                    "Resolved image {} ({}, {} bytes)",
                    image.rel_id,
                    asset.content_type,
                    asset.data.len()
                );
                assets.insert(image.rel_id.clone(), asset);
            }
            Err(e) => {
                failed += 1;
                log::warn!("{e}; rendering a placeholder");
            }
        }
    }
    if failed > 0 {
        log::info!("{} image reference(s) could not be resolved", failed);
    }
    Ok(assets)
}

fn resolve_one(package: &Package, rels: &Relationships, rel_id: &str) -> Result<MediaAsset, Error> {
    let unresolved = |reason: String| Error::UnresolvedMedia {
        rel_id: rel_id.to_string(),
        reason,
    };
    let rel = rels
        .get(rel_id)
        .ok_or_else(|| unresolved("no such relationship".into()))?;
    if rel.external {
        return Err(unresolved("image is linked externally, not embedded".into()));
    }
    let data = package
        .part(&rel.target)
        .map_err(|_| unresolved(format!("media part {} is missing", rel.target)))?;
    let content_type = image_content_type(package.content_type(&rel.target), data)
        .ok_or_else(|| unresolved(format!("{} is not an image", rel.target)))?;
    Ok(MediaAsset {
        data: data.to_vec(),
        content_type,
    })
}

/// Declared content type when it names an image, else sniffed from the
/// payload's magic bytes.
fn image_content_type(declared: Option<&str>, data: &[u8]) -> Option<String> {
    if let Some(ct) = declared.map(str::trim)
        && ct.to_ascii_lowercase().starts_with("image/")
    {
        return Some(ct.to_ascii_lowercase());
    }
    image::guess_format(data)
        .ok()
        .map(|fmt| fmt.to_mime_type().to_string())
}
