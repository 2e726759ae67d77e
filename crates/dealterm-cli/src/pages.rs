//! Packet loading: a directory of page images becomes an ordered `Page` list.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

use dealterm_core::model::{MediaType, Page};

/// Load every page image under `dir`, ordered by file name. Page numbers are
/// assigned 1-based in that order, so scanners that emit `page-001.png`,
/// `page-002.png`, … just work.
pub fn load_packet(dir: &Path) -> Result<Vec<Page>> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| media_type_for(path).is_some())
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no page images (.png/.jpg/.jpeg) found under {}", dir.display());
    }

    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let media_type = media_type_for(&path).expect("filtered above");
        let bytes = std::fs::read(&path)
            .with_context(|| format!("reading page image {}", path.display()))?;

        // Confirm the bytes decode as an image before shipping them to the
        // model; a corrupt scan gets skipped with a warning.
        match image::load_from_memory(&bytes) {
            Ok(decoded) => {
                debug!(
                    path = %path.display(),
                    width = decoded.width(),
                    height = decoded.height(),
                    "loaded page image"
                );
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping undecodable image");
                continue;
            }
        }

        let page_number = pages.len() as u32 + 1;
        pages.push(Page::new(page_number, bytes, media_type));
    }

    if pages.is_empty() {
        bail!("every image under {} failed to decode", dir.display());
    }
    Ok(pages)
}

fn media_type_for(path: &Path) -> Option<MediaType> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Some(MediaType::Png),
        Some("jpg") | Some("jpeg") => Some(MediaType::Jpeg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_extensions() {
        assert_eq!(media_type_for(Path::new("a/page-001.PNG")), Some(MediaType::Png));
        assert_eq!(media_type_for(Path::new("scan.jpeg")), Some(MediaType::Jpeg));
        assert_eq!(media_type_for(Path::new("notes.txt")), None);
        assert_eq!(media_type_for(Path::new("bare")), None);
    }

    #[test]
    fn empty_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_packet(dir.path()).is_err());
    }

    #[test]
    fn loads_pages_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        // 1×1 PNGs, written out of order on purpose.
        for name in ["page-002.png", "page-001.png"] {
            let img = image::RgbImage::new(1, 1);
            img.save(dir.path().join(name)).unwrap();
        }

        let pages = load_packet(dir.path()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[1].page_number, 2);
    }

    #[test]
    fn corrupt_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page-001.png"), b"not a png").unwrap();
        let img = image::RgbImage::new(1, 1);
        img.save(dir.path().join("page-002.png")).unwrap();

        let pages = load_packet(dir.path()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
    }
}
