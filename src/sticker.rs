//! Sticker assets and the on-disk sticker catalog.
//!
//! Stickers are square artwork drawn at a fixed reference size. The eye line
//! offset locates the artwork's eyes below its top edge at that reference size;
//! compositing scales both together.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;

/// Side length the sticker artwork is authored at.
pub const STICKER_REFERENCE_SIZE: f32 = 500.0;
/// Distance from the sticker's top edge to its eye line, at reference size.
pub const STICKER_EYE_LINE: f32 = 55.0;

const STICKER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Decoded sticker ready for compositing.
#[derive(Clone, Debug)]
pub struct StickerAsset {
    /// Path or URL the sticker was loaded from.
    pub id: String,
    pub image: RgbaImage,
    pub reference_size: f32,
    pub eye_line: f32,
}

impl StickerAsset {
    pub fn new(id: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            id: id.into(),
            image,
            reference_size: STICKER_REFERENCE_SIZE,
            eye_line: STICKER_EYE_LINE,
        }
    }

    /// Override reference geometry for artwork authored at a different size.
    pub fn with_geometry(mut self, reference_size: f32, eye_line: f32) -> Self {
        self.reference_size = reference_size;
        self.eye_line = eye_line;
        self
    }

    pub fn from_bytes(id: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let id = id.into();
        let image = image::load_from_memory(bytes)
            .with_context(|| format!("failed to decode sticker {}", id))?
            .into_rgba8();
        Ok(Self::new(id, image))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to open sticker {}", path.display()))?
            .into_rgba8();
        Ok(Self::new(path.display().to_string(), image))
    }

    /// Load a sticker from a local path or, with `remote-assets`, an http(s) URL.
    pub fn load(source: &str) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Self::from_url(source);
        }
        if source.contains("://") {
            return Err(anyhow!("unsupported sticker source {}", source));
        }
        Self::from_path(source)
    }

    #[cfg(feature = "remote-assets")]
    pub fn from_url(source: &str) -> Result<Self> {
        use std::io::Read;

        let url = url::Url::parse(source).with_context(|| format!("invalid sticker url {}", source))?;
        let response = ureq::get(url.as_str())
            .call()
            .with_context(|| format!("fetch sticker from {}", url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .context("read sticker body")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty sticker response from {}", url));
        }
        Self::from_bytes(url.as_str(), &bytes)
    }

    #[cfg(not(feature = "remote-assets"))]
    pub fn from_url(source: &str) -> Result<Self> {
        Err(anyhow!(
            "loading sticker {} requires the remote-assets feature",
            source
        ))
    }
}

/// Stickers available for selection, discovered in a directory.
#[derive(Clone, Debug, Default)]
pub struct StickerCatalog {
    entries: Vec<PathBuf>,
}

impl StickerCatalog {
    /// List image files directly inside `dir`, sorted by file name.
    pub fn scan<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to read sticker directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_sticker = path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| STICKER_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
            if is_sticker {
                entries.push(path);
            }
        }
        entries.sort();
        log::debug!("found {} stickers in {}", entries.len(), dir.display());
        Ok(Self { entries })
    }

    /// Sticker names (file stems) in catalog order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load the sticker whose file stem is `name`.
    pub fn load(&self, name: &str) -> Result<StickerAsset> {
        let path = self
            .entries
            .iter()
            .find(|path| path.file_stem().and_then(|s| s.to_str()) == Some(name))
            .ok_or_else(|| anyhow!("sticker '{}' not found in catalog", name))?;
        StickerAsset::from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn catalog_lists_images_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sticker = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        sticker.save(dir.path().join("ketnipz.png"))?;
        sticker.save(dir.path().join("bear.png"))?;
        std::fs::write(dir.path().join("notes.txt"), b"not a sticker")?;

        let catalog = StickerCatalog::scan(dir.path())?;
        assert_eq!(catalog.names(), vec!["bear", "ketnipz"]);

        let asset = catalog.load("ketnipz")?;
        assert_eq!(asset.image.dimensions(), (4, 4));
        assert_eq!(asset.reference_size, STICKER_REFERENCE_SIZE);
        assert_eq!(asset.eye_line, STICKER_EYE_LINE);
        assert!(catalog.load("missing").is_err());
        Ok(())
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(StickerAsset::load("ftp://example.com/a.png").is_err());
    }

    #[test]
    fn decodes_from_bytes() -> Result<()> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 128]))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        let asset = StickerAsset::from_bytes("inline", &bytes)?;
        assert_eq!(asset.image.get_pixel(1, 1), &Rgba([0, 0, 255, 128]));
        Ok(())
    }
}
