//! Upload gating.
//!
//! The size limit is advisory: an oversize file is reported back to the
//! caller and never replaces an image already held by the session.

use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};

/// Largest accepted upload in bytes. Larger files trigger the oversize advisory.
pub const MAX_UPLOAD_BYTES: u64 = 300_000;

/// MIME types accepted from the file input.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg"];

/// Outcome of checking a selected file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadVerdict {
    Accepted { mime: &'static str },
    Oversize { size: u64, limit: u64 },
    Unsupported { detected: Option<String> },
}

impl UploadVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UploadVerdict::Accepted { .. })
    }
}

/// A file picked by the user, held in memory.
#[derive(Clone, Debug)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read upload {}", path.display()))?;
        Ok(Self::new(path.display().to_string(), bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// MIME type sniffed from the content, falling back to the file extension.
    pub fn mime(&self) -> Option<&'static str> {
        let format = image::guess_format(&self.bytes)
            .ok()
            .or_else(|| ImageFormat::from_path(&self.name).ok())?;
        Some(format.to_mime_type())
    }

    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.bytes)
            .with_context(|| format!("failed to decode upload {}", self.name))
    }
}

pub fn is_oversize(size: u64, limit: u64) -> bool {
    size > limit
}

/// Check size and type of an upload against `limit`.
///
/// Size is checked first, so an oversize file always gets the size advisory
/// whatever its type.
pub fn check_upload(upload: &Upload, limit: u64) -> UploadVerdict {
    if is_oversize(upload.size(), limit) {
        return UploadVerdict::Oversize {
            size: upload.size(),
            limit,
        };
    }
    let mime = upload.mime();
    let accepted = mime.and_then(|m| ACCEPTED_MIME_TYPES.iter().copied().find(|a| *a == m));
    let Some(mime) = accepted else {
        return UploadVerdict::Unsupported {
            detected: mime.map(str::to_string),
        };
    };
    UploadVerdict::Accepted { mime }
}
