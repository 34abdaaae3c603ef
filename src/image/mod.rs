//! Local image attachment with inline preview.
//!
//! Independent of the capture pipeline: accepts one user-selected file whose
//! type must be an image, reads its bytes, and base64-encodes them into a
//! `data:` URI for inline preview. Removing the attachment resets to the
//! empty state.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

/// Maps a file extension to its image MIME type. Returns `None` for
/// anything that is not an image.
pub fn image_mime_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// A loaded image ready for inline preview.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub name: String,
    pub mime: &'static str,
    pub byte_size: usize,
    data_uri: String,
}

impl LoadedImage {
    /// The inline preview URI (`data:<mime>;base64,...`).
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

/// One-slot image attachment state.
#[derive(Debug, Default)]
pub struct ImageAttachment {
    image: Option<LoadedImage>,
}

impl ImageAttachment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the file as the current attachment, replacing any previous one.
    ///
    /// # Errors
    /// - If the file's type is not `image/*`
    /// - If the file cannot be read
    pub fn load(&mut self, path: &Path) -> Result<&LoadedImage> {
        let mime = image_mime_for_path(path)
            .ok_or_else(|| anyhow!("Not an image file: {}", path.display()))?;

        let bytes = std::fs::read(path)
            .map_err(|e| anyhow!("Failed to read {}: {e}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let data_uri = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));
        tracing::debug!("Image attached: {name} ({} bytes, {mime})", bytes.len());

        self.image = Some(LoadedImage {
            name,
            mime,
            byte_size: bytes.len(),
            data_uri,
        });
        Ok(self.image.as_ref().unwrap())
    }

    /// Removes the attachment, resetting to the empty state.
    pub fn remove(&mut self) {
        if self.image.take().is_some() {
            tracing::debug!("Image attachment removed");
        }
    }

    pub fn current(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn recognizes_image_extensions() {
        assert_eq!(image_mime_for_path(Path::new("a.png")), Some("image/png"));
        assert_eq!(image_mime_for_path(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(image_mime_for_path(Path::new("a.txt")), None);
        assert_eq!(image_mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn load_builds_a_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x89, 0x50, 0x4E, 0x47]).unwrap();

        let mut attachment = ImageAttachment::new();
        let image = attachment.load(&path).unwrap();
        assert_eq!(image.mime, "image/png");
        assert_eq!(image.byte_size, 4);
        assert!(image.data_uri().starts_with("data:image/png;base64,"));
        assert_eq!(image.data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn non_image_is_rejected_and_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut attachment = ImageAttachment::new();
        assert!(attachment.load(&path).is_err());
        assert!(attachment.is_empty());
    }

    #[test]
    fn remove_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let mut attachment = ImageAttachment::new();
        attachment.load(&path).unwrap();
        assert!(!attachment.is_empty());

        attachment.remove();
        assert!(attachment.is_empty());
        assert!(attachment.current().is_none());

        // Removing twice is harmless.
        attachment.remove();
    }
}
