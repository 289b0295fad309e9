use std::fs;
use std::path::Path;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::TaskError;
use crate::markdown::IMAGE_SCHEME;

pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// An image ready to be stored on a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub token: String,
    pub name: String,
    pub data_url: String,
}

impl ImageAttachment {
    pub fn from_bytes(name: &str, bytes: &[u8], max_bytes: usize) -> Result<Self, TaskError> {
        let mime = detect_mime(name, bytes).ok_or_else(|| TaskError::NotAnImage(name.to_string()))?;
        if bytes.len() > max_bytes {
            return Err(TaskError::ImageTooLarge {
                name: name.to_string(),
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        Ok(Self {
            token: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            data_url: format!("data:{mime};base64,{}", STANDARD.encode(bytes)),
        })
    }

    /// Markdown reference appended to the notes.
    pub fn markdown(&self) -> String {
        let alt = self.name.replace(['[', ']'], "");
        format!("![{alt}]({IMAGE_SCHEME}{})", self.token)
    }
}

#[instrument(skip(max_bytes))]
pub fn read_image(path: &Path, max_bytes: usize) -> anyhow::Result<ImageAttachment> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    debug!(file = %path.display(), bytes = bytes.len(), "read image candidate");
    Ok(ImageAttachment::from_bytes(&name, &bytes, max_bytes)?)
}

/// Content sniffing first; SVG has no magic number so it goes by extension.
pub fn detect_mime(name: &str, bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: [(&[u8], &str); 5] = [
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
    ];

    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| bytes.starts_with(magic)) {
        return Some(*mime);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if name.to_ascii_lowercase().ends_with(".svg") {
        return Some("image/svg+xml");
    }
    None
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{ImageAttachment, detect_mime, read_image};
    use crate::error::TaskError;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(detect_mime("a.bin", PNG), Some("image/png"));
        assert_eq!(detect_mime("a", b"\xff\xd8\xff\xe0"), Some("image/jpeg"));
        assert_eq!(detect_mime("a", b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(detect_mime("logo.SVG", b"<svg/>"), Some("image/svg+xml"));
        assert_eq!(detect_mime("notes.txt", b"hello"), None);
    }

    #[test]
    fn builds_data_url_and_reference() {
        let image = ImageAttachment::from_bytes("shot [1].png", PNG, 1024).expect("image");
        assert!(image.data_url.starts_with("data:image/png;base64,iVBORw0KGgo"));
        assert_eq!(image.token.len(), 32);
        assert_eq!(image.markdown(), format!("![shot 1.png](img:{})", image.token));
    }

    #[test]
    fn rejects_non_images_and_oversized_files() {
        assert_eq!(
            ImageAttachment::from_bytes("todo.txt", b"plain", 1024),
            Err(TaskError::NotAnImage("todo.txt".to_string()))
        );
        assert!(matches!(
            ImageAttachment::from_bytes("big.png", PNG, 4),
            Err(TaskError::ImageTooLarge { limit: 4, .. })
        ));
    }

    #[test]
    fn reads_from_disk() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("pic.png");
        fs::write(&path, PNG).expect("write");
        let image = read_image(&path, 1024).expect("read");
        assert_eq!(image.name, "pic.png");

        let text = temp.path().join("readme.md");
        fs::write(&text, "# nope").expect("write");
        let err = read_image(&text, 1024).expect_err("not an image");
        assert_eq!(
            err.downcast_ref::<TaskError>(),
            Some(&TaskError::NotAnImage("readme.md".to_string()))
        );
    }
}
