//! Content-based format detection that ignores the claimed file extension.

use serde::{Deserialize, Serialize};

use crate::source::SourceFile;

/// Bytes inspected for binary signatures.
pub const SIGNATURE_LEN: usize = 16;
/// Bytes inspected for a textual `<svg` opening.
pub const TEXT_PREFIX_LEN: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DetectedFormat {
    Jpg,
    Png,
    Gif,
    Bmp,
    Tiff,
    Pdf,
    Psd,
    Webp,
    Avif,
    Heic,
    Svg,
    Unknown,
}

impl DetectedFormat {
    /// Lowercase format token, e.g. `"png"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedFormat::Jpg => "jpg",
            DetectedFormat::Png => "png",
            DetectedFormat::Gif => "gif",
            DetectedFormat::Bmp => "bmp",
            DetectedFormat::Tiff => "tiff",
            DetectedFormat::Pdf => "pdf",
            DetectedFormat::Psd => "psd",
            DetectedFormat::Webp => "webp",
            DetectedFormat::Avif => "avif",
            DetectedFormat::Heic => "heic",
            DetectedFormat::Svg => "svg",
            DetectedFormat::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, DetectedFormat::Unknown)
    }
}

impl std::fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the real format of `file`. Read failures yield `Unknown`.
pub async fn sniff(file: &dyn SourceFile) -> DetectedFormat {
    let head = match file.read_prefix(SIGNATURE_LEN).await {
        Ok(head) => head,
        Err(e) => {
            tracing::debug!(file = file.name(), error = %e, "signature read failed");
            return DetectedFormat::Unknown;
        }
    };

    if let Some(format) = match_signature(&head) {
        return format;
    }
    if head.len() < 4 {
        return DetectedFormat::Unknown;
    }

    match file.read_prefix(TEXT_PREFIX_LEN).await {
        Ok(prefix) => match_svg_text(&prefix),
        Err(e) => {
            tracing::debug!(file = file.name(), error = %e, "text prefix read failed");
            DetectedFormat::Unknown
        }
    }
}

/// Synchronous variant over already-read bytes: `head` holds at least the
/// first 16 bytes when available, `text_prefix` the first 256.
pub fn sniff_bytes(head: &[u8], text_prefix: &[u8]) -> DetectedFormat {
    if let Some(format) = match_signature(head) {
        return format;
    }
    if head.len() < 4 {
        return DetectedFormat::Unknown;
    }
    match_svg_text(text_prefix)
}

fn match_signature(b: &[u8]) -> Option<DetectedFormat> {
    if b.len() < 4 {
        return None;
    }

    let format = match b {
        [0xFF, 0xD8, 0xFF, ..] => DetectedFormat::Jpg,
        [0x89, b'P', b'N', b'G', ..] => DetectedFormat::Png,
        [b'G', b'I', b'F', b'8', ..] => DetectedFormat::Gif,
        [b'B', b'M', ..] => DetectedFormat::Bmp,
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => DetectedFormat::Tiff,
        [b'%', b'P', b'D', b'F', ..] => DetectedFormat::Pdf,
        [b'8', b'B', b'P', b'S', ..] => DetectedFormat::Psd,
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => DetectedFormat::Webp,
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..] if brand.len() >= 4 => {
            match &brand[..4] {
                b"avif" | b"avis" => DetectedFormat::Avif,
                _ => DetectedFormat::Heic,
            }
        }
        _ => return None,
    };
    Some(format)
}

fn match_svg_text(prefix: &[u8]) -> DetectedFormat {
    let text = String::from_utf8_lossy(prefix);
    let text = text.strip_prefix('\u{feff}').unwrap_or(text.as_ref());
    let trimmed = text.trim_start();

    if trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg")) {
        DetectedFormat::Svg
    } else {
        DetectedFormat::Unknown
    }
}
