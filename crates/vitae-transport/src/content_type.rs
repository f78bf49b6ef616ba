//! File type classification for downloaded blobs.
//!
//! The aggregator does not reliably report a content type, so classification
//! walks a fixed fallback chain. The chain must stay stable: previously cached
//! blobs were classified with it.
//!
//! 1. transport `Content-Type` header
//! 2. the type the transport attached to the body itself
//! 3. `%PDF` signature on the first four bytes
//! 4. size: over 20,000 bytes is a PDF, anything else an image

use serde::{Deserialize, Serialize};

/// Bodies larger than this many bytes default to PDF when nothing else decides.
pub const PDF_SIZE_THRESHOLD: usize = 20_000;

/// Magic prefix of every PDF file.
pub const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// Coarse kind of a credential file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Image,
}

impl ContentKind {
    /// MIME type recorded for this kind when nothing better is known.
    pub fn mime(self) -> &'static str {
        match self {
            ContentKind::Pdf => "application/pdf",
            ContentKind::Image => "image/jpeg",
        }
    }

    /// File extension used for downloads.
    pub fn extension(self) -> &'static str {
        match self {
            ContentKind::Pdf => "pdf",
            ContentKind::Image => "jpg",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Pdf => write!(f, "pdf"),
            ContentKind::Image => write!(f, "image"),
        }
    }
}

/// Classify a MIME-ish string. Generic or unrelated types are not decisive.
pub fn kind_from_mime(mime: Option<&str>) -> Option<ContentKind> {
    let lower = mime?.trim().to_ascii_lowercase();
    if lower.contains("pdf") {
        Some(ContentKind::Pdf)
    } else if lower.contains("image") {
        Some(ContentKind::Image)
    } else {
        None
    }
}

/// Derive a body type from a `Content-Disposition` filename, if any.
///
/// `attachment; filename="Git_Expert.pdf"` -> `application/pdf`
pub fn mime_from_disposition(disposition: Option<&str>) -> Option<String> {
    let disposition = disposition?;
    let filename = disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    mime_from_file_name(filename).map(str::to_string)
}

/// MIME type for a credential file name, by extension.
pub fn mime_from_file_name(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Resolve the kind of a downloaded body using the fallback chain.
pub fn resolve_content_kind(
    header_type: Option<&str>,
    body_type: Option<&str>,
    bytes: &[u8],
) -> ContentKind {
    if let Some(kind) = kind_from_mime(header_type) {
        return kind;
    }
    if let Some(kind) = kind_from_mime(body_type) {
        return kind;
    }
    if bytes.starts_with(PDF_SIGNATURE) {
        return ContentKind::Pdf;
    }
    if bytes.len() > PDF_SIZE_THRESHOLD {
        ContentKind::Pdf
    } else {
        ContentKind::Image
    }
}

/// Suggested file name for saving a credential's file.
///
/// Whitespace runs become underscores: `"Git Expert"` -> `Git_Expert_walrus.pdf`.
pub fn download_file_name(title: &str, kind: ContentKind) -> String {
    let stem = title.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{}_walrus.{}", stem, kind.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_body(len: usize) -> Vec<u8> {
        let mut body = PDF_SIGNATURE.to_vec();
        body.resize(len, b'x');
        body
    }

    #[test]
    fn test_header_wins() {
        assert_eq!(
            resolve_content_kind(Some("image/png"), None, &pdf_body(30_000)),
            ContentKind::Image
        );
        assert_eq!(
            resolve_content_kind(Some("Application/PDF"), None, b"tiny"),
            ContentKind::Pdf
        );
    }

    #[test]
    fn test_generic_header_falls_through_to_body_type() {
        assert_eq!(
            resolve_content_kind(Some("application/octet-stream"), Some("image/jpeg"), &[0u8; 30_000]),
            ContentKind::Image
        );
    }

    #[test]
    fn test_large_pdf_without_header() {
        assert_eq!(resolve_content_kind(None, None, &pdf_body(20_001)), ContentKind::Pdf);
    }

    #[test]
    fn test_small_body_without_header_is_image() {
        assert_eq!(resolve_content_kind(None, None, &[0xFF, 0xD8, 0xFF, 0xE0]), ContentKind::Image);
        assert_eq!(resolve_content_kind(None, None, &vec![0u8; 19_999]), ContentKind::Image);
    }

    #[test]
    fn test_size_threshold_is_exclusive() {
        assert_eq!(resolve_content_kind(None, None, &vec![0u8; 20_000]), ContentKind::Image);
        assert_eq!(resolve_content_kind(None, None, &vec![0u8; 20_001]), ContentKind::Pdf);
    }

    #[test]
    fn test_small_pdf_signature_is_pdf() {
        assert_eq!(resolve_content_kind(None, None, &pdf_body(512)), ContentKind::Pdf);
    }

    #[test]
    fn test_mime_from_disposition() {
        assert_eq!(
            mime_from_disposition(Some("attachment; filename=\"cert.PDF\"")).as_deref(),
            Some("application/pdf")
        );
        assert_eq!(mime_from_disposition(Some("inline")), None);
        assert_eq!(mime_from_disposition(Some("attachment; filename=notes.txt")), None);
    }

    #[test]
    fn test_mime_from_file_name() {
        assert_eq!(mime_from_file_name("diploma.JPEG"), Some("image/jpeg"));
        assert_eq!(mime_from_file_name("README"), None);
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(
            download_file_name("Professional  Web Developer", ContentKind::Pdf),
            "Professional_Web_Developer_walrus.pdf"
        );
        assert_eq!(download_file_name("Git Expert", ContentKind::Image), "Git_Expert_walrus.jpg");
    }
}
