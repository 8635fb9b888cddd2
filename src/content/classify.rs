//! # Content Classifier
//!
//! Decides how a content reference is printed. Classification looks only at
//! the reference string, except for `base64://` payloads whose decoded bytes
//! are sniffed for a known signature.
//!
//! ## Rules
//!
//! ```text
//! ""  or absent          → SelfView
//! "<..."                 → Html
//! "scheme://rest"        → MIME probe → Image | Pdf | Unsupported
//! anything else          → Plain
//! ```

use serde::Serialize;

use super::{BASE64_SCHEME, decode_base64};

/// How a content reference is rendered and handed to the print service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Plain text, printed through the web renderer
    Plain,
    /// Inline markup, printed through the web renderer
    Html,
    /// Raster image, printed as a single bitmap page
    Image,
    /// PDF document, streamed to the print service as-is
    Pdf,
    /// A URI whose content cannot be printed
    Unsupported,
    /// No content: print the host view
    SelfView,
}

impl ContentType {
    /// MIME type handed to the renderer for text content.
    pub fn render_mime(&self) -> Option<&'static str> {
        match self {
            ContentType::Html => Some("text/html"),
            ContentType::Plain => Some("text/plain"),
            _ => None,
        }
    }
}

/// Document and image type identifiers the print subsystem can render.
pub const PRINTABLE_TYPES: &[&str] = &[
    "com.adobe.pdf",
    "com.microsoft.bmp",
    "public.jpeg",
    "public.jpeg-2000",
    "public.png",
    "public.heif",
    "com.compuserve.gif",
    "com.microsoft.ico",
];

/// Classify a content reference.
pub fn classify(reference: Option<&str>) -> ContentType {
    let Some(reference) = reference.filter(|r| !r.is_empty()) else {
        return ContentType::SelfView;
    };

    if reference.starts_with('<') {
        return ContentType::Html;
    }

    if !has_scheme(reference) {
        return ContentType::Plain;
    }

    match mime_type(reference) {
        Some(mime) => content_type_for_mime(&mime),
        None => ContentType::Unsupported,
    }
}

/// Probe the MIME type of a URI reference.
///
/// `base64://` payloads are decoded and sniffed; every other scheme is
/// guessed from the trailing path segment. Returns `None` when nothing can
/// be determined, including malformed base64.
pub fn mime_type(reference: &str) -> Option<String> {
    if reference.starts_with(BASE64_SCHEME) {
        let bytes = decode_base64(reference)?;
        return sniff(&bytes).map(str::to_string);
    }

    let segment = trailing_segment(reference);
    mime_guess::from_path(segment)
        .first_raw()
        .map(str::to_string)
}

/// Map a MIME type to the content type the print flow uses for it.
pub fn content_type_for_mime(mime: &str) -> ContentType {
    match mime {
        "image/bmp"
        | "image/png"
        | "image/jpeg"
        | "image/jpeg2000"
        | "image/jp2"
        | "image/gif"
        | "image/x-icon"
        | "image/vnd.microsoft.icon"
        | "image/heif"
        | "image/heic" => ContentType::Image,
        "application/pdf" => ContentType::Pdf,
        _ => ContentType::Unsupported,
    }
}

/// Matches `^[a-z0-9]+://.+`.
fn has_scheme(reference: &str) -> bool {
    match reference.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && !rest.is_empty()
                && scheme
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        }
        None => false,
    }
}

/// Last path segment with any query or fragment removed.
fn trailing_segment(reference: &str) -> &str {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);

    path.rsplit('/').next().unwrap_or(path)
}

/// Identify a payload by its leading bytes.
fn sniff(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }

    if is_heif(bytes) {
        return Some("image/heif");
    }

    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

/// HEIF containers start with a box size followed by `ftyp` and a brand.
pub(crate) fn is_heif(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }

    matches!(
        &data[8..12],
        b"heic" | b"heix" | b"hevc" | b"hevx" | b"heim" | b"heis" | b"hevm" | b"hevs" | b"mif1" | b"msf1"
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::io::Cursor;

    fn png_reference() -> String {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([255, 0, 0]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!("base64://{}", STANDARD.encode(bytes))
    }

    #[test]
    fn test_markup_is_html() {
        assert_eq!(classify(Some("<h1>Hi</h1>")), ContentType::Html);
        assert_eq!(classify(Some("<")), ContentType::Html);
        assert_eq!(classify(Some("<not even markup file:///a.pdf")), ContentType::Html);
    }

    #[test]
    fn test_empty_is_self_view() {
        assert_eq!(classify(None), ContentType::SelfView);
        assert_eq!(classify(Some("")), ContentType::SelfView);
    }

    #[test]
    fn test_text_without_scheme_is_plain() {
        assert_eq!(classify(Some("Hello printer")), ContentType::Plain);
        assert_eq!(classify(Some("HTTP://upper.case/a.pdf")), ContentType::Plain);
        assert_eq!(classify(Some("base64://")), ContentType::Plain);
    }

    #[test]
    fn test_file_references_by_extension() {
        assert_eq!(classify(Some("file:///sdcard/doc.pdf")), ContentType::Pdf);
        assert_eq!(classify(Some("file://img/logo.png")), ContentType::Image);
        assert_eq!(classify(Some("file://img/photo.jpg?v=2")), ContentType::Image);
        assert_eq!(classify(Some("res://drawable/icon.gif")), ContentType::Image);
        assert_eq!(classify(Some("file:///tmp/notes.txt")), ContentType::Unsupported);
    }

    #[test]
    fn test_scheme_without_mime_is_unsupported() {
        assert_eq!(classify(Some("res://icon")), ContentType::Unsupported);
        assert_eq!(classify(Some("abc://")), ContentType::Plain);
        assert_eq!(classify(Some("abc://x")), ContentType::Unsupported);
    }

    #[test]
    fn test_base64_png_is_image() {
        assert_eq!(classify(Some(&png_reference())), ContentType::Image);
    }

    #[test]
    fn test_base64_pdf_is_pdf() {
        let reference = format!("base64://{}", STANDARD.encode(b"%PDF-1.4\n%..."));
        assert_eq!(classify(Some(&reference)), ContentType::Pdf);
    }

    #[test]
    fn test_invalid_base64_is_unsupported() {
        assert_eq!(classify(Some("base64://!!!not-base64!!!")), ContentType::Unsupported);
    }

    #[test]
    fn test_base64_unknown_bytes_is_unsupported() {
        let reference = format!("base64://{}", STANDARD.encode(b"just some text"));
        assert_eq!(classify(Some(&reference)), ContentType::Unsupported);
    }

    #[test]
    fn test_heif_brand_sniffing() {
        let mut data = vec![0, 0, 0, 24];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0; 12]);
        assert!(is_heif(&data));
        assert_eq!(sniff(&data), Some("image/heif"));
        assert!(!is_heif(b"too short"));
    }

    #[test]
    fn test_render_mime() {
        assert_eq!(ContentType::Html.render_mime(), Some("text/html"));
        assert_eq!(ContentType::Plain.render_mime(), Some("text/plain"));
        assert_eq!(ContentType::Pdf.render_mime(), None);
    }
}
