//! # Content References
//!
//! A content reference is the string a caller hands to `print`. It is one of:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `""` / absent | print the host view as-is |
//! | `<...` | inline markup |
//! | `file:///abs/path.pdf` | absolute filesystem path |
//! | `file://dir/doc.pdf` | bundled application asset (under `www/`) |
//! | `res://category/name.png` | bundled application resource |
//! | `base64://...` | inline base64 payload |
//! | anything else | plain text |
//!
//! ## Modules
//!
//! - [`classify`]: map a reference to a [`ContentType`]
//! - [`source`]: open a reference as a byte stream or decode it to an image
//! - [`store`]: asset and resource lookup backends

pub mod classify;
pub mod source;
pub mod store;

pub use classify::{ContentType, PRINTABLE_TYPES, classify, mime_type};
pub use source::{ContentSource, ContentStream, copy};
pub use store::{AssetStore, DirAssets, DirResources, ResourceBundle, ResourceId};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Scheme prefix for inline base64 payloads.
pub const BASE64_SCHEME: &str = "base64://";

/// Scheme prefix for bundled resources.
pub const RES_SCHEME: &str = "res://";

/// Scheme prefix for absolute filesystem paths.
pub const ABSOLUTE_FILE_SCHEME: &str = "file:///";

/// Scheme prefix for bundled assets.
pub const ASSET_SCHEME: &str = "file://";

/// Standard alphabet, padding optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the payload of a `base64://` reference.
///
/// Whitespace (line breaks from wrapped encoders) is ignored. Returns `None`
/// for anything that is not valid standard base64.
pub(crate) fn decode_base64(reference: &str) -> Option<Vec<u8>> {
    let payload = reference.strip_prefix(BASE64_SCHEME)?;
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    LENIENT_BASE64.decode(compact.as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_with_and_without_padding() {
        assert_eq!(decode_base64("base64://aGk=").as_deref(), Some(&b"hi"[..]));
        assert_eq!(decode_base64("base64://aGk").as_deref(), Some(&b"hi"[..]));
    }

    #[test]
    fn test_decode_base64_ignores_line_breaks() {
        assert_eq!(
            decode_base64("base64://aGVs\nbG8=").as_deref(),
            Some(&b"hello"[..])
        );
    }

    #[test]
    fn test_decode_base64_rejects_garbage() {
        assert_eq!(decode_base64("base64://***"), None);
        assert_eq!(decode_base64("file:///x"), None);
    }
}
