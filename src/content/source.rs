//! # Content Opener/Decoder
//!
//! Turns a content reference into bytes. PDFs and other documents are opened
//! as a raw [`ContentStream`]; images are decoded into a [`DynamicImage`].
//!
//! ## Resolution
//!
//! | Prefix | Source |
//! |--------|--------|
//! | `res://` | [`ResourceBundle`], hinted category then fallbacks |
//! | `file:///` | absolute filesystem path |
//! | `file://` | [`AssetStore`], `file:/` replaced by the asset base directory |
//! | `base64://` | decoded payload held in memory |
//!
//! Every failure resolves to `None`. Streams close when dropped, so every
//! exit path releases the underlying descriptor.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use image::DynamicImage;
use tracing::debug;

use super::store::{self, AssetStore, ResourceBundle};
use super::{ABSOLUTE_FILE_SCHEME, ASSET_SCHEME, BASE64_SCHEME, RES_SCHEME, decode_base64};
#[cfg(any(feature = "heif", test))]
use crate::error::{PrintError, PrintResult};

/// An open, readable content stream.
pub type ContentStream = Box<dyn Read + Send>;

/// Default directory that `file://` references resolve into.
pub const DEFAULT_ASSET_BASE: &str = "www";

/// Chunk size used by [`copy`].
pub const COPY_CHUNK_SIZE: usize = 4096;

/// Opens and decodes content references against the app's asset store and
/// resource bundle.
#[derive(Clone)]
pub struct ContentSource {
    assets: Arc<dyn AssetStore>,
    resources: Arc<dyn ResourceBundle>,
    asset_base: String,
}

impl ContentSource {
    pub fn new(assets: Arc<dyn AssetStore>, resources: Arc<dyn ResourceBundle>) -> Self {
        Self {
            assets,
            resources,
            asset_base: DEFAULT_ASSET_BASE.to_string(),
        }
    }

    /// Directory substituted for `file:/` when resolving bundled assets.
    pub fn with_asset_base(mut self, base: impl Into<String>) -> Self {
        self.asset_base = base.into();
        self
    }

    /// Open a `res://`, `file:///`, `file://` or `base64://` reference.
    ///
    /// Returns `None` when the reference has none of those prefixes or its
    /// target cannot be opened.
    pub fn open(&self, reference: &str) -> Option<ContentStream> {
        if let Some(res_path) = reference.strip_prefix(RES_SCHEME) {
            self.open_resource(res_path)
        } else if reference.starts_with(ABSOLUTE_FILE_SCHEME) {
            open_file(&reference[ASSET_SCHEME.len()..])
        } else if reference.starts_with(ASSET_SCHEME) {
            self.open_asset(reference)
        } else if reference.starts_with(BASE64_SCHEME) {
            decode_base64(reference).map(|bytes| Box::new(Cursor::new(bytes)) as ContentStream)
        } else {
            None
        }
    }

    /// Decode a reference into an image.
    ///
    /// Uses the same resolution as [`open`](Self::open); a reference without
    /// a known prefix is treated as a literal filesystem path.
    pub fn decode(&self, reference: &str) -> Option<DynamicImage> {
        let bytes = if has_known_prefix(reference) {
            let mut stream = self.open(reference)?;
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes).ok()?;
            bytes
        } else {
            fs::read(reference).ok()?
        };

        decode_image(&bytes)
    }

    fn open_resource(&self, res_path: &str) -> Option<ContentStream> {
        let id = store::resolve_resource(self.resources.as_ref(), res_path)?;

        match self.resources.open_raw(&id) {
            Ok(stream) => Some(stream),
            Err(e) => {
                debug!(category = %id.category, name = %id.name, error = %e, "Resource open failed");
                None
            }
        }
    }

    fn open_asset(&self, reference: &str) -> Option<ContentStream> {
        let path = reference.replacen("file:/", &self.asset_base, 1);

        match self.assets.open(&path) {
            Ok(stream) => Some(stream),
            Err(e) => {
                debug!(path = %path, error = %e, "Asset open failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSource")
            .field("asset_base", &self.asset_base)
            .finish_non_exhaustive()
    }
}

/// Drain `input` into `output` in fixed-size chunks.
///
/// The output is flushed and closed once the input is exhausted. Any read or
/// write failure is returned as-is; the caller decides how to report it.
/// Both streams are dropped on every path.
pub fn copy<R: Read, W: Write>(mut input: R, mut output: W) -> io::Result<u64> {
    let mut buf = [0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let read = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        output.write_all(&buf[..read])?;
        total += read as u64;
    }

    output.flush()?;
    drop(output);

    Ok(total)
}

fn has_known_prefix(reference: &str) -> bool {
    [RES_SCHEME, ASSET_SCHEME, BASE64_SCHEME]
        .iter()
        .any(|prefix| reference.starts_with(prefix))
}

fn open_file(path: &str) -> Option<ContentStream> {
    match File::open(path) {
        Ok(file) => Some(Box::new(file)),
        Err(e) => {
            debug!(path = %path, error = %e, "File open failed");
            None
        }
    }
}

/// Decode image bytes, HEIF included when the `heif` feature is enabled.
fn decode_image(bytes: &[u8]) -> Option<DynamicImage> {
    #[cfg(feature = "heif")]
    if super::classify::is_heif(bytes) {
        return match decode_heif(bytes) {
            Ok(img) => Some(img),
            Err(e) => {
                debug!(error = %e, "HEIF decode failed");
                None
            }
        };
    }

    match image::load_from_memory(bytes) {
        Ok(img) => Some(img),
        Err(e) => {
            debug!(error = %e, len = bytes.len(), "Image decode failed");
            None
        }
    }
}

/// Decode the primary image of a HEIF container as RGB.
#[cfg(feature = "heif")]
fn decode_heif(data: &[u8]) -> PrintResult<DynamicImage> {
    use libheif_rs::{ColorSpace, HeifContext, HeifError, LibHeif, RgbChroma};

    let heif = |e: HeifError| PrintError::Image(format!("HEIF: {}", e));

    let ctx = HeifContext::read_from_bytes(data).map_err(heif)?;
    let handle = ctx.primary_image_handle().map_err(heif)?;
    let decoded = LibHeif::new()
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heif)?;

    let plane = decoded
        .planes()
        .interleaved
        .ok_or_else(|| PrintError::Image("HEIF has no interleaved RGB plane".to_string()))?;

    rgb_from_rows(decoded.width(), decoded.height(), plane.stride, plane.data)
}

/// Packed RGB image from rows `stride` bytes apart.
#[cfg(any(feature = "heif", test))]
fn rgb_from_rows(width: u32, height: u32, stride: usize, data: &[u8]) -> PrintResult<DynamicImage> {
    let row_len = width as usize * 3;
    if stride == 0 || stride < row_len {
        return Err(PrintError::Image(format!(
            "Row stride {} shorter than {} pixels",
            stride, width
        )));
    }

    let pixels: Vec<u8> = data
        .chunks(stride)
        .take(height as usize)
        .filter(|row| row.len() >= row_len)
        .flat_map(|row| &row[..row_len])
        .copied()
        .collect();

    image::RgbImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| PrintError::Image(format!("Truncated {}x{} pixel data", width, height)))
}

// ============================================================================
// TESTS
// ============================================================================
