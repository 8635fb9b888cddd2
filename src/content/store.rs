//! # Asset and Resource Stores
//!
//! `file://` references resolve against the application's bundled asset
//! store and `res://` references against its resource bundle. Both are
//! owned by the host platform; this module defines the seams and ships
//! directory-backed implementations used by the headless backend.
//!
//! ## Resource Lookup
//!
//! ```text
//! res://mipmap/icon.png
//!        ─┬──── ─┬─
//!         │      └── resource name (extension dropped): "icon"
//!         └───────── category hint: "mipmap"
//!
//! search: <hint> → "mipmap" → "drawable"
//! ```

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use super::source::ContentStream;

/// First fallback category for resource lookup.
pub const FALLBACK_CATEGORY: &str = "mipmap";

/// Second fallback category, also the hint when the path has no directory.
pub const DEFAULT_CATEGORY: &str = "drawable";

/// Identifies a resource found in a [`ResourceBundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub category: String,
    pub name: String,
}

/// The application's bundled asset store.
pub trait AssetStore: Send + Sync {
    /// Open the asset at a path relative to the store root.
    fn open(&self, path: &str) -> io::Result<ContentStream>;
}

/// The application's bundled resources, addressed by category and name.
pub trait ResourceBundle: Send + Sync {
    /// Find a resource by name within one category.
    fn lookup(&self, name: &str, category: &str) -> Option<ResourceId>;

    /// Open a previously looked-up resource as a raw byte stream.
    fn open_raw(&self, id: &ResourceId) -> io::Result<ContentStream>;
}

/// Resolve the path part of a `res://` reference to a resource id.
///
/// Tries the hinted category first, then [`FALLBACK_CATEGORY`], then
/// [`DEFAULT_CATEGORY`].
pub fn resolve_resource(bundle: &dyn ResourceBundle, res_path: &str) -> Option<ResourceId> {
    let (hint, file_name) = match res_path.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => (DEFAULT_CATEGORY, res_path),
    };

    let name = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };

    if name.is_empty() {
        return None;
    }

    [hint, FALLBACK_CATEGORY, DEFAULT_CATEGORY]
        .into_iter()
        .find_map(|category| bundle.lookup(name, category))
}

// ============================================================================
// DIRECTORY BACKENDS
// ============================================================================

/// Asset store rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetStore for DirAssets {
    fn open(&self, path: &str) -> io::Result<ContentStream> {
        let relative = Path::new(path.trim_start_matches('/'));

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("Asset path escapes the store: {}", path),
            ));
        }

        let file = File::open(self.root.join(relative))?;
        Ok(Box::new(file))
    }
}

/// Resource bundle laid out as `<root>/<category>/<name>.<ext>`.
#[derive(Debug, Clone)]
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the first file in a category directory whose stem is `name`.
    fn find(&self, name: &str, category: &str) -> Option<PathBuf> {
        if category.contains("..") || category.starts_with('/') {
            return None;
        }

        let mut matches: Vec<PathBuf> = fs::read_dir(self.root.join(category))
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| path.file_stem().is_some_and(|stem| stem == name))
            .collect();

        // read_dir order is unspecified
        matches.sort();
        matches.into_iter().next()
    }
}

impl ResourceBundle for DirResources {
    fn lookup(&self, name: &str, category: &str) -> Option<ResourceId> {
        self.find(name, category).map(|_| ResourceId {
            category: category.to_string(),
            name: name.to_string(),
        })
    }

    fn open_raw(&self, id: &ResourceId) -> io::Result<ContentStream> {
        let path = self.find(&id.name, &id.category).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No resource {}/{}", id.category, id.name),
            )
        })?;

        Ok(Box::new(File::open(path)?))
    }
}

// ============================================================================
// TESTS
// ============================================================================
