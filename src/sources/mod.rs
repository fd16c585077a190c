/// Page sources
///
/// A book is an ordered list of pages, each one an image file. This module
/// hides where the pages come from:
/// - `directory.rs` - a folder of images
/// - `archive.rs` - a ZIP / CBZ archive
///
/// Sources only hand out raw bytes. Decoding happens in `crate::decode`.

pub mod archive;
pub mod directory;

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub use archive::ZipArchiveSource;
pub use directory::ImageDirectory;

/// Raw content of a single page
#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    /// File name of the page (archive entry name or file path)
    /// Its extension selects the decoder
    pub name: PathBuf,
    /// Encoded image bytes
    pub bytes: Vec<u8>,
}

/// Errors raised while opening a book or reading one of its pages
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported item (expected a folder, .zip or .cbz file): {0}")]
    Unsupported(PathBuf),

    #[error("Page {page} was not found (book has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to start page loader: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Opened item has no parent directory")]
    NoParent,

    #[error("File not found in parent directory")]
    NotInParent,

    #[error("No previous file in parent directory")]
    NoPrevious,

    #[error("No next file in parent directory")]
    NoNext,
}

/// An ordered set of pages that can be loaded independently
///
/// Each loader thread owns its own handle (see `try_clone`), so
/// implementations only need to be `Send`.
pub trait PageSource: Send {
    /// Number of pages in the book
    fn total_pages(&self) -> usize;

    /// Load the raw bytes of a page
    fn load_page(&mut self, page: usize) -> Result<PageData, SourceError>;

    /// Create an independent handle on the same book
    fn try_clone(&self) -> Result<Box<dyn PageSource>, SourceError>;
}

/// Direction used when moving between sibling books
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Check if a path can be opened as a book
pub fn is_openable(path: &Path) -> bool {
    path.is_dir() || ZipArchiveSource::item_matches(path)
}

/// Open a folder or an archive
pub fn open_source(path: &Path) -> Result<Box<dyn PageSource>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    if ImageDirectory::item_matches(path) {
        Ok(Box::new(ImageDirectory::load(path)?))
    } else if ZipArchiveSource::item_matches(path) {
        Ok(Box::new(ZipArchiveSource::load(path)?))
    } else {
        Err(SourceError::Unsupported(path.to_path_buf()))
    }
}

/// Find the previous or next openable item next to `path`
///
/// Siblings are sorted by path so the order is stable across platforms.
pub fn neighbour(path: &Path, direction: Direction) -> Result<PathBuf, SourceError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or(SourceError::NoParent)?;

    let items = list_entries(parent)?
        .into_iter()
        .filter(|item| is_openable(item))
        .collect::<Vec<_>>();

    // The opened item may have been moved since it was opened
    let index = items
        .iter()
        .position(|item| item == path)
        .ok_or(SourceError::NotInParent)?;

    match direction {
        Direction::Previous => index
            .checked_sub(1)
            .map(|i| items[i].clone())
            .ok_or(SourceError::NoPrevious),
        Direction::Next => items.get(index + 1).cloned().ok_or(SourceError::NoNext),
    }
}

/// List the direct children of a directory, sorted by path
pub(crate) fn list_entries(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|err| SourceError::Io {
            path: dir.to_path_buf(),
            source: err.into(),
        })?;
        entries.push(entry.into_path());
    }

    entries.sort();
    Ok(entries)
}

/// Case-insensitive extension check
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };

    let ext = ext.to_string_lossy().to_lowercase();
    extensions.contains(&ext.as_str())
}
