use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::decode::is_supported_image;

use super::{has_extension, PageData, PageSource, SourceError};

/// Extensions handled as archives
const ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "cbz"];

/// ZIP / CBZ archive, one page per image entry
pub struct ZipArchiveSource {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
    /// Entry index of each page, in reading order
    page_entries: Vec<usize>,
}

impl ZipArchiveSource {
    pub fn item_matches(path: &Path) -> bool {
        path.is_file() && has_extension(path, &ARCHIVE_EXTENSIONS)
    }

    /// Open an archive and index its image entries
    /// Entries are sorted by name, nested folders are allowed
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let mut archive = open_archive(path)?;
        let mut pages = Vec::new();

        for i in 0..archive.len() {
            let item = archive.by_index(i).map_err(|source| SourceError::Archive {
                path: path.to_path_buf(),
                source,
            })?;

            if !item.is_file() {
                continue;
            }

            // Skip entries escaping the archive root ("../x.png", absolute paths)
            let Some(item_path) = item.enclosed_name() else {
                continue;
            };
            let item_path = item_path.to_path_buf();

            if is_supported_image(&item_path) {
                pages.push((i, item_path));
            }
        }

        pages.sort_by(|(_, a), (_, b)| a.cmp(b));

        tracing::debug!("Found {} pages in archive {}", pages.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            page_entries: pages.into_iter().map(|(i, _)| i).collect(),
        })
    }

    fn archive_error(&self, source: zip::result::ZipError) -> SourceError {
        SourceError::Archive {
            path: self.path.clone(),
            source,
        }
    }
}

impl PageSource for ZipArchiveSource {
    fn total_pages(&self) -> usize {
        self.page_entries.len()
    }

    fn load_page(&mut self, page: usize) -> Result<PageData, SourceError> {
        let entry = *self
            .page_entries
            .get(page)
            .ok_or(SourceError::PageOutOfRange {
                page,
                total: self.page_entries.len(),
            })?;

        let mut file = self
            .archive
            .by_index(entry)
            .map_err(|source| SourceError::Archive {
                path: self.path.clone(),
                source,
            })?;

        let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut bytes).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(PageData {
            name: file.mangled_name(),
            bytes,
        })
    }

    /// Re-open the archive so each loader thread decompresses on its own handle
    fn try_clone(&self) -> Result<Box<dyn PageSource>, SourceError> {
        let archive = open_archive(&self.path)?;

        if archive.len() != self.archive.len() {
            return Err(self.archive_error(zip::result::ZipError::InvalidArchive(
                "Archive changed on disk".into(),
            )));
        }

        Ok(Box::new(Self {
            path: self.path.clone(),
            archive,
            page_entries: self.page_entries.clone(),
        }))
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    ZipArchive::new(BufReader::new(file)).map_err(|source| SourceError::Archive {
        path: path.to_path_buf(),
        source,
    })
}
