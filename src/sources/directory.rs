use std::fs;
use std::path::{Path, PathBuf};

use crate::decode::is_supported_image;

use super::{list_entries, PageData, PageSource, SourceError};

/// A folder of images, one page per file
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    image_files: Vec<PathBuf>,
}

impl ImageDirectory {
    pub fn item_matches(path: &Path) -> bool {
        path.is_dir()
    }

    /// Scan a folder for pages
    /// Sub-folders are not traversed, pages are sorted by file name
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let image_files = list_entries(path)?
            .into_iter()
            .filter(|item| item.is_file() && is_supported_image(item))
            .collect::<Vec<_>>();

        tracing::debug!(
            "Found {} pages in folder {}",
            image_files.len(),
            path.display()
        );

        Ok(Self { image_files })
    }
}

impl PageSource for ImageDirectory {
    fn total_pages(&self) -> usize {
        self.image_files.len()
    }

    fn load_page(&mut self, page: usize) -> Result<PageData, SourceError> {
        let page_path = self
            .image_files
            .get(page)
            .ok_or(SourceError::PageOutOfRange {
                page,
                total: self.image_files.len(),
            })?;

        let bytes = fs::read(page_path).map_err(|source| SourceError::Io {
            path: page_path.clone(),
            source,
        })?;

        Ok(PageData {
            name: page_path.clone(),
            bytes,
        })
    }

    fn try_clone(&self) -> Result<Box<dyn PageSource>, SourceError> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pages_are_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("02.jpg"), b"two").unwrap();
        fs::write(root.join("01.PNG"), b"one").unwrap();
        fs::write(root.join("03.jpeg"), b"three").unwrap();
        fs::write(root.join("info.txt"), b"skip").unwrap();
        fs::create_dir(root.join("extras.png")).unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("00.png"), b"hidden").unwrap();

        let mut source = ImageDirectory::load(root).unwrap();
        assert_eq!(source.total_pages(), 3);

        let first = source.load_page(0).unwrap();
        assert_eq!(first.name, root.join("01.PNG"));
        assert_eq!(first.bytes, b"one");

        let last = source.load_page(2).unwrap();
        assert_eq!(last.bytes, b"three");
    }

    #[test]
    fn test_empty_folder_is_a_valid_book() {
        let dir = tempdir().unwrap();
        let source = ImageDirectory::load(dir.path()).unwrap();
        assert_eq!(source.total_pages(), 0);
    }

    #[test]
    fn test_out_of_range_page() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("01.png"), b"one").unwrap();

        let mut source = ImageDirectory::load(dir.path()).unwrap();
        let err = source.load_page(5).unwrap_err();
        assert!(matches!(err, SourceError::PageOutOfRange { page: 5, total: 1 }));
    }

    #[test]
    fn test_page_deleted_after_scan() {
        let dir = tempdir().unwrap();
        let page = dir.path().join("01.png");
        fs::write(&page, b"one").unwrap();

        let mut source = ImageDirectory::load(dir.path()).unwrap();
        fs::remove_file(&page).unwrap();

        assert!(matches!(source.load_page(0), Err(SourceError::Io { .. })));
    }
}
