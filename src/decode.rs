/// Page image decoding
///
/// Pages are stored encoded (see `crate::loader`) and only decoded when
/// they are about to be displayed. The decoder is picked from the page's
/// file extension, never sniffed from the content.

use image::ImageFormat;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::sources::PageData;

/// Supported page formats, by extension
const IMAGE_FORMATS: [(&str, ImageFormat); 3] = [
    ("png", ImageFormat::Png),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported image type: {0}")]
    Unsupported(String),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// A page ready to be uploaded as a texture
#[derive(Clone, PartialEq)]
pub struct DecodedPage {
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixels, row-major
    pub rgba: Vec<u8>,
}

impl fmt::Debug for DecodedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedPage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

fn format_for(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();

    IMAGE_FORMATS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, format)| *format)
}

/// Check if a file can be displayed as a page
pub fn is_supported_image(path: &Path) -> bool {
    format_for(path).is_some()
}

/// Decode a page to RGBA8
pub fn decode_page(page: &PageData) -> Result<DecodedPage, DecodeError> {
    let format = format_for(&page.name)
        .ok_or_else(|| DecodeError::Unsupported(page.name.display().to_string()))?;

    let img = image::load_from_memory_with_format(&page.bytes, format)?;
    let rgba = img.into_rgba8();

    Ok(DecodedPage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Decode a page off the UI thread
pub async fn decode_page_async(page: Arc<PageData>) -> Result<DecodedPage, String> {
    // Spawn blocking because decoding large scans is CPU-intensive
    tokio::task::spawn_blocking(move || decode_page(&page).map_err(|err| err.to_string()))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 40) as u8, (y * 40) as u8, 200])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn page(name: &str, bytes: Vec<u8>) -> PageData {
        PageData {
            name: PathBuf::from(name),
            bytes,
        }
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_image(Path::new("01.png")));
        assert!(is_supported_image(Path::new("dir/02.JPG")));
        assert!(is_supported_image(Path::new("03.Jpeg")));
        assert!(!is_supported_image(Path::new("04.gif")));
        assert!(!is_supported_image(Path::new("png")));
    }

    #[test]
    fn test_decode_png() {
        let decoded = decode_page(&page("01.png", encoded(3, 5, ImageFormat::Png))).unwrap();

        assert_eq!((decoded.width, decoded.height), (3, 5));
        assert_eq!(decoded.rgba.len(), 3 * 5 * 4);
        // Top-left pixel, alpha added by the conversion
        assert_eq!(&decoded.rgba[..4], &[0, 0, 200, 255]);
    }

    #[test]
    fn test_decode_jpeg() {
        let decoded = decode_page(&page("01.jpg", encoded(8, 4, ImageFormat::Jpeg))).unwrap();
        assert_eq!((decoded.width, decoded.height), (8, 4));
        assert_eq!(decoded.rgba.len(), 8 * 4 * 4);
    }

    #[test]
    fn test_extension_selects_decoder() {
        // PNG bytes behind a JPEG name must not be sniffed
        let result = decode_page(&page("01.jpg", encoded(2, 2, ImageFormat::Png)));
        assert!(matches!(result, Err(DecodeError::Image(_))));
    }

    #[test]
    fn test_unsupported_type() {
        let result = decode_page(&page("01.bmp", vec![0; 16]));
        assert!(matches!(result, Err(DecodeError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_decode_async_reports_errors() {
        let result = decode_page_async(Arc::new(page("broken.png", vec![1, 2, 3]))).await;
        assert!(result.unwrap_err().starts_with("Failed to decode image"));
    }
}
