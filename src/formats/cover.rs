//! Cover image decoding and re-encoding for the document backends.

use crate::error::{AppError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Covers wider than this are scaled down before embedding.
pub const MAX_COVER_WIDTH: u32 = 1600;

/// JPEG quality used for PDF covers (1-100).
pub const JPEG_QUALITY: u8 = 90;

/// A decoded cover image.
#[derive(Debug, Clone)]
pub struct CoverImage {
    image: DynamicImage,
}

impl CoverImage {
    /// Decode fetched cover bytes, guessing the format from content.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| AppError::cover(format!("Failed to read cover image: {}", e)))?
            .decode()
            .map_err(|e| AppError::cover(format!("Failed to decode cover image: {}", e)))?;

        if img.width() == 0 || img.height() == 0 {
            return Err(AppError::cover("Cover image has no pixels"));
        }

        let img = if img.width() > MAX_COVER_WIDTH {
            let scale = MAX_COVER_WIDTH as f32 / img.width() as f32;
            let new_height = ((img.height() as f32 * scale) as u32).max(1);
            img.resize(
                MAX_COVER_WIDTH,
                new_height,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            img
        };

        Ok(Self { image: img })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode as PNG for the DOCX media part.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut png_data = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| AppError::cover(format!("Failed to encode PNG: {}", e)))?;
        Ok(png_data)
    }

    /// Encode as baseline RGB JPEG for a `DCTDecode` image stream.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
        let mut jpeg_data = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_data, JPEG_QUALITY);
        encoder
            .encode_image(&rgb)
            .map_err(|e| AppError::cover(format!("Failed to encode JPEG: {}", e)))?;
        Ok(jpeg_data)
    }

    /// Largest size with this image's aspect ratio that fits the box.
    pub fn fit_within(&self, max_width: f32, max_height: f32) -> (f32, f32) {
        let (w, h) = (self.width() as f32, self.height() as f32);
        let scale = (max_width / w).min(max_height / h);
        (w * scale, h * scale)
    }
}
