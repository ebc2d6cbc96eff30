use std::collections::HashSet;
use std::sync::OnceLock;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "jpeg", "jpg", "png", "pnm", "ppm", "pgm", "tif", "tiff", "webp",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Channels per pixel in every image record.
pub const CHANNELS: u32 = 3;

/// Number of f32 values in a `size x size` image record.
pub fn record_len(size: u32) -> usize {
    size as usize * size as usize * CHANNELS as usize
}

/// A preprocessed image: `size x size x 3` f32 values in [0, 1], row-major HWC.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub height: u32,
    pub width: u32,
    pub data: Vec<f32>,
}

/// Label of a single image in one of the two encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelRecord {
    OneHot(Vec<f32>),
    RawByte(u8),
}

impl LabelRecord {
    /// Category index this label encodes.
    pub fn category(&self) -> usize {
        match self {
            LabelRecord::OneHot(values) => values.iter().position(|&v| v == 1.0).unwrap_or(0),
            LabelRecord::RawByte(value) => *value as usize,
        }
    }
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub images_written: usize,
    pub background_images: usize,
    pub unlisted_images: usize,
    pub skipped_files: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_written(&mut self) {
        self.images_written += 1;
    }

    pub fn increment_background(&mut self) {
        self.background_images += 1;
    }

    pub fn increment_unlisted(&mut self) {
        self.unlisted_images += 1;
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Images written: {}", self.images_written);
        log::info!(
            "Background images (no annotation): {}",
            self.background_images
        );
        log::info!("Skipped non-image files: {}", self.skipped_files);

        if self.unlisted_images > 0 {
            log::warn!(
                "{} images were not listed in the annotation file",
                self.unlisted_images
            );
        }
    }
}
