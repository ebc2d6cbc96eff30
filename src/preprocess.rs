//! Image loading and preprocessing.
//!
//! Every image goes through the same steps, in order: decode, make it three
//! channels, center crop to a square, then resize to the target size. The
//! result is f32 RGB in [0, 1], laid out row by row.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, ImageReader, Luma, Rgb, Rgb32FImage};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::types::{record_len, ImageRecord};

/// Decode an image from disk. The format is sniffed from the content, so a
/// mislabeled extension still decodes.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let decode_error = |source| ConvertError::ImageDecode {
        file: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)
}

/// Convert any decoded image to three f32 channels in [0, 1].
///
/// Single-channel (and gray+alpha) images have their gray plane replicated
/// into R, G and B; an alpha channel is dropped.
pub fn to_rgb(img: &DynamicImage) -> Rgb32FImage {
    match img.color().channel_count() {
        1 | 2 => {
            let gray = img.to_luma32f();
            let (width, height) = gray.dimensions();
            ImageBuffer::from_fn(width, height, |x, y| {
                let Luma([v]) = *gray.get_pixel(x, y);
                Rgb([v, v, v])
            })
        }
        _ => img.to_rgb32f(),
    }
}

/// Offset and side length of the centered square inside a `width x height`
/// image. The offset is floored.
pub fn center_square(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    let offset = width.abs_diff(height) / 2;
    if height >= width {
        (0, offset, side)
    } else {
        (offset, 0, side)
    }
}

/// Crop the largest centered square.
pub fn crop_center(img: &Rgb32FImage) -> Rgb32FImage {
    let (width, height) = img.dimensions();
    let (x, y, side) = center_square(width, height);
    imageops::crop_imm(img, x, y, side, side).to_image()
}

/// Resize a square image to `size x size` with a bilinear filter.
pub fn resize_square(img: &Rgb32FImage, size: u32) -> Rgb32FImage {
    if img.dimensions() == (size, size) {
        return img.clone();
    }
    imageops::resize(img, size, size, FilterType::Triangle)
}

/// Run the full preprocessing chain on a decoded image.
pub fn preprocess(img: &DynamicImage, size: u32) -> ImageRecord {
    let rgb = to_rgb(img);
    let square = crop_center(&rgb);
    let resized = resize_square(&square, size);
    let (width, height) = resized.dimensions();
    ImageRecord {
        height,
        width,
        data: resized.into_raw(),
    }
}

/// Decode and preprocess the image at `path`.
pub fn load_and_preprocess(path: &Path, size: u32) -> Result<ImageRecord> {
    let img = load_image(path)?;
    let record = preprocess(&img, size);
    debug_assert_eq!(record.data.len(), record_len(size));
    Ok(record)
}
