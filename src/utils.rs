use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};

/// Number of digits in a COCO filename's image id.
pub const IMAGE_ID_DIGITS: usize = 12;

/// Extract the image id from a COCO-style filename such as
/// `COCO_train2014_000000123456.jpg`: the 12 characters right before the
/// extension must all be decimal digits.
pub fn image_id_from_filename(path: &Path) -> Result<u64> {
    let invalid = |reason: &str| ConvertError::InvalidFilename {
        file: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| invalid("file name is not valid UTF-8"))?;

    if stem.len() < IMAGE_ID_DIGITS || !stem.is_char_boundary(stem.len() - IMAGE_ID_DIGITS) {
        return Err(invalid("expected a 12-digit image id before the extension"));
    }
    let digits = &stem[stem.len() - IMAGE_ID_DIGITS..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected a 12-digit image id before the extension"));
    }

    digits
        .parse::<u64>()
        .map_err(|_| invalid("image id is not a number"))
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let template = format!(
        "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
        label
    );
    let style = ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Make sure the directory holding an output file exists
pub fn create_parent_directory(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            log::info!("Creating output directory {:?}", parent);
            fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}
