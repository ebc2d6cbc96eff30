use log::{info, warn};
use std::path::Path;

use crate::coco::AnnotationIndex;
use crate::config::{ConvertConfig, LabelEncoding};
use crate::conversion::{one_hot_len, resolve_label, BACKGROUND_CATEGORY};
use crate::error::{ConvertError, Result};
use crate::io::{list_image_files, TensorWriter};
use crate::preprocess::load_and_preprocess;
use crate::types::{LabelRecord, ProcessingStats};
use crate::utils::{create_progress_bar, image_id_from_filename};

/// Number of values in each label record.
pub fn label_slots(index: &AnnotationIndex, encoding: LabelEncoding) -> Result<usize> {
    match encoding {
        LabelEncoding::OneHot => {
            one_hot_len(index.num_categories()).ok_or_else(|| ConvertError::InvalidConfig {
                message: format!(
                    "largest category id {} is too large for a one-hot label",
                    index.num_categories()
                ),
            })
        }
        LabelEncoding::RawByte => Ok(1),
    }
}

/// Convert a single image file and append it to the writer
pub fn process_image(
    path: &Path,
    index: &AnnotationIndex,
    config: &ConvertConfig,
    writer: &mut TensorWriter,
    stats: &mut ProcessingStats,
) -> Result<()> {
    let image_id = image_id_from_filename(path)?;
    if !index.contains_image(image_id) {
        warn!("Image {} ({:?}) is not listed in the annotation file", image_id, path);
        stats.increment_unlisted();
    }

    let label = resolve_label(index, path, image_id, &config.format)?;
    if matches!(&label, LabelRecord::OneHot(_)) && label.category() == BACKGROUND_CATEGORY as usize {
        stats.increment_background();
    }

    let image = load_and_preprocess(path, config.image_size)?;
    writer.append(image_id, &image, &label)?;
    stats.increment_written();
    Ok(())
}

/// Convert every image under `config.pic_dir` using an already loaded index.
///
/// Stops at the first error; files written so far are left truncated.
pub fn convert_with_index(config: &ConvertConfig, index: &AnnotationIndex) -> Result<ProcessingStats> {
    let listing = list_image_files(&config.pic_dir)?;
    info!(
        "Found {} images in {:?}",
        listing.files.len(),
        config.pic_dir
    );

    let mut stats = ProcessingStats::new();
    stats.skipped_files = listing.skipped;

    let mut writer = TensorWriter::create(
        config,
        listing.files.len(),
        label_slots(index, config.format.label_encoding)?,
    )?;

    let pb = create_progress_bar(listing.files.len() as u64, "Convert");
    for path in &listing.files {
        if let Err(e) = process_image(path, index, config, &mut writer, &mut stats) {
            pb.abandon();
            return Err(e);
        }
        pb.inc(1);
    }
    pb.finish_with_message("Conversion complete");

    writer.finish()?;
    Ok(stats)
}

/// Main conversion pipeline: load annotations, convert images, close outputs.
pub fn convert_dataset(config: &ConvertConfig) -> Result<ProcessingStats> {
    info!("Loading annotations from {:?}", config.annotation_file);
    let index = AnnotationIndex::load(&config.annotation_file)?;
    info!(
        "Indexed annotations (largest category id {})",
        index.num_categories()
    );

    let stats = convert_with_index(config, &index)?;
    stats.print_summary();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;

    const HUGE_CATEGORY: &str =
        r#"{"images": [], "annotations": [], "categories": [{"id": 18446744073709551615, "name": "x"}]}"#;

    #[test]
    fn test_label_slots() {
        let index = AnnotationIndex::from_reader(
            r#"{"categories": [{"id": 90, "name": "toothbrush"}]}"#.as_bytes(),
        )
        .unwrap();
        assert_eq!(label_slots(&index, LabelEncoding::OneHot).unwrap(), 91);
        assert_eq!(label_slots(&index, LabelEncoding::RawByte).unwrap(), 1);
    }

    #[test]
    fn test_huge_category_id_fails_before_writing() {
        let index = AnnotationIndex::from_reader(HUGE_CATEGORY.as_bytes()).unwrap();
        assert!(matches!(
            label_slots(&index, LabelEncoding::OneHot),
            Err(ConvertError::InvalidConfig { .. })
        ));

        let temp_dir = tempfile::tempdir().unwrap();
        let pic_dir = temp_dir.path().join("pic");
        std::fs::create_dir(&pic_dir).unwrap();
        let output_dir = temp_dir.path().join("out");
        let config = ConvertConfig::new(&pic_dir, "unused.json", &output_dir, Variant::Train);

        let err = convert_with_index(&config, &index).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig { .. }));
        assert!(!config.images_path.exists());
    }
}
