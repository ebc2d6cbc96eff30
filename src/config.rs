use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};

/// File name of the image tensor stream.
pub const IMAGES_FILE_NAME: &str = "imgdata.dat";
/// File name of the label stream.
pub const LABELS_FILE_NAME: &str = "lbldata.dat";
/// File name of the image id stream (train variant only).
pub const IDS_FILE_NAME: &str = "nmdata.dat";

/// Command-line arguments for converting a COCO image folder into tensor files.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory containing the source images
    #[arg(short = 'p', long = "pic_dir", default_value = "pic/train/")]
    pub pic_dir: String,

    /// Directory containing the COCO instances_<split>.json files
    #[arg(short = 'a', long = "annotations_dir", default_value = "annotations")]
    pub annotations_dir: String,

    /// Split name used to locate the annotation file
    #[arg(long = "data_type", default_value = "train2014")]
    pub data_type: String,

    /// Output layout: 'train' (headers, one-hot labels, ids) or 'test' (raw bytes)
    #[arg(long = "variant", value_enum, default_value = "train")]
    pub variant: Variant,

    /// Side length of the square output images (defaults to 227 for train, 256 for test)
    #[arg(long = "image_size")]
    pub image_size: Option<u32>,

    /// Directory the .dat files are written to
    #[arg(short = 'o', long = "output_dir", default_value = ".")]
    pub output_dir: String,

    /// Refuse to replace output files that already exist
    #[arg(long = "no_overwrite")]
    pub no_overwrite: bool,
}

// The two on-disk layouts
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Variant {
    Train,
    Test,
}

impl Variant {
    pub fn default_image_size(self) -> u32 {
        match self {
            Variant::Train => 227,
            Variant::Test => 256,
        }
    }
}

/// How labels are encoded in the labels stream.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LabelEncoding {
    /// `num_categories + 1` little-endian f32 values, index 0 meaning "no annotation".
    OneHot,
    /// One byte holding the category id.
    RawByte,
}

/// Everything that differs between the train and test layouts.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct OutputFormat {
    pub label_encoding: LabelEncoding,
    pub write_headers: bool,
    pub write_ids: bool,
    /// Images without annotations get the sentinel category 0 instead of failing.
    pub allow_background: bool,
}

impl From<Variant> for OutputFormat {
    fn from(variant: Variant) -> Self {
        match variant {
            Variant::Train => OutputFormat {
                label_encoding: LabelEncoding::OneHot,
                write_headers: true,
                write_ids: true,
                allow_background: true,
            },
            Variant::Test => OutputFormat {
                label_encoding: LabelEncoding::RawByte,
                write_headers: false,
                write_ids: false,
                allow_background: false,
            },
        }
    }
}

/// Resolved configuration handed to the pipeline.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub pic_dir: PathBuf,
    pub annotation_file: PathBuf,
    pub images_path: PathBuf,
    pub labels_path: PathBuf,
    pub ids_path: Option<PathBuf>,
    pub image_size: u32,
    pub format: OutputFormat,
    pub overwrite: bool,
}

impl ConvertConfig {
    /// Build a configuration with the standard output file names under `output_dir`.
    pub fn new(
        pic_dir: impl Into<PathBuf>,
        annotation_file: impl Into<PathBuf>,
        output_dir: &Path,
        variant: Variant,
    ) -> Self {
        let format = OutputFormat::from(variant);
        Self {
            pic_dir: pic_dir.into(),
            annotation_file: annotation_file.into(),
            images_path: output_dir.join(IMAGES_FILE_NAME),
            labels_path: output_dir.join(LABELS_FILE_NAME),
            ids_path: format.write_ids.then(|| output_dir.join(IDS_FILE_NAME)),
            image_size: variant.default_image_size(),
            format,
            overwrite: true,
        }
    }
}

impl Args {
    /// Path of the COCO annotation file for the configured split.
    pub fn annotation_file(&self) -> PathBuf {
        annotation_file_path(Path::new(&self.annotations_dir), &self.data_type)
    }

    /// Validate the arguments and resolve them into a [`ConvertConfig`].
    pub fn to_convert_config(&self) -> Result<ConvertConfig> {
        if self.data_type.trim().is_empty() {
            return Err(ConvertError::InvalidConfig {
                message: "data_type must not be empty".to_string(),
            });
        }

        let mut config = ConvertConfig::new(
            &self.pic_dir,
            self.annotation_file(),
            Path::new(&self.output_dir),
            self.variant,
        );
        if let Some(size) = self.image_size {
            validate_image_size(size)?;
            config.image_size = size;
        }
        config.overwrite = !self.no_overwrite;
        Ok(config)
    }
}

/// `<dir>/instances_<split>.json`
pub fn annotation_file_path(annotations_dir: &Path, data_type: &str) -> PathBuf {
    annotations_dir.join(format!("instances_{}.json", data_type))
}

/// Largest accepted `--image_size`; a record's byte length stays within `u32`.
pub const MAX_IMAGE_SIZE: u32 = 16384;

fn validate_image_size(size: u32) -> Result<()> {
    if size == 0 || size > MAX_IMAGE_SIZE {
        return Err(ConvertError::InvalidConfig {
            message: format!("image_size must be between 1 and {}, got {}", MAX_IMAGE_SIZE, size),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_reproduce_train_layout() {
        let args = Args::parse_from(["coco2tensor"]);
        let config = args.to_convert_config().unwrap();

        assert_eq!(config.pic_dir, PathBuf::from("pic/train/"));
        assert_eq!(
            config.annotation_file,
            PathBuf::from("annotations/instances_train2014.json")
        );
        assert_eq!(config.images_path, PathBuf::from("./imgdata.dat"));
        assert_eq!(config.labels_path, PathBuf::from("./lbldata.dat"));
        assert_eq!(config.ids_path, Some(PathBuf::from("./nmdata.dat")));
        assert_eq!(config.image_size, 227);
        assert_eq!(config.format.label_encoding, LabelEncoding::OneHot);
        assert!(config.format.write_headers);
        assert!(config.overwrite);
    }

    #[test]
    fn test_test_variant_layout() {
        let args = Args::parse_from([
            "coco2tensor",
            "--variant",
            "test",
            "--data_type",
            "val2014",
            "--output_dir",
            "out",
        ]);
        let config = args.to_convert_config().unwrap();

        assert_eq!(config.image_size, 256);
        assert_eq!(config.ids_path, None);
        assert_eq!(config.labels_path, PathBuf::from("out/lbldata.dat"));
        assert_eq!(config.format.label_encoding, LabelEncoding::RawByte);
        assert!(!config.format.write_headers);
        assert!(!config.format.allow_background);
    }

    #[test]
    fn test_image_size_override_is_validated() {
        let args = Args::parse_from(["coco2tensor", "--image_size", "64"]);
        assert_eq!(args.to_convert_config().unwrap().image_size, 64);

        for size in ["0", "40000"] {
            let args = Args::parse_from(["coco2tensor", "--image_size", size]);
            assert!(matches!(
                args.to_convert_config(),
                Err(ConvertError::InvalidConfig { .. })
            ));
        }

        let args = Args::parse_from(["coco2tensor", "--image_size", "16384"]);
        assert_eq!(args.to_convert_config().unwrap().image_size, MAX_IMAGE_SIZE);
    }
}
