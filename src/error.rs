//! Error types for the conversion pipeline.
//!
//! Every variant is fatal: the pipeline stops at the first error and the
//! partially written output files are left as they are.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or reading a tensor dataset.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The annotation JSON could not be opened.
    #[error("failed to open annotation file {path}")]
    AnnotationOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The annotation JSON could not be parsed.
    #[error("failed to parse annotation file {path}")]
    AnnotationLoad {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The image has no usable annotation and the output format has no
    /// background label.
    #[error("no annotation found for image {image_id} ({file})")]
    AnnotationNotFound { file: PathBuf, image_id: u64 },

    /// The filename does not end in a 12-digit image id.
    #[error("invalid image filename {file}: {reason}")]
    InvalidFilename { file: PathBuf, reason: String },

    /// The image could not be opened or decoded.
    #[error("failed to decode image {file}")]
    ImageDecode {
        file: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Writing to one of the output streams failed.
    #[error("failed to write {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input image directory could not be listed.
    #[error("failed to list input directory {path}: {message}")]
    InputDirectory { path: PathBuf, message: String },

    /// The category id cannot be represented by the label encoding.
    #[error("category {category_id} of {file} does not fit the label encoding (max {max})")]
    LabelOutOfRange {
        file: PathBuf,
        category_id: u64,
        max: u64,
    },

    /// The command-line configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A binary dataset file is truncated or its headers disagree.
    #[error("malformed dataset file {path}: {message}")]
    MalformedDataset { path: PathBuf, message: String },
}

impl ConvertError {
    /// Wrap an I/O failure on an output stream.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Report a dataset file that does not match its header.
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedDataset {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConvertError>;
