//! COCO to tensor converter
//!
//! This library turns a folder of COCO images plus an instances annotation
//! file into flat binary tensor files: stacked fixed-size RGB images, labels
//! of the dominant object, and optionally the original image ids.

pub mod coco;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod io;
pub mod preprocess;
pub mod reader;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use coco::AnnotationIndex;
pub use config::{Args, ConvertConfig, Variant};
pub use dataset::{convert_dataset, convert_with_index};
pub use error::{ConvertError, Result};
pub use reader::{Batch, DatasetReader, HeaderlessReader};
pub use types::ProcessingStats;
