use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use glob::{glob, Pattern};
use log::{info, warn};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::{ConvertConfig, LabelEncoding};
use crate::error::{ConvertError, Result};
use crate::types::{get_image_extensions_set, record_len, ImageRecord, LabelRecord, CHANNELS};
use crate::utils::create_parent_directory;

/// Image files found in the input directory, in lexicographic order
#[derive(Debug, Default)]
pub struct ImageListing {
    pub files: Vec<PathBuf>,
    pub skipped: usize,
}

/// List the image files directly inside `dir`. Entries whose extension is not
/// a supported image format are skipped with a warning.
pub fn list_image_files(dir: &Path) -> Result<ImageListing> {
    let dir_error = |message: String| ConvertError::InputDirectory {
        path: dir.to_path_buf(),
        message,
    };

    if !dir.is_dir() {
        return Err(dir_error("not a directory".to_string()));
    }

    let pattern = format!("{}/*", Pattern::escape(&dir.to_string_lossy()));
    let entries = glob(&pattern).map_err(|e| dir_error(e.to_string()))?;

    let extensions = get_image_extensions_set();
    let mut listing = ImageListing::default();
    for entry in entries {
        let path = entry.map_err(|e| dir_error(e.to_string()))?;
        if !path.is_file() {
            continue;
        }
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext.to_lowercase()));
        if is_image {
            listing.files.push(path);
        } else {
            warn!("Skipping non-image file {:?}", path);
            listing.skipped += 1;
        }
    }
    Ok(listing)
}

/// A buffered output file that remembers its path for error reporting
struct OutputStream {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl OutputStream {
    fn create(path: &Path, overwrite: bool) -> Result<Self> {
        let wrap = |e| ConvertError::io_write(path, e);
        create_parent_directory(path).map_err(wrap)?;
        let file = if overwrite {
            File::create(path)
        } else {
            OpenOptions::new().write(true).create_new(true).open(path)
        }
        .map_err(wrap)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn write_i32s(&mut self, values: &[i32]) -> Result<()> {
        for &value in values {
            self.writer
                .write_i32::<LittleEndian>(value)
                .map_err(|e| ConvertError::io_write(&self.path, e))?;
        }
        Ok(())
    }

    fn write_f32s(&mut self, values: &[f32], scratch: &mut Vec<u8>) -> Result<()> {
        scratch.resize(values.len() * 4, 0);
        LittleEndian::write_f32_into(values, scratch);
        self.writer
            .write_all(scratch)
            .map_err(|e| ConvertError::io_write(&self.path, e))
    }

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer
            .write_u8(value)
            .map_err(|e| ConvertError::io_write(&self.path, e))
    }

    fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| ConvertError::io_write(&self.path, e))
    }
}

/// Appends image, label and id records to the output files in lockstep.
///
/// With headers enabled the images file starts with
/// `[num_images, size, size, 3]` and the labels file with
/// `[num_label_slots]`, all little-endian i32. The ids file never has a header.
pub struct TensorWriter {
    images: OutputStream,
    labels: OutputStream,
    ids: Option<OutputStream>,
    image_size: u32,
    label_encoding: LabelEncoding,
    num_label_slots: usize,
    scratch: Vec<u8>,
    records_written: usize,
}

impl TensorWriter {
    /// Open (and truncate, unless the config forbids it) all output files and
    /// write their headers.
    pub fn create(config: &ConvertConfig, num_images: usize, num_label_slots: usize) -> Result<Self> {
        let to_i32 = |value: usize, what: &str| {
            i32::try_from(value).map_err(|_| ConvertError::InvalidConfig {
                message: format!("{} {} does not fit the i32 header", what, value),
            })
        };
        let header_images = to_i32(num_images, "image count")?;
        let header_slots = to_i32(num_label_slots, "label length")?;
        let size = to_i32(config.image_size as usize, "image size")?;

        let mut images = OutputStream::create(&config.images_path, config.overwrite)?;
        let mut labels = OutputStream::create(&config.labels_path, config.overwrite)?;
        let ids = config
            .ids_path
            .as_deref()
            .map(|path| OutputStream::create(path, config.overwrite))
            .transpose()?;

        if config.format.write_headers {
            let image_header = [header_images, size, size, CHANNELS as i32];
            info!("Images header: {:?}", image_header);
            images.write_i32s(&image_header)?;
            info!("Labels header: [{}]", header_slots);
            labels.write_i32s(&[header_slots])?;
        }

        Ok(Self {
            images,
            labels,
            ids,
            image_size: config.image_size,
            label_encoding: config.format.label_encoding,
            num_label_slots,
            scratch: Vec::new(),
            records_written: 0,
        })
    }

    /// Append one example. All streams receive their record before this returns.
    pub fn append(&mut self, image_id: u64, image: &ImageRecord, label: &LabelRecord) -> Result<()> {
        let expected = record_len(self.image_size);
        if image.data.len() != expected {
            return Err(ConvertError::InvalidConfig {
                message: format!(
                    "image record has {} values, expected {}",
                    image.data.len(),
                    expected
                ),
            });
        }

        self.images.write_f32s(&image.data, &mut self.scratch)?;

        match (label, self.label_encoding) {
            (LabelRecord::OneHot(values), LabelEncoding::OneHot)
                if values.len() == self.num_label_slots =>
            {
                self.labels.write_f32s(values, &mut self.scratch)?
            }
            (LabelRecord::RawByte(value), LabelEncoding::RawByte) => self.labels.write_u8(*value)?,
            _ => {
                return Err(ConvertError::InvalidConfig {
                    message: format!(
                        "label {:?} does not match the {:?} encoding",
                        label, self.label_encoding
                    ),
                })
            }
        }

        if let Some(ids) = self.ids.as_mut() {
            let id = i32::try_from(image_id).map_err(|_| ConvertError::InvalidConfig {
                message: format!("image id {} does not fit the i32 ids file", image_id),
            })?;
            ids.write_i32s(&[id])?;
        }

        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush and close every stream, returning the number of records written.
    pub fn finish(self) -> Result<usize> {
        self.images.finish()?;
        self.labels.finish()?;
        if let Some(ids) = self.ids {
            ids.finish()?;
        }
        Ok(self.records_written)
    }
}
