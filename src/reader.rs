//! Readers for the tensor files produced by the converter.
//!
//! [`DatasetReader`] consumes the train layout (headers, one-hot labels, ids)
//! in batches. [`HeaderlessReader`] consumes the test layout, whose shape has
//! to be supplied by the caller.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::types::{record_len, CHANNELS};

const I32_BYTES: u64 = 4;
const F32_BYTES: u64 = 4;

/// A run of consecutive examples. Images and labels are flattened, one
/// example after the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub images: Vec<f32>,
    pub labels: Vec<f32>,
    pub ids: Vec<i32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

struct InputStream {
    path: PathBuf,
    reader: BufReader<File>,
    len: u64,
}

impl InputStream {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ConvertError::malformed(path, e.to_string()))?;
        let len = file
            .metadata()
            .map_err(|e| ConvertError::malformed(path, e.to_string()))?
            .len();
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            len,
        })
    }

    fn read_error(&self, e: std::io::Error) -> ConvertError {
        if e.kind() == ErrorKind::UnexpectedEof {
            ConvertError::malformed(&self.path, "file ends in the middle of a record")
        } else {
            ConvertError::malformed(&self.path, e.to_string())
        }
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.reader
            .read_i32::<LittleEndian>()
            .map_err(|e| self.read_error(e))
    }

    fn read_f32s(&mut self, out: &mut Vec<f32>, count: usize) -> Result<()> {
        let start = out.len();
        out.resize(start + count, 0.0);
        self.reader
            .read_f32_into::<LittleEndian>(&mut out[start..])
            .map_err(|e| self.read_error(e))
    }

    fn read_u8s(&mut self, out: &mut Vec<u8>, count: usize) -> Result<()> {
        let start = out.len();
        out.resize(start + count, 0);
        self.reader
            .read_exact(&mut out[start..])
            .map_err(|e| self.read_error(e))
    }

    fn expect_len(&self, expected: u64) -> Result<()> {
        if self.len != expected {
            return Err(ConvertError::malformed(
                &self.path,
                format!("expected {} bytes, found {}", expected, self.len),
            ));
        }
        Ok(())
    }
}

// Product of header fields, or `MalformedDataset` when it overflows
fn checked_product(path: &Path, factors: &[u64]) -> Result<u64> {
    factors
        .iter()
        .try_fold(1u64, |acc, &f| acc.checked_mul(f))
        .ok_or_else(|| ConvertError::malformed(path, "header dimensions overflow"))
}

fn positive(path: &Path, value: i32, what: &str) -> Result<u64> {
    u64::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| ConvertError::malformed(path, format!("invalid {} {}", what, value)))
}

/// Batched reader over `imgdata.dat`, `lbldata.dat` and `nmdata.dat`.
pub struct DatasetReader {
    images: InputStream,
    labels: InputStream,
    ids: InputStream,
    pub num_examples: usize,
    pub height: u32,
    pub width: u32,
    pub channels: u32,
    pub num_label_slots: usize,
    example_len: usize,
    n_read: usize,
}

impl DatasetReader {
    /// Open the three files and check their headers and lengths agree.
    pub fn open(images_path: &Path, labels_path: &Path, ids_path: &Path) -> Result<Self> {
        let mut images = InputStream::open(images_path)?;
        let mut labels = InputStream::open(labels_path)?;
        let ids = InputStream::open(ids_path)?;

        let mut header = [0i32; 4];
        for value in header.iter_mut() {
            *value = images.read_i32()?;
        }
        let [n, h, w, c] = header;
        let num_examples = u64::try_from(n)
            .map_err(|_| ConvertError::malformed(images_path, format!("invalid image count {}", n)))?;
        let height = positive(images_path, h, "height")?;
        let width = positive(images_path, w, "width")?;
        let channels = positive(images_path, c, "channel count")?;
        if channels != CHANNELS as u64 {
            return Err(ConvertError::malformed(
                images_path,
                format!("expected {} channels, found {}", CHANNELS, channels),
            ));
        }
        let slots = labels.read_i32()?;
        let num_label_slots = positive(labels_path, slots, "label length")?;

        let overflow = |path: &Path| ConvertError::malformed(path, "header dimensions overflow");
        let example_len = checked_product(images_path, &[height, width, channels])?;
        let example_len = usize::try_from(example_len).map_err(|_| overflow(images_path))?;
        let images_len = checked_product(images_path, &[num_examples, example_len as u64, F32_BYTES])?
            .checked_add(4 * I32_BYTES)
            .ok_or_else(|| overflow(images_path))?;
        let labels_len = checked_product(labels_path, &[num_examples, num_label_slots, F32_BYTES])?
            .checked_add(I32_BYTES)
            .ok_or_else(|| overflow(labels_path))?;
        images.expect_len(images_len)?;
        labels.expect_len(labels_len)?;
        ids.expect_len(checked_product(ids_path, &[num_examples, I32_BYTES])?)?;

        Ok(Self {
            images,
            labels,
            ids,
            num_examples: num_examples as usize,
            height: height as u32,
            width: width as u32,
            channels: channels as u32,
            num_label_slots: num_label_slots as usize,
            example_len,
            n_read: 0,
        })
    }

    /// Open the standard file names inside `dir`.
    pub fn open_dir(dir: &Path) -> Result<Self> {
        use crate::config::{IDS_FILE_NAME, IMAGES_FILE_NAME, LABELS_FILE_NAME};
        Self::open(
            &dir.join(IMAGES_FILE_NAME),
            &dir.join(LABELS_FILE_NAME),
            &dir.join(IDS_FILE_NAME),
        )
    }

    pub fn example_len(&self) -> usize {
        self.example_len
    }

    pub fn examples_left(&self) -> usize {
        self.num_examples - self.n_read
    }

    pub fn is_finished(&self) -> bool {
        self.n_read >= self.num_examples
    }

    /// Read up to `batch_size` examples. Once the files are exhausted an empty
    /// batch is returned.
    pub fn next_batch(&mut self, batch_size: usize) -> Result<Batch> {
        let count = batch_size.min(self.examples_left());
        let mut batch = Batch {
            images: Vec::with_capacity(count * self.example_len()),
            labels: Vec::with_capacity(count * self.num_label_slots),
            ids: Vec::with_capacity(count),
        };
        let example_len = self.example_len();
        for _ in 0..count {
            self.images.read_f32s(&mut batch.images, example_len)?;
            self.labels.read_f32s(&mut batch.labels, self.num_label_slots)?;
            batch.ids.push(self.ids.read_i32()?);
        }
        self.n_read += count;
        Ok(batch)
    }
}

/// Reader for the header-less test layout: f32 images plus one byte per label.
pub struct HeaderlessReader {
    images: InputStream,
    labels: InputStream,
    pub num_examples: usize,
    pub image_size: u32,
    n_read: usize,
}

impl HeaderlessReader {
    /// The example count is derived from the images file length.
    pub fn open(images_path: &Path, labels_path: &Path, image_size: u32) -> Result<Self> {
        let images = InputStream::open(images_path)?;
        let labels = InputStream::open(labels_path)?;

        let example_bytes = image_size as u64 * image_size as u64 * CHANNELS as u64 * F32_BYTES;
        if example_bytes == 0 || images.len % example_bytes != 0 {
            return Err(ConvertError::malformed(
                images_path,
                format!(
                    "{} bytes is not a whole number of {}x{} images",
                    images.len, image_size, image_size
                ),
            ));
        }
        let num_examples = images.len / example_bytes;
        labels.expect_len(num_examples)?;

        Ok(Self {
            images,
            labels,
            num_examples: num_examples as usize,
            image_size,
            n_read: 0,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.n_read >= self.num_examples
    }

    /// Read up to `batch_size` examples as `(images, labels)`.
    pub fn next_batch(&mut self, batch_size: usize) -> Result<(Vec<f32>, Vec<u8>)> {
        let count = batch_size.min(self.num_examples - self.n_read);
        let example_len = record_len(self.image_size);
        let mut images = Vec::with_capacity(count * example_len);
        let mut labels = Vec::with_capacity(count);
        for _ in 0..count {
            self.images.read_f32s(&mut images, example_len)?;
            self.labels.read_u8s(&mut labels, 1)?;
        }
        self.n_read += count;
        Ok((images, labels))
    }
}
