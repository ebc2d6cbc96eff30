//! COCO annotation file structures and the lookup index built from them.
//!
//! Only the fields needed to resolve an image id to its labeled objects are
//! deserialized; everything else in the instances file is ignored.

use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{ConvertError, Result};

/// COCO category information
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub supercategory: Option<String>,
}

/// COCO image information
#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: u64,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// COCO annotation information
#[derive(Debug, Clone, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    #[serde(default)]
    pub area: f64,
    #[serde(default, deserialize_with = "deserialize_iscrowd")]
    pub iscrowd: bool,
}

// iscrowd is 0/1 in official files, but some exporters write booleans
fn deserialize_iscrowd<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IsCrowd {
        Bool(bool),
        Int(u64),
    }

    Ok(match IsCrowd::deserialize(deserializer)? {
        IsCrowd::Bool(b) => b,
        IsCrowd::Int(i) => i != 0,
    })
}

/// The parts of a COCO instances file used by the converter
#[derive(Debug, Clone, Deserialize)]
pub struct CocoFile {
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// An annotated object reduced to what label selection needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectAnnotation {
    pub area: f64,
    pub category_id: u64,
}

/// Read-only lookup from image id to its non-crowd objects.
#[derive(Debug, Clone, Default)]
pub struct AnnotationIndex {
    objects: HashMap<u64, Vec<ObjectAnnotation>>,
    categories: HashMap<u64, String>,
    images: HashSet<u64>,
    num_categories: u64,
}

impl AnnotationIndex {
    /// Load and index a COCO instances file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| ConvertError::AnnotationOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file)).map_err(|source| ConvertError::AnnotationLoad {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a COCO instances document from any reader.
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        let coco: CocoFile = serde_json::from_reader(reader)?;
        Ok(Self::from_coco(coco))
    }

    /// Index an already parsed COCO document. Crowd annotations are dropped,
    /// and the remaining objects keep their order from the file.
    pub fn from_coco(coco: CocoFile) -> Self {
        let mut objects: HashMap<u64, Vec<ObjectAnnotation>> = HashMap::new();
        for annotation in coco.annotations.iter().filter(|a| !a.iscrowd) {
            objects
                .entry(annotation.image_id)
                .or_default()
                .push(ObjectAnnotation {
                    area: annotation.area,
                    category_id: annotation.category_id,
                });
        }

        let num_categories = coco.categories.iter().map(|c| c.id).max().unwrap_or(0);
        let categories = coco
            .categories
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let images = coco.images.iter().map(|image| image.id).collect();

        Self {
            objects,
            categories,
            images,
            num_categories,
        }
    }

    /// Non-crowd objects annotated on the image, in file order.
    pub fn objects(&self, image_id: u64) -> &[ObjectAnnotation] {
        self.objects
            .get(&image_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn category_name(&self, category_id: u64) -> Option<&str> {
        self.categories.get(&category_id).map(String::as_str)
    }

    /// Whether the image appears in the file's `images` list.
    pub fn contains_image(&self, image_id: u64) -> bool {
        self.images.contains(&image_id)
    }

    /// Largest category id. COCO ids are sparse, so this is not the number of
    /// distinct categories.
    pub fn num_categories(&self) -> u64 {
        self.num_categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "info": {"year": 2014},
        "images": [{"id": 1, "file_name": "a.jpg", "width": 4, "height": 3}],
        "annotations": [
            {"id": 10, "image_id": 1, "category_id": 5, "area": 20.0, "iscrowd": 0, "bbox": [0, 0, 4, 5]},
            {"id": 11, "image_id": 1, "category_id": 90, "area": 99.0, "iscrowd": 1},
            {"id": 12, "image_id": 1, "category_id": 2, "area": 3.5, "iscrowd": false}
        ],
        "categories": [
            {"id": 2, "name": "bicycle", "supercategory": "vehicle"},
            {"id": 5, "name": "airplane", "supercategory": "vehicle"},
            {"id": 90, "name": "toothbrush", "supercategory": "indoor"}
        ]
    }"#;

    #[test]
    fn test_crowd_annotations_are_dropped() {
        let index = AnnotationIndex::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            index.objects(1),
            &[
                ObjectAnnotation {
                    area: 20.0,
                    category_id: 5
                },
                ObjectAnnotation {
                    area: 3.5,
                    category_id: 2
                },
            ]
        );
    }

    #[test]
    fn test_index_lookups() {
        let index = AnnotationIndex::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(index.num_categories(), 90);
        assert_eq!(index.category_name(5), Some("airplane"));
        assert_eq!(index.category_name(6), None);
        assert!(index.contains_image(1));
        assert!(!index.contains_image(2));
        assert!(index.objects(2).is_empty());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = AnnotationIndex::load(Path::new("does/not/exist.json")).unwrap_err();
        assert!(matches!(err, ConvertError::AnnotationOpen { .. }));
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
