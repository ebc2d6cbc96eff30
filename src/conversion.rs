use log::debug;
use std::path::Path;

use crate::coco::{AnnotationIndex, ObjectAnnotation};
use crate::config::{LabelEncoding, OutputFormat};
use crate::error::{ConvertError, Result};
use crate::types::LabelRecord;

/// Category reserved for images without any usable annotation.
pub const BACKGROUND_CATEGORY: u64 = 0;

/// Category of the largest object. Ties keep the first object in file order,
/// and a NaN area ranks above every number, so the first NaN object wins.
pub fn select_category(objects: &[ObjectAnnotation]) -> Option<u64> {
    let mut best: Option<&ObjectAnnotation> = None;
    for object in objects {
        let replace = match best {
            None => true,
            Some(current) => {
                !current.area.is_nan() && (object.area.is_nan() || object.area > current.area)
            }
        };
        if replace {
            best = Some(object);
        }
    }
    best.map(|object| object.category_id)
}

/// Length of a one-hot label for categories `0..=num_categories`, if it fits
/// the i32 labels header.
pub fn one_hot_len(num_categories: u64) -> Option<usize> {
    num_categories
        .checked_add(1)
        .filter(|&len| len <= i32::MAX as u64)
        .and_then(|len| usize::try_from(len).ok())
}

// `category` must be below `num_slots`
pub(crate) fn one_hot(category: usize, num_slots: usize) -> Vec<f32> {
    let mut values = vec![0.0f32; num_slots];
    values[category] = 1.0;
    values
}

/// Resolve the label record for one image.
pub fn resolve_label(
    index: &AnnotationIndex,
    file: &Path,
    image_id: u64,
    format: &OutputFormat,
) -> Result<LabelRecord> {
    let category = match select_category(index.objects(image_id)) {
        Some(category) => {
            debug!(
                "{}: {} - {}",
                file.display(),
                index.category_name(category).unwrap_or("<unknown>"),
                category
            );
            category
        }
        None if format.allow_background => {
            debug!("{}: no annotation, using background label", file.display());
            BACKGROUND_CATEGORY
        }
        None => {
            return Err(ConvertError::AnnotationNotFound {
                file: file.to_path_buf(),
                image_id,
            })
        }
    };

    encode_label(category, index.num_categories(), file, format.label_encoding)
}

fn encode_label(
    category: u64,
    num_categories: u64,
    file: &Path,
    encoding: LabelEncoding,
) -> Result<LabelRecord> {
    let out_of_range = |max: u64| ConvertError::LabelOutOfRange {
        file: file.to_path_buf(),
        category_id: category,
        max,
    };

    match encoding {
        LabelEncoding::OneHot => {
            let num_slots = one_hot_len(num_categories).ok_or_else(|| out_of_range(num_categories))?;
            if category > num_categories {
                return Err(out_of_range(num_categories));
            }
            Ok(LabelRecord::OneHot(one_hot(category as usize, num_slots)))
        }
        LabelEncoding::RawByte => u8::try_from(category)
            .map(LabelRecord::RawByte)
            .map_err(|_| out_of_range(u8::MAX as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coco::{Annotation, Category, CocoFile, Image};
    use crate::config::Variant;

    fn annotation(image_id: u64, category_id: u64, area: f64) -> Annotation {
        Annotation {
            id: 0,
            image_id,
            category_id,
            area,
            iscrowd: false,
        }
    }

    fn sample_index() -> AnnotationIndex {
        AnnotationIndex::from_coco(CocoFile {
            images: vec![Image {
                id: 1,
                file_name: "COCO_train2014_000000000001.jpg".to_string(),
                width: 400,
                height: 300,
            }],
            annotations: vec![annotation(1, 2, 10.0), annotation(1, 5, 1000.0)],
            categories: [(2, "bicycle"), (5, "airplane"), (7, "train")]
                .into_iter()
                .map(|(id, name)| Category {
                    id,
                    name: name.to_string(),
                    supercategory: None,
                })
                .collect(),
        })
    }

    #[test]
    fn test_select_category_prefers_largest_area() {
        let objects = [
            ObjectAnnotation {
                area: 1000.0,
                category_id: 5,
            },
            ObjectAnnotation {
                area: 10.0,
                category_id: 2,
            },
        ];
        assert_eq!(select_category(&objects), Some(5));
        assert_eq!(select_category(&[]), None);
    }

    #[test]
    fn test_select_category_ties_keep_first() {
        let objects = [
            ObjectAnnotation {
                area: 50.0,
                category_id: 3,
            },
            ObjectAnnotation {
                area: 50.0,
                category_id: 4,
            },
        ];
        assert_eq!(select_category(&objects), Some(3));
    }

    #[test]
    fn test_select_category_first_nan_wins() {
        let objects = [
            ObjectAnnotation {
                area: 10.0,
                category_id: 1,
            },
            ObjectAnnotation {
                area: f64::NAN,
                category_id: 2,
            },
            ObjectAnnotation {
                area: f64::NAN,
                category_id: 3,
            },
            ObjectAnnotation {
                area: 1e9,
                category_id: 4,
            },
        ];
        assert_eq!(select_category(&objects), Some(2));
    }

    #[test]
    fn test_one_hot_len_limits() {
        assert_eq!(one_hot_len(90), Some(91));
        assert_eq!(one_hot_len(u64::MAX), None);
        assert_eq!(one_hot_len(i32::MAX as u64), None);
    }

    #[test]
    fn test_huge_category_id_is_out_of_range() {
        let index = AnnotationIndex::from_coco(CocoFile {
            images: vec![],
            annotations: vec![annotation(3, u64::MAX, 1.0)],
            categories: vec![Category {
                id: u64::MAX,
                name: "broken".to_string(),
                supercategory: None,
            }],
        });
        let format = OutputFormat::from(Variant::Train);
        let err = resolve_label(&index, Path::new("c.jpg"), 3, &format).unwrap_err();
        assert!(matches!(err, ConvertError::LabelOutOfRange { .. }));
    }

    #[test]
    fn test_one_hot_label_for_annotated_image() {
        let index = sample_index();
        let format = OutputFormat::from(Variant::Train);
        let label = resolve_label(&index, Path::new("a.jpg"), 1, &format).unwrap();

        let LabelRecord::OneHot(values) = label else {
            panic!("expected one-hot label");
        };
        assert_eq!(values.len(), 8);
        assert_eq!(values.iter().sum::<f32>(), 1.0);
        assert_eq!(values[5], 1.0);
    }

    #[test]
    fn test_background_label_for_unannotated_image() {
        let index = sample_index();
        let format = OutputFormat::from(Variant::Train);
        let label = resolve_label(&index, Path::new("b.jpg"), 2, &format).unwrap();
        assert_eq!(
            label,
            LabelRecord::OneHot(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
        );
    }

    #[test]
    fn test_test_variant_requires_annotation() {
        let index = sample_index();
        let format = OutputFormat::from(Variant::Test);

        let label = resolve_label(&index, Path::new("a.jpg"), 1, &format).unwrap();
        assert_eq!(label, LabelRecord::RawByte(5));

        let err = resolve_label(&index, Path::new("b.jpg"), 2, &format).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::AnnotationNotFound { image_id: 2, .. }
        ));
    }

    #[test]
    fn test_undeclared_category_is_out_of_range() {
        let mut index_source = CocoFile {
            images: vec![],
            annotations: vec![annotation(3, 12, 1.0)],
            categories: vec![Category {
                id: 1,
                name: "person".to_string(),
                supercategory: None,
            }],
        };
        let index = AnnotationIndex::from_coco(index_source.clone());
        let format = OutputFormat::from(Variant::Train);
        let err = resolve_label(&index, Path::new("c.jpg"), 3, &format).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::LabelOutOfRange {
                category_id: 12,
                max: 1,
                ..
            }
        ));

        index_source.annotations = vec![annotation(3, 300, 1.0)];
        let index = AnnotationIndex::from_coco(index_source);
        let format = OutputFormat::from(Variant::Test);
        let err = resolve_label(&index, Path::new("c.jpg"), 3, &format).unwrap_err();
        assert!(matches!(err, ConvertError::LabelOutOfRange { max: 255, .. }));
    }
}
