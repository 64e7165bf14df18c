use image::{imageops, RgbImage};

use crate::annotation::AnnotationSet;
use crate::geometry::{flip_boxes_horizontal, flip_boxes_vertical, rotate_boxes, QuarterTurn};

/// Mirror image and boxes left-right
pub fn horizontal_flip(img: &RgbImage, annotations: &AnnotationSet) -> (RgbImage, AnnotationSet) {
    (
        imageops::flip_horizontal(img),
        flip_boxes_horizontal(annotations),
    )
}

/// Mirror image and boxes top-bottom
pub fn vertical_flip(img: &RgbImage, annotations: &AnnotationSet) -> (RgbImage, AnnotationSet) {
    (
        imageops::flip_vertical(img),
        flip_boxes_vertical(annotations),
    )
}

/// Rotate image and boxes by a quarter turn, growing the canvas so nothing is cropped.
///
/// The pixel turn follows `QuarterTurn::matrix`: `imageops::rotate90` is a
/// clockwise turn on screen, so the 90 and 270 cases map to each other's
/// clockwise counterparts.
pub fn rotate(
    img: &RgbImage,
    annotations: &AnnotationSet,
    turn: QuarterTurn,
) -> (RgbImage, AnnotationSet) {
    let (width, height) = img.dimensions();

    let rotated = match turn {
        QuarterTurn::Deg90 => imageops::rotate270(img),
        QuarterTurn::Deg180 => imageops::rotate180(img),
        QuarterTurn::Deg270 => imageops::rotate90(img),
    };
    debug_assert_eq!(rotated.dimensions(), turn.rotated_dimensions(width, height));

    (rotated, rotate_boxes(annotations, turn, width, height))
}
