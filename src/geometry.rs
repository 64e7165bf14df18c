use std::fmt;

use anyhow::{bail, Result};
use nalgebra::{Matrix3, Vector3};

use crate::annotation::{AnnotationSet, BoundingBox};

/// Quarter-turn rotation angle. Only 90, 180 and 270 degrees are representable,
/// so an invalid angle is caught when the value is built, not when it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuarterTurn {
    Deg90,
    Deg180,
    Deg270,
}

impl QuarterTurn {
    pub const ALL: [QuarterTurn; 3] = [QuarterTurn::Deg90, QuarterTurn::Deg180, QuarterTurn::Deg270];

    pub fn from_degrees(degrees: u32) -> Result<Self> {
        match degrees {
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => bail!("Invalid rotation angle {}: must be 90, 180 or 270 degrees", other),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// True when the turn swaps the width and height of the canvas
    pub fn swaps_axes(self) -> bool {
        !matches!(self, Self::Deg180)
    }

    /// Canvas size after the turn
    pub fn rotated_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Affine matrix taking original-frame pixel coordinates of a `width`x`height`
    /// canvas to the rotated frame.
    ///
    /// 90: (x, y) -> (y, W - x)
    /// 180: (x, y) -> (W - x, H - y)
    /// 270: (x, y) -> (H - y, x)
    ///
    /// With y pointing down, the 90 degree map sends the top edge to the left edge,
    /// i.e. a counter-clockwise quarter turn on screen. Pixel rotation in
    /// `transform::rotate` follows the same direction.
    #[rustfmt::skip]
    pub fn matrix(self, width: f64, height: f64) -> Matrix3<f64> {
        match self {
            Self::Deg90 => Matrix3::new(
                0.0, 1.0, 0.0,
                -1.0, 0.0, width,
                0.0, 0.0, 1.0,
            ),
            Self::Deg180 => Matrix3::new(
                -1.0, 0.0, width,
                0.0, -1.0, height,
                0.0, 0.0, 1.0,
            ),
            Self::Deg270 => Matrix3::new(
                0.0, -1.0, height,
                1.0, 0.0, 0.0,
                0.0, 0.0, 1.0,
            ),
        }
    }
}

impl fmt::Display for QuarterTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Transform a point using the affine matrix
pub fn transform_point(matrix: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = Vector3::new(x, y, 1.0);
    let result = matrix * p;
    (result.x / result.z, result.y / result.z)
}

/// Map the axis-aligned rectangle `(x1, y1, x2, y2)` through `matrix`.
///
/// Both corners are transformed and the result is re-sorted, which for the
/// quarter-turn matrices reproduces the per-angle corner rules exactly
/// (e.g. for 90 degrees: new_x1 = y1, new_y1 = W - x2, new_x2 = y2, new_y2 = W - x1).
pub fn transform_rect(
    matrix: &Matrix3<f64>,
    (x1, y1, x2, y2): (f64, f64, f64, f64),
) -> (f64, f64, f64, f64) {
    let (ax, ay) = transform_point(matrix, x1, y1);
    let (bx, by) = transform_point(matrix, x2, y2);

    (ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
}

/// Mirror boxes left-right
pub fn flip_boxes_horizontal(annotations: &AnnotationSet) -> AnnotationSet {
    annotations.map(|b| BoundingBox {
        x_center: 1.0 - b.x_center,
        ..*b
    })
}

/// Mirror boxes top-bottom
pub fn flip_boxes_vertical(annotations: &AnnotationSet) -> AnnotationSet {
    annotations.map(|b| BoundingBox {
        y_center: 1.0 - b.y_center,
        ..*b
    })
}

/// Remap boxes of a `width`x`height` image through a quarter turn.
///
/// Boxes go to absolute corners in the original frame, through the angle's
/// corner map, and are normalized again against the rotated canvas.
pub fn rotate_boxes(
    annotations: &AnnotationSet,
    turn: QuarterTurn,
    width: u32,
    height: u32,
) -> AnnotationSet {
    let (orig_w, orig_h) = (width as f64, height as f64);
    let (new_w, new_h) = turn.rotated_dimensions(width, height);
    let matrix = turn.matrix(orig_w, orig_h);

    annotations.map(|b| {
        let corners = b.to_corners(orig_w, orig_h);
        let rotated = transform_rect(&matrix, corners);
        BoundingBox::from_corners(b.class_id, rotated, new_w as f64, new_h as f64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_sets_close(a: &AnnotationSet, b: &AnnotationSet) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.class_id, y.class_id);
            assert_abs_diff_eq!(x.x_center, y.x_center, epsilon = 1e-9);
            assert_abs_diff_eq!(x.y_center, y.y_center, epsilon = 1e-9);
            assert_abs_diff_eq!(x.width, y.width, epsilon = 1e-9);
            assert_abs_diff_eq!(x.height, y.height, epsilon = 1e-9);
        }
    }

    fn sample_set() -> AnnotationSet {
        AnnotationSet::new(vec![
            BoundingBox::new(0, 0.5, 0.5, 0.2, 0.4),
            BoundingBox::new(3, 0.1, 0.15, 0.2, 0.3),
            BoundingBox::new(1, 0.9, 0.8, 0.2, 0.4),
            BoundingBox::new(2, 0.5, 0.5, 1.0, 1.0),
        ])
    }

    #[test]
    fn test_from_degrees_rejects_other_angles() {
        assert_eq!(QuarterTurn::from_degrees(90).unwrap(), QuarterTurn::Deg90);
        assert_eq!(QuarterTurn::from_degrees(270).unwrap().degrees(), 270);
        for bad in [0, 45, 91, 360] {
            assert!(QuarterTurn::from_degrees(bad).is_err());
        }
    }

    #[test]
    fn test_corner_rules_per_angle() {
        let (w, h) = (100.0, 200.0);
        let rect = (10.0, 20.0, 30.0, 60.0);

        assert_eq!(
            transform_rect(&QuarterTurn::Deg90.matrix(w, h), rect),
            (20.0, w - 30.0, 60.0, w - 10.0)
        );
        assert_eq!(
            transform_rect(&QuarterTurn::Deg180.matrix(w, h), rect),
            (w - 30.0, h - 60.0, w - 10.0, h - 20.0)
        );
        assert_eq!(
            transform_rect(&QuarterTurn::Deg270.matrix(w, h), rect),
            (h - 60.0, 10.0, h - 20.0, 30.0)
        );
    }

    #[test]
    fn test_rotate90_centered_box_on_portrait_image() {
        let set = AnnotationSet::new(vec![BoundingBox::new(0, 0.5, 0.5, 0.2, 0.4)]);
        assert_eq!(QuarterTurn::Deg90.rotated_dimensions(100, 200), (200, 100));

        let rotated = rotate_boxes(&set, QuarterTurn::Deg90, 100, 200);
        let b = rotated.boxes[0];
        assert_eq!(b.class_id, 0);
        assert_abs_diff_eq!(b.x_center, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(b.y_center, 0.5, epsilon = 1e-9);
        // 80px tall box becomes 80px wide on a 200px wide canvas
        assert_abs_diff_eq!(b.width, 0.4, epsilon = 1e-9);
        assert_abs_diff_eq!(b.height, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_rotate90_moves_top_left_box_to_bottom_left() {
        let set = AnnotationSet::new(vec![BoundingBox::new(5, 0.1, 0.1, 0.2, 0.2)]);
        let b = rotate_boxes(&set, QuarterTurn::Deg90, 100, 50).boxes[0];

        // Canvas is 50x100; box spans x in [0, 10] and y in [80, 100]
        assert_abs_diff_eq!(b.x_center, 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(b.y_center, 0.9, epsilon = 1e-9);
        assert_abs_diff_eq!(b.width, 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(b.height, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_flip_is_involution() {
        let set = sample_set();
        assert_sets_close(&flip_boxes_horizontal(&flip_boxes_horizontal(&set)), &set);
        assert_sets_close(&flip_boxes_vertical(&flip_boxes_vertical(&set)), &set);
    }

    #[test]
    fn test_symmetric_box_is_hflip_fixed_point() {
        let set = AnnotationSet::new(vec![BoundingBox::new(0, 0.5, 0.5, 0.2, 0.4)]);
        let flipped = flip_boxes_horizontal(&set);
        assert_eq!(flipped.to_text(), "0 0.500000 0.500000 0.200000 0.400000\n");
    }

    #[test]
    fn test_rotation_group_closure() {
        let set = sample_set();
        let (w, h) = (120, 80);

        let mut current = set.clone();
        let (mut cw, mut ch) = (w, h);
        for _ in 0..4 {
            current = rotate_boxes(&current, QuarterTurn::Deg90, cw, ch);
            (cw, ch) = QuarterTurn::Deg90.rotated_dimensions(cw, ch);
        }
        assert_eq!((cw, ch), (w, h));
        assert_sets_close(&current, &set);

        let once = rotate_boxes(&set, QuarterTurn::Deg90, w, h);
        let twice = rotate_boxes(&once, QuarterTurn::Deg90, h, w);
        assert_sets_close(&twice, &rotate_boxes(&set, QuarterTurn::Deg180, w, h));

        let thrice = rotate_boxes(&twice, QuarterTurn::Deg90, w, h);
        assert_sets_close(&thrice, &rotate_boxes(&set, QuarterTurn::Deg270, w, h));
    }

    #[test]
    fn test_remapped_boxes_stay_contained() {
        let set = sample_set();
        let mut outputs = vec![flip_boxes_horizontal(&set), flip_boxes_vertical(&set)];
        for turn in QuarterTurn::ALL {
            outputs.push(rotate_boxes(&set, turn, 640, 480));
        }

        for out in outputs {
            assert_eq!(out.len(), set.len());
            assert!(out.iter().all(|b| b.is_contained(1e-3)), "{:?}", out);
        }
    }
}
