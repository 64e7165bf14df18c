use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

/// A single YOLO box: class id plus center/size as fractions of the image dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub class_id: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(class_id: u32, x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        Self {
            class_id,
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Absolute corners `(x1, y1, x2, y2)` in a `width`x`height` pixel frame
    pub fn to_corners(&self, width: f64, height: f64) -> (f64, f64, f64, f64) {
        let cx = self.x_center * width;
        let cy = self.y_center * height;
        let w = self.width * width;
        let h = self.height * height;

        (cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    /// Build a normalized box from absolute corners in a `width`x`height` frame
    pub fn from_corners(
        class_id: u32,
        (x1, y1, x2, y2): (f64, f64, f64, f64),
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            class_id,
            x_center: (x1 + x2) / 2.0 / width,
            y_center: (y1 + y2) / 2.0 / height,
            width: (x2 - x1) / width,
            height: (y2 - y1) / height,
        }
    }

    /// True if every edge lies inside [0, 1] up to `tolerance`
    pub fn is_contained(&self, tolerance: f64) -> bool {
        let left = self.x_center - self.width / 2.0;
        let right = self.x_center + self.width / 2.0;
        let top = self.y_center - self.height / 2.0;
        let bottom = self.y_center + self.height / 2.0;

        left >= -tolerance
            && right <= 1.0 + tolerance
            && top >= -tolerance
            && bottom <= 1.0 + tolerance
    }

    /// Parse one label line; `None` for blank or malformed rows
    fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return None;
        }

        Some(Self {
            class_id: fields[0].parse().ok()?,
            x_center: fields[1].parse().ok()?,
            y_center: fields[2].parse().ok()?,
            width: fields[3].parse().ok()?,
            height: fields[4].parse().ok()?,
        })
    }
}

/// Ordered boxes for one image. Transforms keep the order so outputs stay
/// line-for-line comparable with the source label file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    pub boxes: Vec<BoundingBox>,
}

impl AnnotationSet {
    pub fn new(boxes: Vec<BoundingBox>) -> Self {
        Self { boxes }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoundingBox> {
        self.boxes.iter()
    }

    /// Apply `f` to every box, producing a new set in the same order
    pub fn map(&self, f: impl FnMut(&BoundingBox) -> BoundingBox) -> Self {
        Self {
            boxes: self.boxes.iter().map(f).collect(),
        }
    }

    /// Parse label-file text. Malformed lines are dropped, never reported.
    pub fn from_text(text: &str) -> Self {
        Self {
            boxes: text.lines().filter_map(BoundingBox::parse_line).collect(),
        }
    }

    /// Render in label-file form, geometry fixed to 6 decimals
    pub fn to_text(&self) -> String {
        self.boxes
            .iter()
            .map(|b| {
                format!(
                    "{} {:.6} {:.6} {:.6} {:.6}\n",
                    b.class_id, b.x_center, b.y_center, b.width, b.height
                )
            })
            .collect()
    }
}

impl FromStr for AnnotationSet {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_text(s))
    }
}

impl<'a> IntoIterator for &'a AnnotationSet {
    type Item = &'a BoundingBox;
    type IntoIter = std::slice::Iter<'a, BoundingBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}

/// Load a YOLO label file belonging to an `image_width`x`image_height` image
pub fn parse(path: &Path, image_width: u32, image_height: u32) -> Result<AnnotationSet> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read label file: {:?}", path))?;

    let set = AnnotationSet::from_text(&text);
    log::debug!(
        "Loaded {} boxes from {:?} ({}x{})",
        set.len(),
        path,
        image_width,
        image_height
    );

    Ok(set)
}

/// Write a label file, replacing any existing one
pub fn serialize(path: &Path, annotations: &AnnotationSet) -> Result<()> {
    fs::write(path, annotations.to_text())
        .with_context(|| format!("Failed to write label file: {:?}", path))
}
