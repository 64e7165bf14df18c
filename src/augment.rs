use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageReader, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};

use crate::annotation::{self, AnnotationSet};
use crate::dataset::{list_files, DatasetLayout, AUGMENT_IMAGE_EXTENSIONS, LABEL_EXTENSION};
use crate::geometry::QuarterTurn;
use crate::photometric::{adjust_contrast, gaussian_blur, BlurKernel};
use crate::transform;

/// Contrast factors of the standard augmentation set
pub const DEFAULT_CONTRAST_FACTORS: [f64; 2] = [0.5, 1.5];

/// One named augmentation: how it is applied, the filename suffix of its output,
/// and whether it changes the boxes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Augmentation {
    HorizontalFlip,
    VerticalFlip,
    Rotate(QuarterTurn),
    Contrast(f64),
    GaussianBlur(BlurKernel),
}

impl Augmentation {
    /// Flips, three quarter turns, two contrast factors and a 5x5 blur
    pub fn standard_set() -> Vec<Self> {
        Self::build_set(&DEFAULT_CONTRAST_FACTORS, BlurKernel::default())
    }

    pub fn build_set(contrast_factors: &[f64], blur: BlurKernel) -> Vec<Self> {
        let mut set = vec![Self::HorizontalFlip, Self::VerticalFlip];
        set.extend(QuarterTurn::ALL.map(Self::Rotate));
        set.extend(contrast_factors.iter().map(|&f| Self::Contrast(f)));
        set.push(Self::GaussianBlur(blur));
        set
    }

    /// Appended to the source stem for both the image and the label output.
    ///
    /// Contrast factors use the shortest round-trip float form, so two distinct
    /// factors never share a suffix.
    pub fn suffix(&self) -> String {
        match self {
            Self::HorizontalFlip => "_hflip".to_string(),
            Self::VerticalFlip => "_vflip".to_string(),
            Self::Rotate(turn) => format!("_rotate{}", turn),
            Self::Contrast(factor) => format!("_contrast{}", factor),
            Self::GaussianBlur(_) => "_blurred".to_string(),
        }
    }

    pub fn affects_annotations(&self) -> bool {
        matches!(
            self,
            Self::HorizontalFlip | Self::VerticalFlip | Self::Rotate(_)
        )
    }

    /// Produce the augmented image and its boxes. Box-invariant augmentations
    /// hand back the input set itself.
    pub fn apply<'a>(
        &self,
        img: &RgbImage,
        annotations: &'a AnnotationSet,
    ) -> Result<(RgbImage, Cow<'a, AnnotationSet>)> {
        let (image, boxes) = match *self {
            Self::HorizontalFlip => {
                let (image, boxes) = transform::horizontal_flip(img, annotations);
                (image, Cow::Owned(boxes))
            }
            Self::VerticalFlip => {
                let (image, boxes) = transform::vertical_flip(img, annotations);
                (image, Cow::Owned(boxes))
            }
            Self::Rotate(turn) => {
                let (image, boxes) = transform::rotate(img, annotations, turn);
                (image, Cow::Owned(boxes))
            }
            Self::Contrast(factor) => (adjust_contrast(img, factor)?, Cow::Borrowed(annotations)),
            Self::GaussianBlur(kernel) => (gaussian_blur(img, kernel), Cow::Borrowed(annotations)),
        };

        Ok((image, boxes))
    }
}

/// Result of augmenting one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Number of image/label pairs written
    Augmented(usize),
    /// Image could not be decoded; nothing was written
    Skipped,
}

/// Decode an image as 8-bit RGB
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let img = ImageReader::open(path)
        .with_context(|| format!("Failed to open image: {:?}", path))?
        .with_guessed_format()
        .with_context(|| format!("Failed to read image: {:?}", path))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", path))?;

    Ok(img.to_rgb8())
}

/// `<stem><suffix>.<ext>` inside `dir`
fn derived_path(dir: &Path, stem: &str, suffix: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}{}.{}", stem, suffix, ext))
}

/// Apply every augmentation to one image/label pair and write the results into
/// `output`, one pair at a time.
///
/// An undecodable image is logged and skipped. Write failures are returned.
pub fn augment_one(
    image_path: &Path,
    label_path: &Path,
    output: &DatasetLayout,
    augmentations: &[Augmentation],
) -> Result<Outcome> {
    let img = match load_rgb(image_path) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("Skipping unreadable image {:?}: {:#}", image_path, e);
            return Ok(Outcome::Skipped);
        }
    };

    let (width, height) = img.dimensions();
    let annotations = annotation::parse(label_path, width, height)?;

    let stem = image_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let ext = image_path
        .extension()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();

    let images_dir = output.images_dir();
    let labels_dir = output.labels_dir();

    for augmentation in augmentations {
        let suffix = augmentation.suffix();
        let (augmented, boxes) = augmentation.apply(&img, &annotations)?;

        let out_image = derived_path(&images_dir, &stem, &suffix, &ext);
        augmented
            .save(&out_image)
            .with_context(|| format!("Failed to save image: {:?}", out_image))?;

        let out_label = derived_path(&labels_dir, &stem, &suffix, LABEL_EXTENSION);
        if augmentation.affects_annotations() {
            annotation::serialize(&out_label, &boxes)?;
        } else {
            fs::copy(label_path, &out_label).with_context(|| {
                format!("Failed to copy label {:?} to {:?}", label_path, out_label)
            })?;
        }

        log::debug!("Wrote {:?} ({} boxes)", out_image, boxes.len());
    }

    Ok(Outcome::Augmented(augmentations.len()))
}

/// Where to read, where to write, and which augmentations to run
#[derive(Debug, Clone)]
pub struct AugmentConfig {
    pub input: DatasetLayout,
    pub output: DatasetLayout,
    pub augmentations: Vec<Augmentation>,
    pub show_progress: bool,
}

impl AugmentConfig {
    /// Standard augmentation set over the `train` split, no progress bar
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input: DatasetLayout::new(input_root, "train"),
            output: DatasetLayout::new(output_root, "train"),
            augmentations: Augmentation::standard_set(),
            show_progress: false,
        }
    }
}

/// Summary of a batch run
#[derive(Debug, Default)]
pub struct AugmentReport {
    pub processed: usize,
    pub outputs_written: usize,
    pub missing_labels: Vec<PathBuf>,
    pub undecodable: Vec<PathBuf>,
}

fn progress_bar(len: usize, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }

    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}",
            )?
            .progress_chars("=>-"),
    );
    bar.set_message("Augmenting images");
    Ok(bar)
}

/// Augment every image of the input split that has a label file.
///
/// Images without a label or that fail to decode are reported and skipped; any
/// write failure stops the run.
pub fn augment_all(config: &AugmentConfig) -> Result<AugmentReport> {
    let images = list_files(&config.input.images_dir(), &AUGMENT_IMAGE_EXTENSIONS)?;
    config.output.ensure_dirs()?;

    log::info!(
        "Found {} images in {:?}, {} augmentations each",
        images.len(),
        config.input.images_dir(),
        config.augmentations.len()
    );

    let progress = progress_bar(images.len(), config.show_progress)?;
    let mut report = AugmentReport::default();

    for image_path in &images {
        let label_path = config.input.label_path_for(image_path);

        if !label_path.exists() {
            progress.suspend(|| log::warn!("Label file not found: {:?}", label_path));
            report.missing_labels.push(label_path);
            progress.inc(1);
            continue;
        }

        match augment_one(image_path, &label_path, &config.output, &config.augmentations)? {
            Outcome::Augmented(count) => {
                report.processed += 1;
                report.outputs_written += count;
            }
            Outcome::Skipped => report.undecodable.push(image_path.clone()),
        }
        progress.inc(1);
    }

    progress.finish_with_message("Augmentation complete");

    log::info!(
        "Augmented {} images ({} outputs); {} missing labels, {} unreadable",
        report.processed,
        report.outputs_written,
        report.missing_labels.len(),
        report.undecodable.len()
    );

    Ok(report)
}
