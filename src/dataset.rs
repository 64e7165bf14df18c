use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Image extensions picked up by the augmentation run
pub const AUGMENT_IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Extension of YOLO label files
pub const LABEL_EXTENSION: &str = "txt";

/// `<root>/images/<split>` and `<root>/labels/<split>` for one dataset split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub split: String,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>, split: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            split: split.into(),
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images").join(&self.split)
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join("labels").join(&self.split)
    }

    /// Label file that belongs to `image_path`, by stem
    pub fn label_path_for(&self, image_path: &Path) -> PathBuf {
        let stem = image_path.file_stem().unwrap_or_default().to_string_lossy();
        self.labels_dir()
            .join(format!("{}.{}", stem, LABEL_EXTENSION))
    }

    /// Create both split directories if they are missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.images_dir(), self.labels_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
        Ok(())
    }
}

/// Case-insensitive extension check
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// Regular files in `dir` with one of `extensions`, sorted by path
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {:?}", dir))?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            if path.is_file() && has_extension(&path, extensions) {
                Some(path)
            } else {
                None
            }
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Stems that have only one half of an image/annotation pair
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PairingReport {
    pub image_only: BTreeSet<String>,
    pub annotation_only: BTreeSet<String>,
}

impl PairingReport {
    pub fn is_clean(&self) -> bool {
        self.image_only.is_empty() && self.annotation_only.is_empty()
    }
}

fn stems(files: &[PathBuf]) -> BTreeSet<String> {
    files
        .iter()
        .filter_map(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .collect()
}

/// Partition files in `dir` by stem into image-only and annotation-only sets
pub fn check_pairing(dir: &Path, image_ext: &str, annotation_ext: &str) -> Result<PairingReport> {
    let image_ext = image_ext.to_lowercase();
    let annotation_ext = annotation_ext.to_lowercase();
    let images = stems(&list_files(dir, &[image_ext.as_str()])?);
    let annotations = stems(&list_files(dir, &[annotation_ext.as_str()])?);

    Ok(PairingReport {
        image_only: images.difference(&annotations).cloned().collect(),
        annotation_only: annotations.difference(&images).cloned().collect(),
    })
}
