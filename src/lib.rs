pub mod annotation;
pub mod augment;
pub mod cli;
pub mod dataset;
pub mod geometry;
pub mod photometric;
pub mod tools;
pub mod transform;

pub use annotation::{AnnotationSet, BoundingBox};
pub use augment::{augment_all, augment_one, AugmentConfig, AugmentReport, Augmentation, Outcome};
pub use cli::{AugmentArgs, Cli, Command};
pub use dataset::{check_pairing, DatasetLayout, PairingReport};
pub use geometry::QuarterTurn;
pub use photometric::{adjust_contrast, gaussian_blur, BlurKernel};
pub use tools::{renumber_sequence, resize_dir, sync_image_paths, tile_dir};
pub use transform::{horizontal_flip, rotate, vertical_flip};
