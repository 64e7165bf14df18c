use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::augment::{Augmentation, AugmentConfig, DEFAULT_CONTRAST_FACTORS};
use crate::dataset::DatasetLayout;
use crate::photometric::BlurKernel;

#[derive(Parser, Debug)]
#[command(name = "yolo-augment")]
#[command(version, about = "Augment YOLO datasets with flips, quarter turns, contrast and blur")]
pub struct Cli {
    /// Show per-file details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write flipped, rotated, contrast-adjusted and blurred copies of every labelled image
    Augment(AugmentArgs),
    /// Report images without annotations and annotations without images
    Check {
        /// Directory holding both images and annotations
        directory: PathBuf,

        #[arg(long, default_value = "png")]
        image_ext: String,

        #[arg(long, default_value = "json")]
        annotation_ext: String,
    },
    /// Resize every image in a directory to a fixed size
    Resize {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Target size as WIDTHxHEIGHT
        #[arg(short, long, default_value = "512x512", value_parser = parse_size)]
        size: (u32, u32),

        /// Extension (and format) of the written files
        #[arg(long, default_value = "png")]
        format: String,
    },
    /// Cut images into square tiles
    Tile {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Tile edge length in source pixels
        #[arg(short, long, value_parser = parse_tile)]
        tile: u32,

        /// Edge length each tile is scaled to
        #[arg(long, default_value = "1024")]
        out_size: u32,

        /// Output file name prefix
        #[arg(long, default_value = "tile")]
        prefix: String,
    },
    /// Renumber a file series so numbers run 1, 2, 3, ... without gaps
    Renumber {
        directory: PathBuf,

        /// Common file name prefix, e.g. "filling_"
        #[arg(short, long)]
        prefix: String,

        #[arg(long, default_value = "json")]
        ext: String,

        /// Replace the prefix while renumbering
        #[arg(long)]
        new_prefix: Option<String>,
    },
    /// Make the number in each JSON annotation's imagePath match its file name
    SyncImagePath { directory: PathBuf },
}

/// Augmentation parameters
#[derive(Args, Debug)]
pub struct AugmentArgs {
    /// Dataset root containing images/<split> and labels/<split>
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output root; the images/labels layout is mirrored here
    #[arg(short, long)]
    pub output: PathBuf,

    /// Dataset split directory name
    #[arg(long, default_value = "train")]
    pub split: String,

    /// Contrast factors, one output each [default: 0.5, 1.5]
    #[arg(long = "contrast", value_parser = parse_contrast)]
    pub contrast: Vec<f64>,

    /// Gaussian blur kernel size (odd)
    #[arg(long, default_value = "5")]
    pub blur_kernel: BlurKernel,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl AugmentArgs {
    pub fn to_config(&self) -> AugmentConfig {
        let factors: &[f64] = if self.contrast.is_empty() {
            &DEFAULT_CONTRAST_FACTORS
        } else {
            &self.contrast
        };

        AugmentConfig {
            input: DatasetLayout::new(&self.input, self.split.as_str()),
            output: DatasetLayout::new(&self.output, self.split.as_str()),
            augmentations: Augmentation::build_set(factors, self.blur_kernel),
            show_progress: !self.no_progress,
        }
    }
}

fn parse_contrast(s: &str) -> Result<f64, String> {
    let factor: f64 = s
        .parse()
        .map_err(|_| format!("Invalid contrast factor: {}", s))?;

    if !factor.is_finite() || factor <= 0.0 {
        return Err("Contrast factor must be positive".to_string());
    }

    Ok(factor)
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split(['x', 'X']).collect();
    if parts.len() != 2 {
        return Err(format!("Invalid size format '{}', expected WxH", s));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width value: {}", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height value: {}", parts[1]))?;

    if width == 0 || height == 0 {
        return Err("Size values must be positive".to_string());
    }

    Ok((width, height))
}

fn parse_tile(s: &str) -> Result<u32, String> {
    let tile: u32 = s.parse().map_err(|_| format!("Invalid tile size: {}", s))?;
    if tile == 0 {
        return Err("Tile size must be positive".to_string());
    }
    Ok(tile)
}
