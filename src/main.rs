use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use yolo_augment::{
    augment_all, check_pairing, renumber_sequence, resize_dir, sync_image_paths, tile_dir, Cli,
    Command,
};

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(default_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Augment(args) => {
            let config = args.to_config();
            let report = augment_all(&config).context("Augmentation aborted")?;

            eprintln!();
            eprintln!(
                "Augmented {} images -> {} new image/label pairs in {:?}",
                report.processed, report.outputs_written, config.output.root
            );
            if !report.missing_labels.is_empty() {
                eprintln!("Skipped {} images without labels", report.missing_labels.len());
            }
            if !report.undecodable.is_empty() {
                eprintln!("Skipped {} unreadable images", report.undecodable.len());
            }
        }
        Command::Check {
            directory,
            image_ext,
            annotation_ext,
        } => {
            let report = check_pairing(directory, image_ext, annotation_ext)
                .with_context(|| format!("Failed to check {:?}", directory))?;

            if !report.image_only.is_empty() {
                eprintln!("{} files without a matching {} file:", image_ext, annotation_ext);
                for stem in &report.image_only {
                    eprintln!("  - {}.{}", stem, image_ext);
                }
            }
            if !report.annotation_only.is_empty() {
                eprintln!("{} files without a matching {} file:", annotation_ext, image_ext);
                for stem in &report.annotation_only {
                    eprintln!("  - {}.{}", stem, annotation_ext);
                }
            }
            if report.is_clean() {
                eprintln!("All {} and {} files are paired.", image_ext, annotation_ext);
            }

            eprintln!();
            eprintln!(
                "Summary: {} unpaired {} files, {} unpaired {} files",
                report.image_only.len(),
                image_ext,
                report.annotation_only.len(),
                annotation_ext
            );
        }
        Command::Resize {
            input,
            output,
            size,
            format,
        } => {
            let written = resize_dir(input, output, size.0, size.1, format)?;
            eprintln!("Resized {} images to {}x{} in {:?}", written, size.0, size.1, output);
        }
        Command::Tile {
            input,
            output,
            tile,
            out_size,
            prefix,
        } => {
            let count = tile_dir(input, output, *tile, *out_size, prefix)?;
            eprintln!("Wrote {} tiles to {:?}", count, output);
        }
        Command::Renumber {
            directory,
            prefix,
            ext,
            new_prefix,
        } => {
            let renames = renumber_sequence(directory, prefix, ext, new_prefix.as_deref())?;
            eprintln!("Renamed {} files", renames.len());
        }
        Command::SyncImagePath { directory } => {
            let updated = sync_image_paths(directory)?;
            eprintln!("Updated imagePath in {} files", updated);
        }
    }

    Ok(())
}
