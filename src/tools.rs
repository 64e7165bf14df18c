//! Directory-level dataset chores: bulk resize, tiling and renumbering.
//! None of these touch YOLO boxes; they run before or after augmentation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use image::imageops::{self, FilterType};
use serde_json::Value;

use crate::augment::load_rgb;
use crate::dataset::list_files;

/// Raster formats accepted by the resize and tile tools
pub const RASTER_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

/// Resize every raster in `input` to exactly `width`x`height`, saving
/// `<stem>.<out_ext>` into `output`. Returns the number of images written.
pub fn resize_dir(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    out_ext: &str,
) -> Result<usize> {
    ensure!(
        width > 0 && height > 0,
        "Target size must be positive (got {}x{})",
        width,
        height
    );
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create directory: {:?}", output))?;

    let mut written = 0;
    for path in list_files(input, &RASTER_EXTENSIONS)? {
        let img = match load_rgb(&path) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Skipping unreadable image {:?}: {:#}", path, e);
                continue;
            }
        };

        let resized = imageops::resize(&img, width, height, FilterType::Triangle);
        let out_path = output.join(format!("{}.{}", stem_of(&path), out_ext));
        resized
            .save(&out_path)
            .with_context(|| format!("Failed to save image: {:?}", out_path))?;

        log::info!("Saved {:?}", out_path);
        written += 1;
    }

    Ok(written)
}

/// Cut every image in `input` into non-overlapping `tile`x`tile` squares
/// (partial tiles on the right and bottom edges are dropped), scale each to
/// `out_size`x`out_size` and save as `<prefix>_NNN.png`. Numbering runs across
/// the whole directory. Returns the number of tiles written.
pub fn tile_dir(
    input: &Path,
    output: &Path,
    tile: u32,
    out_size: u32,
    prefix: &str,
) -> Result<usize> {
    ensure!(tile > 0 && out_size > 0, "Tile sizes must be positive");
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create directory: {:?}", output))?;

    let mut count = 0;
    for path in list_files(input, &RASTER_EXTENSIONS)? {
        let img = match load_rgb(&path) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Skipping unreadable image {:?}: {:#}", path, e);
                continue;
            }
        };

        let (width, height) = img.dimensions();
        for row in 0..height / tile {
            for col in 0..width / tile {
                let cropped = imageops::crop_imm(&img, col * tile, row * tile, tile, tile).to_image();
                let scaled = if tile == out_size {
                    cropped
                } else {
                    imageops::resize(&cropped, out_size, out_size, FilterType::Triangle)
                };

                count += 1;
                let out_path = output.join(format!("{}_{:03}.png", prefix, count));
                scaled
                    .save(&out_path)
                    .with_context(|| format!("Failed to save tile: {:?}", out_path))?;
            }
        }
        log::debug!("Tiled {:?} ({}x{})", path, width, height);
    }

    Ok(count)
}

/// First run of ASCII digits in `s`
fn first_number(s: &str) -> Option<&str> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Replace every run of ASCII digits in `s` with `replacement`
fn replace_numbers(s: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_digits = false;
    for c in s.chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                out.push_str(replacement);
                in_digits = true;
            }
        } else {
            in_digits = false;
            out.push(c);
        }
    }
    out
}

/// A rename performed by `renumber_sequence`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Close gaps in a numbered file series.
///
/// Files named `<prefix><number>…<.ext>` are sorted by number and renamed to
/// `<new_prefix><NNN>.<ext>` with numbers running from 1. When `new_prefix` is
/// `None` the prefix is kept. Names already taken are skipped over.
pub fn renumber_sequence(
    dir: &Path,
    prefix: &str,
    ext: &str,
    new_prefix: Option<&str>,
) -> Result<Vec<Rename>> {
    let target_prefix = new_prefix.unwrap_or(prefix);
    let ext = ext.to_lowercase();

    let mut numbered: Vec<(u64, PathBuf)> = list_files(dir, &[ext.as_str()])?
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            let number = first_number(name.strip_prefix(prefix)?)?.parse().ok()?;
            Some((number, path))
        })
        .collect();
    numbered.sort();

    let mut renames = Vec::new();
    let mut expected = 1u64;
    for (current, path) in numbered {
        if current != expected || target_prefix != prefix {
            let mut new_path = dir.join(format!("{}{:03}.{}", target_prefix, expected, ext));
            while new_path.exists() && new_path != path {
                expected += 1;
                new_path = dir.join(format!("{}{:03}.{}", target_prefix, expected, ext));
            }

            if new_path != path {
                fs::rename(&path, &new_path)
                    .with_context(|| format!("Failed to rename {:?} to {:?}", path, new_path))?;
                log::info!("Renamed {:?} -> {:?}", path, new_path);
                renames.push(Rename {
                    from: path,
                    to: new_path,
                });
            }
        }
        expected += 1;
    }

    Ok(renames)
}

/// Make the number inside each JSON annotation's `imagePath` match the number
/// in the annotation's own file name. Returns the number of files rewritten.
pub fn sync_image_paths(dir: &Path) -> Result<usize> {
    let mut updated = 0;

    for path in list_files(dir, &["json"])? {
        let name = stem_of(&path);
        let Some(file_num) = first_number(&name) else {
            log::warn!("No number in file name: {:?}", path);
            continue;
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read annotation: {:?}", path))?;
        let mut data: Value = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Skipping invalid JSON {:?}: {}", path, e);
                continue;
            }
        };

        let Some(image_path) = data.get("imagePath").and_then(Value::as_str) else {
            log::warn!("No imagePath field in {:?}", path);
            continue;
        };
        let Some(image_num) = first_number(image_path) else {
            log::warn!("No number in imagePath {:?} of {:?}", image_path, path);
            continue;
        };

        if image_num == file_num {
            log::debug!("{:?} already consistent: {}", path, image_path);
            continue;
        }

        let new_image_path = replace_numbers(image_path, file_num);
        log::info!("Updated {:?}: {} -> {}", path, image_path, new_image_path);
        data["imagePath"] = Value::String(new_image_path);

        let pretty = serde_json::to_string_pretty(&data)
            .with_context(|| format!("Failed to encode annotation: {:?}", path))?;
        fs::write(&path, pretty)
            .with_context(|| format!("Failed to write annotation: {:?}", path))?;
        updated += 1;
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    #[test]
    fn test_number_helpers() {
        assert_eq!(first_number("filling_012.json"), Some("012"));
        assert_eq!(first_number("no digits"), None);
        assert_eq!(replace_numbers("img_7_v2.png", "015"), "img_015_v015.png");
    }

    #[test]
    fn test_resize_dir() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        RgbImage::new(64, 32)
            .save(input.path().join("a.jpg"))
            .unwrap();
        RgbImage::new(10, 10)
            .save(input.path().join("b.PNG"))
            .unwrap();
        fs::write(input.path().join("broken.png"), b"nope").unwrap();
        fs::write(input.path().join("notes.txt"), b"skip me").unwrap();

        let written = resize_dir(input.path(), output.path(), 16, 8, "png").unwrap();
        assert_eq!(written, 2);

        let a = image::open(output.path().join("a.png")).unwrap();
        assert_eq!(a.dimensions(), (16, 8));
        assert!(output.path().join("b.png").exists());
    }

    #[test]
    fn test_tile_dir_drops_partial_tiles() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let img = RgbImage::from_fn(50, 20, |x, _| Rgb([(x * 5) as u8, 0, 0]));
        img.save(input.path().join("field.png")).unwrap();

        let count = tile_dir(input.path(), output.path(), 16, 8, "dough").unwrap();
        // 3 columns x 1 row of full 16px tiles
        assert_eq!(count, 3);

        let first = image::open(output.path().join("dough_001.png")).unwrap();
        assert_eq!(first.dimensions(), (8, 8));
        assert!(output.path().join("dough_003.png").exists());
        assert!(!output.path().join("dough_004.png").exists());
    }

    #[test]
    fn test_renumber_sequence_closes_gaps() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["filling_002.json", "filling_005.json", "filling_010.json", "other_001.json"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let renames = renumber_sequence(dir.path(), "filling_", "json", None).unwrap();
        assert_eq!(renames.len(), 3);

        for (i, original) in ["filling_002.json", "filling_005.json", "filling_010.json"]
            .iter()
            .enumerate()
        {
            let renamed = dir.path().join(format!("filling_{:03}.json", i + 1));
            assert_eq!(fs::read_to_string(renamed).unwrap(), *original);
        }
        assert!(dir.path().join("other_001.json").exists());
    }

    #[test]
    fn test_renumber_sequence_with_new_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("flowering_001.json"), "{}").unwrap();
        fs::write(dir.path().join("flowering_002.json"), "{}").unwrap();

        let renames =
            renumber_sequence(dir.path(), "flowering_", "json", Some("filling_")).unwrap();
        assert_eq!(renames.len(), 2);
        assert!(dir.path().join("filling_001.json").exists());
        assert!(dir.path().join("filling_002.json").exists());
        assert!(!dir.path().join("flowering_001.json").exists());
    }

    #[test]
    fn test_sync_image_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("filling_007.json"),
            r#"{"imagePath": "filling_003.png", "shapes": []}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("filling_008.json"),
            r#"{"imagePath": "filling_008.png"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("filling_009.json"), r#"{"shapes": []}"#).unwrap();

        assert_eq!(sync_image_paths(dir.path()).unwrap(), 1);

        let data: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("filling_007.json")).unwrap())
                .unwrap();
        assert_eq!(data["imagePath"], "filling_007.png");
        assert_eq!(data["shapes"], Value::Array(vec![]));
    }

    #[test]
    fn test_sync_image_paths_keeps_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filling_012.json");
        fs::write(
            &path,
            r#"{"version": "5.2.1", "shapes": [], "imagePath": "filling_002.png", "imageHeight": 512}"#,
        )
        .unwrap();

        assert_eq!(sync_image_paths(dir.path()).unwrap(), 1);

        let text = fs::read_to_string(&path).unwrap();
        let positions: Vec<usize> = ["\"version\"", "\"shapes\"", "\"imagePath\"", "\"imageHeight\""]
            .iter()
            .map(|key| text.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", text);
        assert!(text.contains("filling_012.png"));
    }
}
