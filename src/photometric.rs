use std::fmt;
use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use image::{Rgb, Rgb32FImage, RgbImage};
use imageproc::filter::separable_filter_equal;

/// Scalar mean over every channel of every pixel
fn mean_intensity(img: &RgbImage) -> f64 {
    let raw = img.as_raw();
    if raw.is_empty() {
        return 0.0;
    }

    let sum: u64 = raw.iter().map(|&v| v as u64).sum();
    sum as f64 / raw.len() as f64
}

/// Scale contrast around the global mean: `(p - mean) * factor + mean`, clipped to
/// [0, 255] and truncated.
///
/// The expression is evaluated as `p * factor + mean * (1 - factor)` so that a
/// factor of exactly 1.0 returns the input unchanged.
pub fn adjust_contrast(img: &RgbImage, factor: f64) -> Result<RgbImage> {
    ensure!(
        factor.is_finite() && factor > 0.0,
        "Contrast factor must be a positive number (got {})",
        factor
    );

    let mean = mean_intensity(img);
    let offset = mean * (1.0 - factor);

    let mut output = img.clone();
    for value in output.iter_mut() {
        *value = (*value as f64 * factor + offset).clamp(0.0, 255.0) as u8;
    }

    Ok(output)
}

/// Odd, square Gaussian kernel size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurKernel(u32);

impl BlurKernel {
    pub fn new(size: u32) -> Result<Self> {
        ensure!(
            size >= 1 && size % 2 == 1,
            "Blur kernel size must be a positive odd number (got {})",
            size
        );
        Ok(Self(size))
    }

    pub fn size(self) -> u32 {
        self.0
    }

    /// Standard deviation used when none is given explicitly
    pub fn sigma(self) -> f64 {
        0.3 * ((self.0 as f64 - 1.0) * 0.5 - 1.0) + 0.8
    }

    /// Normalized 1D Gaussian weights, `size` taps
    pub fn weights(self) -> Vec<f32> {
        let sigma = self.sigma();
        let radius = (self.0 / 2) as i64;
        let denom = 2.0 * sigma * sigma;

        let raw: Vec<f64> = (-radius..=radius)
            .map(|i| (-((i * i) as f64) / denom).exp())
            .collect();
        let total: f64 = raw.iter().sum();

        raw.into_iter().map(|w| (w / total) as f32).collect()
    }
}

impl Default for BlurKernel {
    fn default() -> Self {
        Self(5)
    }
}

impl fmt::Display for BlurKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.0, self.0)
    }
}

impl FromStr for BlurKernel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let size: u32 = s
            .trim()
            .parse()
            .with_context(|| format!("Invalid blur kernel size: {}", s))?;
        Self::new(size)
    }
}

/// Isotropic Gaussian blur with a square kernel.
///
/// Both passes run in `f32`; the result is rounded back to `u8` once.
pub fn gaussian_blur(img: &RgbImage, kernel: BlurKernel) -> RgbImage {
    if kernel.size() == 1 {
        return img.clone();
    }

    let (width, height) = img.dimensions();
    let widened = Rgb32FImage::from_fn(width, height, |x, y| {
        Rgb(img.get_pixel(x, y).0.map(f32::from))
    });
    let blurred = separable_filter_equal(&widened, &kernel.weights());

    RgbImage::from_fn(width, height, |x, y| {
        Rgb(blurred
            .get_pixel(x, y)
            .0
            .map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}
