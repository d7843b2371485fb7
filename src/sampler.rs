//! Pixel filtering and subsampling ahead of clustering.
//!
//! Subsampling is a fixed stride over the valid pixels in scan order, not a
//! random draw. It bounds the clustering workload but a large stride can
//! skip colors that only cover a small part of the tile (a pond, a road).

use image::{RgbImage, RgbaImage};
use palette::Srgb;
use tracing::{debug, warn};

use crate::cluster::Method;
use crate::color::Display;
use crate::{EarthtonesError, Result};

/// Range the channels of a [`PixelGrid`] are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelScale {
    /// Channels in `[0, 255]`
    Byte,
    /// Channels in `[0, 1]`
    Unit,
}

impl ChannelScale {
    fn max(self) -> f32 {
        match self {
            ChannelScale::Byte => 255.0,
            ChannelScale::Unit => 1.0,
        }
    }
}

/// Row-major grid of RGB samples. A missing pixel is any record with a
/// non-finite channel; [`PixelGrid::MISSING`] is the canonical marker.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    scale: ChannelScale,
    pixels: Vec<[f32; 3]>,
}

impl PixelGrid {
    pub const MISSING: [f32; 3] = [f32::NAN; 3];

    pub fn new(width: usize, height: usize, scale: ChannelScale, pixels: Vec<[f32; 3]>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(EarthtonesError::invalid_parameter(
                "grid",
                format!(
                    "{width}x{height} grid needs {} pixels, got {}",
                    width * height,
                    pixels.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            scale,
            pixels,
        })
    }

    /// Build a grid of `width * height` copies of one pixel.
    pub fn filled(width: usize, height: usize, scale: ChannelScale, pixel: [f32; 3]) -> Self {
        Self {
            width,
            height,
            scale,
            pixels: vec![pixel; width * height],
        }
    }

    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let pixels = img
            .pixels()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            scale: ChannelScale::Byte,
            pixels,
        }
    }

    /// Fully transparent pixels are treated as no-data; any other alpha is ignored.
    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        let pixels = img
            .pixels()
            .map(|p| {
                if p[3] == 0 {
                    Self::MISSING
                } else {
                    [p[0] as f32, p[1] as f32, p[2] as f32]
                }
            })
            .collect();
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            scale: ChannelScale::Byte,
            pixels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn scale(&self) -> ChannelScale {
        self.scale
    }

    pub fn pixels(&self) -> &[[f32; 3]] {
        &self.pixels
    }

    fn is_valid(&self, pixel: &[f32; 3]) -> bool {
        let max = self.scale.max();
        pixel.iter().all(|c| c.is_finite() && (0.0..=max).contains(c))
    }
}

/// Keep valid pixels, then every `every_nth` of them, normalised to `[0, 1]`.
pub fn sample(grid: &PixelGrid, every_nth: usize) -> Result<Vec<Display>> {
    if every_nth == 0 {
        return Err(EarthtonesError::invalid_parameter(
            "sample_rate",
            "must be a positive integer",
        ));
    }

    let max = grid.scale.max() as f64;
    let samples: Vec<Display> = grid
        .pixels
        .iter()
        .filter(|p| grid.is_valid(p))
        .step_by(every_nth)
        .map(|p| Srgb::new(p[0] as f64 / max, p[1] as f64 / max, p[2] as f64 / max))
        .collect();

    if samples.is_empty() {
        return Err(EarthtonesError::insufficient_data(format!(
            "no valid pixels in {}x{} grid",
            grid.width, grid.height
        )));
    }

    debug!(
        total = grid.pixels.len(),
        kept = samples.len(),
        every_nth,
        "sampled pixel grid"
    );
    Ok(samples)
}

/// Whether `method` combined with `every_nth` is a known slow configuration.
///
/// This is a performance hint only: PAM is quadratic in the sample count, so
/// a small stride makes it crawl on a full tile.
pub fn speed_advisory(method: Method, every_nth: usize, threshold: usize) -> bool {
    method == Method::Medoid && every_nth < threshold
}

/// Log the advisory when [`speed_advisory`] applies. Never alters control flow.
pub(crate) fn advise(method: Method, every_nth: usize, threshold: usize) {
    if speed_advisory(method, every_nth, threshold) {
        warn!(
            method = %method,
            every_nth,
            threshold,
            "pam with a sample rate below {threshold} can be very slow; consider kmeans or a larger sample rate"
        );
    }
}
