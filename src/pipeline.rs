//! Sampling → L*a*b* → clustering → hex palette.

use std::fmt;

use palette::convert::FromColorUnclamped;
use palette::Srgb;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::cluster::{self, ClusterOptions, Method};
use crate::color::{self, Perceptual};
use crate::config::EarthtonesConfig;
use crate::sampler::{self, PixelGrid};
use crate::Result;

/// Ordered palette colors. Order is whatever the clustering produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Palette {
    colors: Vec<Srgb<u8>>,
}

impl Palette {
    pub fn new(colors: Vec<Srgb<u8>>) -> Self {
        Self { colors }
    }

    /// Parse `#RRGGBB` strings.
    pub fn from_hex<S: AsRef<str>>(hex: &[S]) -> Result<Self> {
        let colors = hex
            .iter()
            .map(|h| color::parse_hex(h.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[Srgb<u8>] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn to_hex(&self) -> Vec<String> {
        self.colors.iter().map(|&c| color::to_hex(c)).collect()
    }

    /// Canonical order for snapshots: ascending L*, stable for equal lightness.
    pub fn sorted_by_lightness(&self) -> Palette {
        let mut keyed: Vec<(f64, Srgb<u8>)> = self
            .colors
            .iter()
            .map(|&c| {
                let lab = Perceptual::from_color_unclamped(c.into_format::<f64>());
                (lab.l, c)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        Palette::new(keyed.into_iter().map(|(_, c)| c).collect())
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex().join(" "))
    }
}

impl Serialize for Palette {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Palette {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = Vec::<String>::deserialize(deserializer)?;
        Palette::from_hex(hex.as_slice()).map_err(D::Error::custom)
    }
}

/// Inverse-convert cluster representatives, clamp each channel, quantise.
pub fn representatives_to_palette(representatives: &[Perceptual]) -> Palette {
    Palette::new(
        color::to_display(representatives)
            .into_iter()
            .map(color::quantize)
            .collect(),
    )
}

/// Parameters of one palette extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractParams {
    pub number_of_colors: usize,
    pub method: Method,
    /// Keep every n-th valid pixel
    pub sample_rate: usize,
    pub seed: Option<u64>,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            number_of_colors: 3,
            method: Method::Medoid,
            sample_rate: 500,
            seed: None,
        }
    }
}

/// Run the full color pipeline on a pixel grid.
pub fn extract_palette(grid: &PixelGrid, params: &ExtractParams, config: &EarthtonesConfig) -> Result<Palette> {
    sampler::advise(params.method, params.sample_rate, config.advisory_sample_rate);

    let samples = sampler::sample(grid, params.sample_rate)?;
    let perceptual = color::to_perceptual(&samples);
    let options = ClusterOptions::from_config(config, params.seed);
    let result = cluster::cluster(&perceptual, params.number_of_colors, params.method, &options)?;
    let palette = representatives_to_palette(&result.representatives);

    debug!(palette = %palette, "extracted palette");
    Ok(palette)
}
