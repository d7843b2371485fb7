//! Tunable policy for the palette pipeline.
//!
//! Everything here has a sensible default; a JSON file can override any
//! subset of it:
//!
//! ```no_run
//! use earthtones::EarthtonesConfig;
//! use std::path::Path;
//!
//! let config = EarthtonesConfig::from_json_file(Path::new("earthtones.json"))?;
//! # Ok::<(), earthtones::EarthtonesError>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EarthtonesError, Result};

/// Highest zoom level of the XYZ tile scheme.
pub const TILE_SCHEME_MAX_ZOOM: u32 = 22;

/// Default imagery source: Esri World Imagery (note the `{y}/{x}` order).
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthtonesConfig {
    /// Lowest accepted zoom
    pub min_zoom: u32,

    /// Highest accepted zoom; deeper tiles are often missing for remote areas
    pub max_zoom: u32,

    /// PAM with a sample rate below this logs a speed advisory
    pub advisory_sample_rate: usize,

    pub kmeans: KmeansConfig,

    pub pam: PamConfig,

    pub tiles: TileConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmeansConfig {
    /// Lloyd iterations per run
    pub max_iter: usize,

    /// Convergence threshold on centroid movement
    pub converge: f32,

    /// Restarts with consecutive seeds; the lowest-score run wins
    pub runs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PamConfig {
    /// Upper bound on SWAP iterations
    pub max_swaps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// XYZ template containing `{z}`, `{x}` and `{y}`
    pub url_template: String,

    pub user_agent: String,

    /// Per-request timeout
    pub http_timeout_secs: u64,
}

impl Default for EarthtonesConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 13,
            advisory_sample_rate: 300,
            kmeans: KmeansConfig::default(),
            pam: PamConfig::default(),
            tiles: TileConfig::default(),
        }
    }
}

impl Default for KmeansConfig {
    fn default() -> Self {
        Self {
            max_iter: 20,
            converge: 1e-4,
            runs: 3,
        }
    }
}

impl Default for PamConfig {
    fn default() -> Self {
        Self { max_swaps: 100 }
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl EarthtonesConfig {
    /// Load and validate a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EarthtonesError::invalid_parameter("config", format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| EarthtonesError::invalid_parameter("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EarthtonesError::invalid_parameter("config", e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            EarthtonesError::invalid_parameter("config", format!("cannot write {}: {e}", path.display()))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_zoom > self.max_zoom {
            return Err(EarthtonesError::invalid_parameter(
                "min_zoom",
                format!("{} exceeds max_zoom {}", self.min_zoom, self.max_zoom),
            ));
        }
        if self.max_zoom > TILE_SCHEME_MAX_ZOOM {
            return Err(EarthtonesError::invalid_parameter(
                "max_zoom",
                format!("{} exceeds the tile scheme limit {TILE_SCHEME_MAX_ZOOM}", self.max_zoom),
            ));
        }
        if self.kmeans.max_iter == 0 || self.kmeans.runs == 0 {
            return Err(EarthtonesError::invalid_parameter(
                "kmeans",
                "max_iter and runs must be positive",
            ));
        }
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.tiles.url_template.contains(placeholder) {
                return Err(EarthtonesError::invalid_parameter(
                    "tiles.url_template",
                    format!("missing {placeholder} placeholder"),
                ));
            }
        }
        Ok(())
    }
}
