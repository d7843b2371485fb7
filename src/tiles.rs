//! Imagery retrieval: the [`TileSource`] seam, XYZ tile windowing and
//! stitching, and (with the `tiles` feature) a blocking HTTP source.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::config::TILE_SCHEME_MAX_ZOOM;
use crate::geo::{BoundingBox, ORIGIN_SHIFT};
use crate::sampler::PixelGrid;
use crate::{EarthtonesError, Result};

/// Edge length of an XYZ tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Refuse windows needing more tiles than this.
pub const MAX_TILES: usize = 64;

/// Imagery providers the crate knows how to address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Esri World Imagery, or whatever `tiles.url_template` points at
    #[default]
    #[serde(rename = "default", alias = "esri.worldimagery")]
    EsriWorldImagery,
}

impl Provider {
    pub const ALL: [Provider; 1] = [Provider::EsriWorldImagery];

    pub fn name(self) -> &'static str {
        match self {
            Provider::EsriWorldImagery => "default",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Provider::EsriWorldImagery => &["default", "esri.worldimagery"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = EarthtonesError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Provider::ALL
            .into_iter()
            .find(|p| p.aliases().iter().any(|a| a.eq_ignore_ascii_case(wanted)))
            .ok_or_else(|| {
                let names: Vec<&str> = Provider::ALL.iter().flat_map(|p| p.aliases().iter().copied()).collect();
                EarthtonesError::invalid_parameter(
                    "provider",
                    format!("`{s}` is not supported; expected one of: {}", names.join(", ")),
                )
            })
    }
}

/// Retrieved imagery plus its georeferencing.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub image: RgbaImage,
    /// Extent actually covered by `image`, EPSG:3857 metres
    pub bbox: BoundingBox,
    pub zoom: u32,
}

impl Raster {
    pub fn pixel_grid(&self) -> PixelGrid {
        PixelGrid::from_rgba_image(&self.image)
    }
}

/// Source of imagery for a bounding box.
pub trait TileSource {
    /// With `crop`, the raster covers exactly `bbox`; otherwise it covers
    /// every whole tile touching it.
    fn fetch(&self, bbox: &BoundingBox, provider: Provider, zoom: u32, crop: bool) -> Result<Raster>;
}

/// Pixel window, in global pixel coordinates at one zoom, and the tiles under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWindow {
    pub zoom: u32,
    pub x0: u32,
    pub y0: u32,
    pub width: u32,
    pub height: u32,
}

impl TileWindow {
    pub fn new(bbox: &BoundingBox, zoom: u32, crop: bool) -> Result<Self> {
        if zoom > TILE_SCHEME_MAX_ZOOM {
            return Err(EarthtonesError::invalid_parameter(
                "zoom",
                format!("{zoom} exceeds the tile scheme limit {TILE_SCHEME_MAX_ZOOM}"),
            ));
        }
        let world = TILE_SIZE as f64 * 2f64.powi(zoom as i32);
        let to_px = |x: f64| (x + ORIGIN_SHIFT) / (2.0 * ORIGIN_SHIFT) * world;
        let to_py = |y: f64| (ORIGIN_SHIFT - y) / (2.0 * ORIGIN_SHIFT) * world;
        let limit = |v: f64| v.clamp(0.0, world);

        let mut x0 = limit(to_px(bbox.min_x)).floor();
        let mut x1 = limit(to_px(bbox.max_x)).ceil();
        let mut y0 = limit(to_py(bbox.max_y)).floor();
        let mut y1 = limit(to_py(bbox.min_y)).ceil();

        if !crop {
            let tile = TILE_SIZE as f64;
            x0 = (x0 / tile).floor() * tile;
            y0 = (y0 / tile).floor() * tile;
            x1 = ((x1 / tile).ceil() * tile).min(world);
            y1 = ((y1 / tile).ceil() * tile).min(world);
        }

        let window = Self {
            zoom,
            x0: x0 as u32,
            y0: y0 as u32,
            width: (x1 - x0).max(1.0) as u32,
            height: (y1 - y0).max(1.0) as u32,
        };
        let count = window.tiles().count();
        if count > MAX_TILES {
            return Err(EarthtonesError::invalid_parameter(
                "bbox",
                format!("needs {count} tiles at zoom {zoom}, limit is {MAX_TILES}"),
            ));
        }
        Ok(window)
    }

    /// `(x, y)` indices of every tile overlapping the window, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32)> + use<> {
        let last_tile = 1u32.checked_shl(self.zoom).map_or(u32::MAX, |n| n - 1);
        let tx0 = self.x0 / TILE_SIZE;
        let ty0 = self.y0 / TILE_SIZE;
        let tx1 = ((self.x0 + self.width - 1) / TILE_SIZE).min(last_tile);
        let ty1 = ((self.y0 + self.height - 1) / TILE_SIZE).min(last_tile);
        (ty0..=ty1).flat_map(move |ty| (tx0..=tx1).map(move |tx| (tx, ty)))
    }

    /// Extent of the window in EPSG:3857 metres.
    pub fn bbox(&self) -> BoundingBox {
        let world = TILE_SIZE as f64 * 2f64.powi(self.zoom as i32);
        let to_x = |px: f64| px / world * 2.0 * ORIGIN_SHIFT - ORIGIN_SHIFT;
        let to_y = |py: f64| ORIGIN_SHIFT - py / world * 2.0 * ORIGIN_SHIFT;
        BoundingBox {
            min_x: to_x(self.x0 as f64),
            max_x: to_x((self.x0 + self.width) as f64),
            min_y: to_y((self.y0 + self.height) as f64),
            max_y: to_y(self.y0 as f64),
        }
    }

    /// Paste tiles into a transparent canvas the size of the window. Missing
    /// tiles (`None`) stay transparent, i.e. no-data.
    pub fn stitch<I>(&self, tiles: I) -> RgbaImage
    where
        I: IntoIterator<Item = ((u32, u32), Option<RgbaImage>)>,
    {
        let mut canvas = RgbaImage::new(self.width, self.height);
        for ((tx, ty), tile) in tiles {
            let Some(mut tile) = tile else { continue };
            if tile.dimensions() != (TILE_SIZE, TILE_SIZE) {
                tile = imageops::resize(&tile, TILE_SIZE, TILE_SIZE, FilterType::Triangle);
            }
            let dx = (tx * TILE_SIZE) as i64 - self.x0 as i64;
            let dy = (ty * TILE_SIZE) as i64 - self.y0 as i64;
            imageops::replace(&mut canvas, &tile, dx, dy);
        }
        canvas
    }
}

#[cfg(feature = "tiles")]
pub use http::HttpTileSource;

#[cfg(feature = "tiles")]
mod http {
    use std::time::Duration;

    use image::RgbaImage;
    use reqwest::StatusCode;
    use reqwest::blocking::Client;
    use tracing::{debug, info, warn};

    use super::{Provider, Raster, TileSource, TileWindow};
    use crate::config::TileConfig;
    use crate::geo::BoundingBox;
    use crate::{EarthtonesError, Result};

    /// Blocking XYZ tile client for the configured imagery template.
    pub struct HttpTileSource {
        client: Client,
        url_template: String,
    }

    impl HttpTileSource {
        pub fn new(config: &TileConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|e| EarthtonesError::retrieval("failed to build HTTP client", e))?;
            Ok(Self {
                client,
                url_template: config.url_template.clone(),
            })
        }

        pub fn tile_url(&self, zoom: u32, x: u32, y: u32) -> String {
            self.url_template
                .replace("{z}", &zoom.to_string())
                .replace("{x}", &x.to_string())
                .replace("{y}", &y.to_string())
        }

        /// `Ok(None)` when the provider has no tile at this position.
        fn fetch_tile(&self, zoom: u32, x: u32, y: u32) -> Result<Option<RgbaImage>> {
            let url = self.tile_url(zoom, x, y);
            let response = self
                .client
                .get(&url)
                .send()
                .map_err(|e| EarthtonesError::retrieval(format!("GET {url}"), e))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                warn!(%url, "tile not found, treating as no-data");
                return Ok(None);
            }
            if !status.is_success() {
                return Err(EarthtonesError::retrieval_message(format!("GET {url} returned {status}")));
            }

            let bytes = response
                .bytes()
                .map_err(|e| EarthtonesError::retrieval(format!("reading body of {url}"), e))?;
            let tile = image::load_from_memory(&bytes)
                .map_err(|e| EarthtonesError::image_decode(format!("tile {zoom}/{x}/{y}"), e))?;
            debug!(%url, bytes = bytes.len(), "fetched tile");
            Ok(Some(tile.to_rgba8()))
        }
    }

    impl TileSource for HttpTileSource {
        fn fetch(&self, bbox: &BoundingBox, provider: Provider, zoom: u32, crop: bool) -> Result<Raster> {
            let window = TileWindow::new(bbox, zoom, crop)?;
            let tiles = window
                .tiles()
                .map(|(x, y)| Ok(((x, y), self.fetch_tile(zoom, x, y)?)))
                .collect::<Result<Vec<_>>>()?;
            let found = tiles.iter().filter(|(_, t)| t.is_some()).count();
            info!(
                %provider,
                zoom,
                tiles = tiles.len(),
                found,
                width = window.width,
                height = window.height,
                "retrieved imagery"
            );
            Ok(Raster {
                image: window.stitch(tiles),
                bbox: window.bbox(),
                zoom,
            })
        }
    }

}
