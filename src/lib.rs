//! # earthtones
//!
//! Derive a color palette from satellite imagery of a place.
//!
//! The pipeline samples the pixels of an imagery raster, converts them to
//! CIE L*a*b* (D65), clusters them with k-means or partitioning around
//! medoids, and returns the cluster representatives as `#RRGGBB` colors.
//!
//! ```rust,no_run
//! # #[cfg(feature = "tiles")]
//! # fn main() -> earthtones::Result<()> {
//! use earthtones::{get_earthtones, EarthtonesConfig, EarthtonesRequest, HttpTileSource, Method};
//!
//! let config = EarthtonesConfig::default();
//! let source = HttpTileSource::new(&config.tiles)?;
//! let request = EarthtonesRequest::new(38.9072, -77.0369, 11, 4).method(Method::Centroid);
//! let result = get_earthtones(&request, &source, &config)?;
//! println!("{}", result.palette());
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "tiles"))]
//! # fn main() {}
//! ```
//!
//! The same core runs on any image through [`palette_from_bytes`], which
//! is also exported to JavaScript as `earthtones`.

use image::DynamicImage;
use js_sys::Array;
use wasm_bindgen::prelude::*;

pub mod cluster;
pub mod color;
pub mod config;
pub mod error;
pub mod facade;
pub mod geo;
mod pam;
pub mod pipeline;
pub mod render;
pub mod sampler;
pub mod tiles;

pub use cluster::{ClusterOptions, ClusterResult, Method};
pub use config::EarthtonesConfig;
pub use error::{EarthtonesError, Result};
pub use facade::{Earthtones, EarthtonesRequest, PaletteBundle, get_earthtones};
pub use pipeline::{ExtractParams, Palette, extract_palette};
pub use sampler::{ChannelScale, PixelGrid};
#[cfg(feature = "tiles")]
pub use tiles::HttpTileSource;
pub use tiles::{Provider, Raster, TileSource};

/// Palette of an already decoded image. Fully transparent pixels are skipped.
pub fn palette_from_image(img: &DynamicImage, params: &ExtractParams, config: &EarthtonesConfig) -> Result<Palette> {
    let grid = PixelGrid::from_rgba_image(&img.to_rgba8());
    extract_palette(&grid, params, config)
}

/// Palette of an encoded image (PNG, JPEG, ...).
pub fn palette_from_bytes(input: &[u8], params: &ExtractParams, config: &EarthtonesConfig) -> Result<Palette> {
    let img = image::load_from_memory(input)
        .map_err(|e| EarthtonesError::image_decode("unable to decode image", e))?;
    palette_from_image(&img, params, config)
}

/// Extract `n_colors` hex colors from an encoded image.
///
/// `method` is `"kmeans"` or `"pam"`; `seed` makes k-means reproducible.
#[wasm_bindgen]
pub fn earthtones(
    input: Vec<u8>,
    n_colors: usize,
    method: String,
    sample_rate: usize,
    seed: Option<u64>,
) -> std::result::Result<Array, JsValue> {
    let to_js = |e: EarthtonesError| JsValue::from_str(&e.to_string());

    let params = ExtractParams {
        number_of_colors: n_colors,
        method: method.parse::<Method>().map_err(to_js)?,
        sample_rate,
        seed,
    };
    let palette = palette_from_bytes(&input, &params, &EarthtonesConfig::default()).map_err(to_js)?;

    let palette_js = Array::new();
    for hex in palette.to_hex() {
        palette_js.push(&JsValue::from_str(&hex));
    }
    Ok(palette_js)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img.clone())
            .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn palette_from_png_bytes() {
        let img = RgbaImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgba([200, 160, 90, 255])
            } else {
                Rgba([30, 70, 40, 255])
            }
        });
        let params = ExtractParams {
            number_of_colors: 2,
            method: Method::Medoid,
            sample_rate: 1,
            seed: None,
        };
        let palette = palette_from_bytes(&encode_png(&img), &params, &EarthtonesConfig::default()).unwrap();
        let mut hex = palette.to_hex();
        hex.sort();
        assert_eq!(hex, vec!["#1E4628", "#C8A05A"]);
    }

    #[test]
    fn transparent_image_has_no_data() {
        let img = RgbaImage::new(4, 4);
        let err = palette_from_bytes(&encode_png(&img), &ExtractParams::default(), &EarthtonesConfig::default())
            .unwrap_err();
        assert!(matches!(err, EarthtonesError::InsufficientData { .. }));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = palette_from_bytes(b"not an image", &ExtractParams::default(), &EarthtonesConfig::default())
            .unwrap_err();
        assert!(matches!(err, EarthtonesError::ImageDecode { .. }));
    }
}
