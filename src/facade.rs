//! Location → palette entry point.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::cluster::Method;
use crate::config::EarthtonesConfig;
use crate::geo::{self, BoundingBox};
use crate::pipeline::{self, ExtractParams, Palette};
use crate::tiles::{Provider, Raster, TileSource};
use crate::{EarthtonesError, Result};

/// One palette request for a location.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthtonesRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u32,
    pub number_of_colors: usize,
    pub method: Method,
    /// Keep every n-th valid pixel before clustering
    pub sample_rate: usize,
    /// Return the source imagery alongside the palette
    pub include_map: bool,
    pub provider: Provider,
    pub seed: Option<u64>,
}

impl EarthtonesRequest {
    /// Request with the usual defaults: PAM, every 500th pixel, imagery included.
    pub fn new(latitude: f64, longitude: f64, zoom: u32, number_of_colors: usize) -> Self {
        Self {
            latitude,
            longitude,
            zoom,
            number_of_colors,
            method: Method::Medoid,
            sample_rate: 500,
            include_map: true,
            provider: Provider::default(),
            seed: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn sample_rate(mut self, sample_rate: usize) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn include_map(mut self, include_map: bool) -> Self {
        self.include_map = include_map;
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject anything that would waste a network round trip.
    ///
    /// `number_of_colors == 0` is caught here, before any imagery exists, so
    /// it is reported as [`EarthtonesError::InvalidParameter`] naming the field.
    /// Counts above the number of samples can only be detected after sampling
    /// and surface from [`extract_palette`](crate::extract_palette) as
    /// [`EarthtonesError::InvalidClusterCount`]. Both are
    /// [`EarthtonesError::is_caller_error`].
    pub fn validate(&self, config: &EarthtonesConfig) -> Result<()> {
        if !(config.min_zoom..=config.max_zoom).contains(&self.zoom) {
            return Err(EarthtonesError::invalid_parameter(
                "zoom",
                format!(
                    "must be within {}..={}, got {}",
                    config.min_zoom, config.max_zoom, self.zoom
                ),
            ));
        }
        geo::validate_coordinates(self.latitude, self.longitude)?;
        if self.number_of_colors == 0 {
            return Err(EarthtonesError::invalid_parameter(
                "number_of_colors",
                "must be at least 1",
            ));
        }
        if self.sample_rate == 0 {
            return Err(EarthtonesError::invalid_parameter(
                "sample_rate",
                "must be a positive integer",
            ));
        }
        Ok(())
    }

    fn extract_params(&self) -> ExtractParams {
        ExtractParams {
            number_of_colors: self.number_of_colors,
            method: self.method,
            sample_rate: self.sample_rate,
            seed: self.seed,
        }
    }
}

/// A palette together with the imagery it was drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteBundle {
    pub palette: Palette,
    pub raster: Raster,
}

/// Result of [`get_earthtones`]: the palette alone or with its imagery.
#[derive(Debug, Clone, PartialEq)]
pub enum Earthtones {
    Palette(Palette),
    Bundle(PaletteBundle),
}

impl Earthtones {
    pub fn palette(&self) -> &Palette {
        match self {
            Earthtones::Palette(palette) => palette,
            Earthtones::Bundle(bundle) => &bundle.palette,
        }
    }

    pub fn raster(&self) -> Option<&Raster> {
        match self {
            Earthtones::Palette(_) => None,
            Earthtones::Bundle(bundle) => Some(&bundle.raster),
        }
    }

    pub fn into_palette(self) -> Palette {
        match self {
            Earthtones::Palette(palette) => palette,
            Earthtones::Bundle(bundle) => bundle.palette,
        }
    }

    /// Same result with the palette in ascending lightness.
    pub fn sorted_by_lightness(self) -> Self {
        match self {
            Earthtones::Palette(palette) => Earthtones::Palette(palette.sorted_by_lightness()),
            Earthtones::Bundle(mut bundle) => {
                bundle.palette = bundle.palette.sorted_by_lightness();
                Earthtones::Bundle(bundle)
            }
        }
    }
}

/// A palette serializes as a hex array; a bundle adds image metadata.
impl Serialize for Earthtones {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Earthtones::Palette(palette) => palette.serialize(serializer),
            Earthtones::Bundle(bundle) => {
                let mut state = serializer.serialize_struct("PaletteBundle", 2)?;
                state.serialize_field("palette", &bundle.palette)?;
                state.serialize_field(
                    "image",
                    &ImageSummary {
                        width: bundle.raster.image.width(),
                        height: bundle.raster.image.height(),
                        zoom: bundle.raster.zoom,
                        bbox: bundle.raster.bbox,
                    },
                )?;
                state.end()
            }
        }
    }
}

#[derive(Serialize)]
struct ImageSummary {
    width: u32,
    height: u32,
    zoom: u32,
    bbox: BoundingBox,
}

/// Fetch imagery around a location and derive its palette.
pub fn get_earthtones(
    request: &EarthtonesRequest,
    source: &dyn TileSource,
    config: &EarthtonesConfig,
) -> Result<Earthtones> {
    request.validate(config)?;

    let center = geo::to_web_mercator(request.longitude, request.latitude);
    let bbox = BoundingBox::for_zoom(center, request.zoom);
    debug!(?center, ?bbox, zoom = request.zoom, "requesting imagery");

    let raster = source.fetch(&bbox, request.provider, request.zoom, true)?;
    let palette = pipeline::extract_palette(&raster.pixel_grid(), &request.extract_params(), config)?;
    info!(
        latitude = request.latitude,
        longitude = request.longitude,
        zoom = request.zoom,
        palette = %palette,
        "derived earthtones"
    );

    Ok(if request.include_map {
        Earthtones::Bundle(PaletteBundle { palette, raster })
    } else {
        Earthtones::Palette(palette)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    struct Uniform([u8; 3]);

    impl TileSource for Uniform {
        fn fetch(&self, bbox: &BoundingBox, _provider: Provider, zoom: u32, _crop: bool) -> Result<Raster> {
            let [r, g, b] = self.0;
            Ok(Raster {
                image: RgbaImage::from_pixel(16, 16, Rgba([r, g, b, 255])),
                bbox: *bbox,
                zoom,
            })
        }
    }

    #[test]
    fn bundle_or_palette_by_flag() {
        let config = EarthtonesConfig::default();
        let request = EarthtonesRequest::new(38.9, -77.0, 11, 1).sample_rate(1).seed(1);

        let bundled = get_earthtones(&request, &Uniform([0, 128, 0]), &config).unwrap();
        assert!(matches!(bundled, Earthtones::Bundle(_)));
        assert_eq!(bundled.palette().to_hex(), vec!["#008000"]);
        assert_eq!(bundled.raster().map(|r| r.image.width()), Some(16));

        let bare = get_earthtones(&request.clone().include_map(false), &Uniform([0, 128, 0]), &config).unwrap();
        assert!(matches!(bare, Earthtones::Palette(_)));
        assert!(bare.raster().is_none());
    }

    #[test]
    fn validation_messages() {
        let config = EarthtonesConfig::default();
        let err = EarthtonesRequest::new(0.0, 0.0, 14, 3).validate(&config).unwrap_err();
        assert!(err.to_string().contains("0..=13"), "{err}");
        assert!(EarthtonesRequest::new(0.0, 0.0, 5, 0).validate(&config).is_err());
        assert!(EarthtonesRequest::new(0.0, 0.0, 5, 3).sample_rate(0).validate(&config).is_err());
        assert!(EarthtonesRequest::new(90.0, 0.0, 5, 3).validate(&config).is_err());
        assert!(EarthtonesRequest::new(0.0, 0.0, 13, 3).validate(&config).is_ok());
    }

    #[test]
    fn serializes_shape_by_variant() {
        let palette = Palette::from_hex(&["#112233"]).unwrap();
        let json = serde_json::to_value(Earthtones::Palette(palette.clone())).unwrap();
        assert_eq!(json, serde_json::json!(["#112233"]));

        let bundle = Earthtones::Bundle(PaletteBundle {
            palette,
            raster: Raster {
                image: RgbaImage::new(4, 2),
                bbox: BoundingBox {
                    min_x: 0.0,
                    min_y: 0.0,
                    max_x: 1.0,
                    max_y: 1.0,
                },
                zoom: 3,
            },
        });
        let json = serde_json::to_value(bundle).unwrap();
        assert_eq!(json["palette"], serde_json::json!(["#112233"]));
        assert_eq!(json["image"]["width"], 4);
        assert_eq!(json["image"]["zoom"], 3);
    }
}
