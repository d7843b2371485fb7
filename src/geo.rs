//! Geographic to spherical Web Mercator (EPSG:3857) transforms.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{EarthtonesError, Result};

/// WGS84 semi-major axis, the sphere radius of EPSG:3857.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Equatorial circumference in metres.
pub const EARTH_CIRCUMFERENCE: f64 = 2.0 * PI * EARTH_RADIUS;

/// Half the width of the projected world; x and y range over `[-ORIGIN_SHIFT, ORIGIN_SHIFT]`.
pub const ORIGIN_SHIFT: f64 = PI * EARTH_RADIUS;

/// Latitude at which Web Mercator becomes square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MercatorPoint {
    pub x: f64,
    pub y: f64,
}

/// Check latitude/longitude before projecting.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || latitude.abs() > MAX_LATITUDE {
        return Err(EarthtonesError::invalid_parameter(
            "latitude",
            format!("{latitude} is outside ±{MAX_LATITUDE:.6}"),
        ));
    }
    if !longitude.is_finite() || longitude.abs() > 180.0 {
        return Err(EarthtonesError::invalid_parameter(
            "longitude",
            format!("{longitude} is outside ±180"),
        ));
    }
    Ok(())
}

/// Project a WGS84 coordinate onto EPSG:3857 metres.
pub fn to_web_mercator(longitude: f64, latitude: f64) -> MercatorPoint {
    let lat = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    MercatorPoint {
        x: EARTH_RADIUS * longitude.to_radians(),
        y: EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln(),
    }
}

/// Inverse of [`to_web_mercator`], returning `(longitude, latitude)`.
pub fn from_web_mercator(point: MercatorPoint) -> (f64, f64) {
    let longitude = (point.x / EARTH_RADIUS).to_degrees();
    let latitude = (2.0 * (point.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (longitude, latitude)
}

/// Axis-aligned box in EPSG:3857 metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Square box of the given half-extent, clipped to the projected world.
    pub fn around(center: MercatorPoint, half_extent: f64) -> Self {
        let clip = |v: f64| v.clamp(-ORIGIN_SHIFT, ORIGIN_SHIFT);
        Self {
            min_x: clip(center.x - half_extent),
            min_y: clip(center.y - half_extent),
            max_x: clip(center.x + half_extent),
            max_y: clip(center.y + half_extent),
        }
    }

    /// Box spanning one tile width at `zoom`; deeper zoom means a smaller box.
    pub fn for_zoom(center: MercatorPoint, zoom: u32) -> Self {
        Self::around(center, half_extent_for_zoom(zoom))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Half the ground width of one tile at `zoom`.
pub fn half_extent_for_zoom(zoom: u32) -> f64 {
    EARTH_CIRCUMFERENCE / 2f64.powi(zoom as i32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_origin() {
        let p = to_web_mercator(0.0, 0.0);
        assert!(p.x.abs() < 1e-9 && p.y.abs() < 1e-9);
    }

    #[test]
    fn antimeridian_and_max_latitude_hit_world_edge() {
        let p = to_web_mercator(180.0, MAX_LATITUDE);
        assert!((p.x - ORIGIN_SHIFT).abs() < 1e-6);
        assert!((p.y - ORIGIN_SHIFT).abs() < 1e-3);
    }

    #[test]
    fn known_point_washington_dc() {
        let p = to_web_mercator(-77.0369, 38.9072);
        assert!((p.x - -8_575_708.48).abs() < 0.01, "{p:?}");
        assert!((p.y - 4_708_387.47).abs() < 0.01, "{p:?}");
    }

    #[test]
    fn inverse_round_trip() {
        let (lon, lat) = from_web_mercator(to_web_mercator(151.2093, -33.8688));
        assert!((lon - 151.2093).abs() < 1e-9);
        assert!((lat - -33.8688).abs() < 1e-9);
    }

    #[test]
    fn box_shrinks_with_zoom() {
        let c = to_web_mercator(10.0, 45.0);
        let near = BoundingBox::for_zoom(c, 12);
        let far = BoundingBox::for_zoom(c, 6);
        assert!(near.width() < far.width());
        assert!((far.width() - 64.0 * near.width()).abs() < 1e-3);
    }

    #[test]
    fn zoom_zero_covers_the_world() {
        let b = BoundingBox::for_zoom(MercatorPoint { x: 0.0, y: 0.0 }, 0);
        assert!((b.width() - 2.0 * ORIGIN_SHIFT).abs() < 1e-6);
    }

    #[test]
    fn rejects_polar_latitude() {
        assert!(validate_coordinates(89.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(38.9, -77.0).is_ok());
    }
}
