//! Color space conversion between display sRGB and CIE L*a*b*
//!
//! Clustering happens in L*a*b* so that Euclidean distance tracks perceived
//! difference. The reference white is fixed to D65 through the type
//! parameter of [`Perceptual`]; it is not configurable, which keeps
//! round trips deterministic.
//!
//! Nothing in this module clamps except [`clamp_display`]: cluster centers
//! routinely land outside the sRGB gamut, and callers decide when to clamp.

use palette::convert::FromColorUnclamped;
use palette::white_point::D65;
use palette::{Lab, Srgb};

use crate::{EarthtonesError, Result};

/// A sample in perceptual space.
pub type Perceptual = Lab<D65, f64>;

/// A display color with channels nominally in `[0, 1]`.
pub type Display = Srgb<f64>;

/// Convert display colors to L*a*b* (sRGB transfer function, linear RGB → XYZ → Lab).
pub fn to_perceptual(pixels: &[Display]) -> Vec<Perceptual> {
    pixels.iter().map(|&p| Perceptual::from_color_unclamped(p)).collect()
}

/// Convert L*a*b* points back to display space. The result is **not** clamped.
pub fn to_display(points: &[Perceptual]) -> Vec<Display> {
    points.iter().map(|&p| Display::from_color_unclamped(p)).collect()
}

/// Clamp every channel independently to `[0, 1]`.
///
/// NaN channels (possible for degenerate Lab input) collapse to 0 rather
/// than propagating into the hex encoding.
pub fn clamp_display(color: Display) -> Display {
    let clamp = |c: f64| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) };
    Srgb::new(clamp(color.red), clamp(color.green), clamp(color.blue))
}

/// Clamp and quantise a display color to 8 bits per channel.
pub fn quantize(color: Display) -> Srgb<u8> {
    let c = clamp_display(color);
    let to_u8 = |v: f64| (v * 255.0).round() as u8;
    Srgb::new(to_u8(c.red), to_u8(c.green), to_u8(c.blue))
}

/// `#RRGGBB`, uppercase, no alpha.
pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}

/// Parse `#RRGGBB` or `RRGGBB`.
pub fn parse_hex(hex: &str) -> Result<Srgb<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(EarthtonesError::invalid_parameter(
            "color",
            format!("`{hex}` is not a 6-digit hex color"),
        ));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| {
            EarthtonesError::invalid_parameter("color", format!("`{hex}` contains non-hex digits"))
        })
    };
    Ok(Srgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Squared Euclidean distance in L*a*b* (the CIE76 ΔE, squared).
#[inline]
pub fn distance_squared(a: &Perceptual, b: &Perceptual) -> f64 {
    let dl = a.l - b.l;
    let da = a.a - b.a;
    let db = a.b - b.b;
    dl * dl + da * da + db * db
}
