//! Turn palettes (and their imagery) into pictures.
//!
//! Rendering is kept out of the pipeline; callers decide whether to draw.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::facade::Earthtones;
use crate::pipeline::Palette;

/// Horizontal bands, one per color, left to right in palette order.
pub fn swatch_strip(palette: &Palette, width: u32, height: u32) -> RgbaImage {
    let mut strip = RgbaImage::new(width.max(1), height.max(1));
    let n = palette.len() as u32;
    if n == 0 {
        return strip;
    }
    for (x, _, pixel) in strip.enumerate_pixels_mut() {
        let slot = ((x as u64 * n as u64) / width.max(1) as u64) as usize;
        let c = palette.colors()[slot.min(n as usize - 1)];
        *pixel = Rgba([c.red, c.green, c.blue, 255]);
    }
    strip
}

/// A palette renders as a strip `width` wide; a bundle renders its imagery
/// scaled to `width` with the strip underneath.
pub fn render(result: &Earthtones, width: u32) -> RgbaImage {
    let width = width.max(1);
    let strip_height = (width / 6).max(1);
    match result {
        Earthtones::Palette(palette) => swatch_strip(palette, width, strip_height),
        Earthtones::Bundle(bundle) => {
            let map = &bundle.raster.image;
            let map_height = if map.width() == 0 {
                0
            } else {
                ((map.height() as u64 * width as u64) / map.width() as u64).max(1) as u32
            };
            let mut canvas = RgbaImage::new(width, map_height + strip_height);
            if map_height > 0 {
                let scaled = imageops::resize(map, width, map_height, FilterType::Triangle);
                imageops::replace(&mut canvas, &scaled, 0, 0);
            }
            let strip = swatch_strip(&bundle.palette, width, strip_height);
            imageops::replace(&mut canvas, &strip, 0, map_height as i64);
            canvas
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::PaletteBundle;
    use crate::geo::BoundingBox;
    use crate::tiles::Raster;

    fn palette() -> Palette {
        Palette::from_hex(&["#FF0000", "#00FF00", "#0000FF"]).unwrap()
    }

    #[test]
    fn strip_has_equal_bands() {
        let strip = swatch_strip(&palette(), 30, 5);
        assert_eq!(strip.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(strip.get_pixel(9, 4), &Rgba([255, 0, 0, 255]));
        assert_eq!(strip.get_pixel(10, 0), &Rgba([0, 255, 0, 255]));
        assert_eq!(strip.get_pixel(29, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn empty_palette_is_transparent() {
        let strip = swatch_strip(&Palette::default(), 4, 4);
        assert!(strip.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn bundle_puts_map_above_strip() {
        let bundle = Earthtones::Bundle(PaletteBundle {
            palette: palette(),
            raster: Raster {
                image: RgbaImage::from_pixel(10, 5, Rgba([9, 9, 9, 255])),
                bbox: BoundingBox {
                    min_x: 0.0,
                    min_y: 0.0,
                    max_x: 1.0,
                    max_y: 1.0,
                },
                zoom: 1,
            },
        });
        let out = render(&bundle, 60);
        assert_eq!(out.dimensions(), (60, 30 + 10));
        assert_eq!(out.get_pixel(30, 15), &Rgba([9, 9, 9, 255]));
        assert_eq!(out.get_pixel(0, 35), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn palette_only_is_just_the_strip() {
        let out = render(&Earthtones::Palette(palette()), 60);
        assert_eq!(out.dimensions(), (60, 10));
    }
}
