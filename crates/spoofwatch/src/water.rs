//! Land/water classification from an equirectangular raster
//!
//! The raster is read once at startup and treated as immutable. Dark pixels
//! are water, light pixels are land; mid-gray pixels count as both, which is
//! why the two predicates are not complements of each other.

use std::path::Path;

use eyre::WrapErr;
use image::RgbaImage;

/// Lookup seam so detection methods can be tested without a raster on disk
pub trait WaterLookup {
    fn is_on_water(&self, latitude: f64, longitude: f64) -> bool;
    fn is_on_land(&self, latitude: f64, longitude: f64) -> bool;
}

/// Equirectangular land/water raster (PNG)
pub struct WaterMap {
    raster: RgbaImage,
}

const WATER_THRESHOLD: f64 = 0.25;

impl WaterMap {
    pub fn open<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let raster = image::open(path)
            .wrap_err_with(|| format!("Failed to open water map raster {path:?}"))?
            .to_rgba8();
        Ok(Self::from_raster(raster))
    }

    pub fn from_raster(raster: RgbaImage) -> Self {
        Self { raster }
    }

    /// How water-like the pixel under the given position is, in [0, 1]
    pub fn water_probability(&self, latitude: f64, longitude: f64) -> f64 {
        let (x, y) = self.pixel_position(latitude, longitude);
        let [r, g, b, _] = self.raster.get_pixel(x, y).0;
        let grayscale = (f64::from(r) + f64::from(g) + f64::from(b)) / 3.0;
        1.0 - grayscale / 255.0
    }

    fn pixel_position(&self, latitude: f64, longitude: f64) -> (u32, u32) {
        let width = i64::from(self.raster.width());
        let height = i64::from(self.raster.height());
        let x = (width as f64 * (180.0 + longitude) / 360.0) as i64;
        let y = (height as f64 * (90.0 - latitude) / 180.0) as i64;
        (x.rem_euclid(width) as u32, y.rem_euclid(height) as u32)
    }
}

impl WaterLookup for WaterMap {
    fn is_on_water(&self, latitude: f64, longitude: f64) -> bool {
        self.water_probability(latitude, longitude) > WATER_THRESHOLD
    }

    fn is_on_land(&self, latitude: f64, longitude: f64) -> bool {
        self.water_probability(latitude, longitude) <= 1.0 - WATER_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    /// 10x10 raster: one water pixel in the north-west corner, land elsewhere
    fn raster() -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, y| {
            if (x, y) == (0, 0) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    fn check(map: &WaterMap) {
        assert!(map.is_on_water(-90.0, -180.0));
        assert!(!map.is_on_land(-90.0, -180.0));
        assert!(!map.is_on_water(0.0, 0.0));
        assert!(map.is_on_land(0.0, 0.0));
        assert!(!map.is_on_water(45.0, 90.0));
        assert!(map.is_on_land(45.0, 90.0));
    }

    #[test]
    fn test_water_land_lookup() {
        check(&WaterMap::from_raster(raster()));
    }

    #[test]
    fn test_open_png() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        raster().save(file.path()).unwrap();
        check(&WaterMap::open(file.path()).unwrap());
    }

    #[test]
    fn test_gray_band_is_both_land_and_water() {
        let raster = RgbaImage::from_pixel(4, 4, Rgba([128, 128, 128, 255]));
        let map = WaterMap::from_raster(raster);
        // An ambiguous pixel satisfies both predicates, so neither
        // environment constraint can flag it
        assert!(map.is_on_water(0.0, 0.0));
        assert!(map.is_on_land(0.0, 0.0));
    }
}
