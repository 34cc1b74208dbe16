//! Landscape classification: raster samples to static extinction rates.

use dispersal_core::{Error, LandscapeConfig, Position, Result};
use serde::{Deserialize, Serialize};

/// Static contribution of one landscape sample to a cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandscapeClass {
    pub vegetation_extinction: f64,
    pub elevation_extinction: f64,
    pub active: bool,
}

impl LandscapeClass {
    pub fn active(vegetation_extinction: f64, elevation_extinction: f64) -> Self {
        Self {
            vegetation_extinction,
            elevation_extinction,
            active: true,
        }
    }

    pub fn inactive() -> Self {
        Self {
            vegetation_extinction: 1.0,
            elevation_extinction: 1.0,
            active: false,
        }
    }
}

/// Source of per-cell landscape classes
pub trait Classifier {
    fn classify(&self, pos: Position) -> Result<LandscapeClass>;
}

impl<F> Classifier for F
where
    F: Fn(Position) -> Result<LandscapeClass>,
{
    fn classify(&self, pos: Position) -> Result<LandscapeClass> {
        self(pos)
    }
}

/// Vegetation classes of the vegetation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Biome {
    TemperateForest,
    Grassland,
    Desert,
    TropicalForest,
    Tundra,
    WarmTemperateForest,
    BorealForest,
    Savanna,
    Ice,
    Unknown,
}

impl Biome {
    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        match rgb {
            [7, 120, 11] => Biome::TemperateForest,
            [255, 128, 0] => Biome::Grassland,
            [255, 242, 0] => Biome::Desert,
            [0, 79, 0] => Biome::TropicalForest,
            [22, 204, 250] => Biome::Tundra,
            [164, 252, 67] => Biome::WarmTemperateForest,
            [128, 128, 255] => Biome::BorealForest,
            [132, 97, 37] => Biome::Savanna,
            [200, 200, 200] => Biome::Ice,
            _ => Biome::Unknown,
        }
    }

    pub fn extinction_rate(&self) -> f64 {
        match self {
            Biome::Savanna => 0.08,
            Biome::TemperateForest | Biome::Grassland | Biome::TropicalForest => 0.12,
            Biome::Desert => 0.17,
            Biome::WarmTemperateForest => 0.18,
            Biome::Tundra | Biome::BorealForest | Biome::Ice | Biome::Unknown => 1.0,
        }
    }
}

/// Altitude bands of the elevation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElevationBand {
    Low,
    Mid,
    High,
    Unbanded,
}

impl ElevationBand {
    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        match rgb {
            [203, 131, 7] => ElevationBand::Low,
            [203, 41, 21] => ElevationBand::Mid,
            [112, 6, 6] => ElevationBand::High,
            _ => ElevationBand::Unbanded,
        }
    }

    pub fn extinction_rate(&self) -> f64 {
        match self {
            ElevationBand::Low => 0.05,
            ElevationBand::Mid => 0.10,
            ElevationBand::High => 0.22,
            ElevationBand::Unbanded => 0.0,
        }
    }
}

const WHITE: [u8; 3] = [255, 255, 255];

/// Decoded RGB raster, row-major over `y`
#[derive(Debug, Clone)]
pub struct RgbRaster {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl RgbRaster {
    pub fn new(width: u32, height: u32, pixels: Vec<[u8; 3]>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize {
            return Err(Error::Configuration(format!(
                "raster of {}x{} needs {} pixels, got {}",
                width,
                height,
                width as usize * height as usize,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            width,
            height,
            pixels: vec![rgb; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub fn put(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = rgb;
        }
    }
}

/// Classifies cells by sampling a vegetation and an elevation raster.
///
/// Cell `(row, col)` reads pixel `(row * stride, col * stride)` of both layers.
#[derive(Debug, Clone)]
pub struct RasterClassifier {
    vegetation: RgbRaster,
    elevation: RgbRaster,
    stride: u32,
}

impl RasterClassifier {
    /// Checks that both layers cover every sample of `landscape` up front,
    /// so classification can't fail halfway through a grid.
    pub fn new(
        vegetation: RgbRaster,
        elevation: RgbRaster,
        landscape: &LandscapeConfig,
    ) -> Result<Self> {
        landscape.validate()?;
        let (required_width, required_height) = landscape.required_extent()?;
        for (layer, raster) in [("vegetation", &vegetation), ("elevation", &elevation)] {
            if raster.width() < required_width || raster.height() < required_height {
                return Err(Error::Coverage {
                    layer: layer.to_string(),
                    width: raster.width(),
                    height: raster.height(),
                    required_width,
                    required_height,
                });
            }
        }
        Ok(Self {
            vegetation,
            elevation,
            stride: landscape.stride,
        })
    }

    fn sample(&self, raster: &RgbRaster, layer: &str, pos: Position) -> Result<[u8; 3]> {
        let x = u32::try_from(pos.row).ok().and_then(|r| r.checked_mul(self.stride));
        let y = u32::try_from(pos.col).ok().and_then(|c| c.checked_mul(self.stride));
        x.zip(y)
            .and_then(|(x, y)| raster.get(x, y))
            .ok_or_else(|| {
                Error::Configuration(format!("{} raster has no sample for cell {}", layer, pos))
            })
    }
}

impl Classifier for RasterClassifier {
    fn classify(&self, pos: Position) -> Result<LandscapeClass> {
        let vegetation = self.sample(&self.vegetation, "vegetation", pos)?;
        if vegetation == WHITE {
            return Ok(LandscapeClass::inactive());
        }
        let elevation = self.sample(&self.elevation, "elevation", pos)?;
        Ok(LandscapeClass::active(
            Biome::from_rgb(vegetation).extinction_rate(),
            ElevationBand::from_rgb(elevation).extinction_rate(),
        ))
    }
}
