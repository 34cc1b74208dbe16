//! PNG classification layers.

use anyhow::{Context, Result};
use dispersal_world::RgbRaster;
use std::path::Path;
use tracing::debug;

/// Decodes an image file into an RGB raster, dropping any alpha channel.
pub fn load_rgb(path: &Path) -> Result<RgbRaster> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode raster {}", path.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    let pixels = image.pixels().map(|pixel| pixel.0).collect();

    debug!(path = %path.display(), width, height, "Loaded raster");
    Ok(RgbRaster::new(width, height, pixels)?)
}
