//! Headless renderer: PNG snapshots of the occupancy field and a JSON report.

use anyhow::{Context, Result};
use dispersal_core::{Error, Position};
use dispersal_world::{FrameSink, RgbRaster, RunSummary, StepFrame};
use image::{Rgb, RgbImage};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INACTIVE: Rgb<u8> = Rgb([255, 255, 255]);
const UNOCCUPIED: Rgb<u8> = Rgb([222, 214, 190]);

/// Final artefact written by [`FrameWriter::write_report`]
#[derive(Serialize)]
struct RunReport<'a> {
    summary: &'a RunSummary,
    final_frame: Option<&'a StepFrame>,
}

pub struct FrameWriter {
    frames_dir: Option<PathBuf>,
    interval: u64,
    block: u32,
    active_mask: Vec<bool>,
    background: Option<RgbRaster>,
    last_frame: Option<StepFrame>,
}

impl FrameWriter {
    pub fn new(
        frames_dir: Option<PathBuf>,
        interval: u64,
        block: u32,
        active_mask: Vec<bool>,
    ) -> Result<Self> {
        if let Some(dir) = &frames_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create frame directory {}", dir.display()))?;
        }
        Ok(Self {
            frames_dir,
            interval: interval.max(1),
            block: block.max(1),
            active_mask,
            background: None,
            last_frame: None,
        })
    }

    /// Paints frames over `background` instead of a blank canvas.
    pub fn with_background(mut self, background: RgbRaster) -> Self {
        self.background = Some(background);
        self
    }

    pub fn render(&self, frame: &StepFrame) -> RgbImage {
        match &self.background {
            Some(background) => self.render_over(background, frame),
            None => self.render_blocks(frame),
        }
    }

    /// Draws one `block` x `block` square per cell, darker where more
    /// ensembles are occupied. Rows run along the image x axis.
    fn render_blocks(&self, frame: &StepFrame) -> RgbImage {
        let field = &frame.occupancy;
        let width = field.rows.max(0) as u32 * self.block;
        let height = field.cols.max(0) as u32 * self.block;

        RgbImage::from_fn(width, height, |x, y| {
            let index = ((x / self.block) * field.cols as u32 + y / self.block) as usize;
            if !self.active_mask.get(index).copied().unwrap_or(false) {
                return INACTIVE;
            }
            match field.fractions.get(index).copied().unwrap_or(0.0) {
                fraction if fraction > 0.0 => shade(fraction),
                _ => UNOCCUPIED,
            }
        })
    }

    /// Copies the background raster and paints a block centred on the
    /// sample pixel of every cell occupied in at least one ensemble.
    /// Blocks are clipped at the image edges.
    fn render_over(&self, background: &RgbRaster, frame: &StepFrame) -> RgbImage {
        let (width, height) = (background.width(), background.height());
        let mut image = RgbImage::from_fn(width, height, |x, y| {
            Rgb(background.get(x, y).unwrap_or(INACTIVE.0))
        });

        let field = &frame.occupancy;
        let block = i64::from(self.block);
        let half = block / 2;
        for row in 0..field.rows {
            for col in 0..field.cols {
                let fraction = field.fraction(Position::new(row, col)).unwrap_or(0.0);
                if fraction <= 0.0 {
                    continue;
                }
                let color = shade(fraction);
                let (cx, cy) = (i64::from(row) * block, i64::from(col) * block);
                for x in (cx - half)..(cx - half + block) {
                    for y in (cy - half)..(cy - half + block) {
                        if (0..i64::from(width)).contains(&x) && (0..i64::from(height)).contains(&y) {
                            image.put_pixel(x as u32, y as u32, color);
                        }
                    }
                }
            }
        }
        image
    }

    fn write_frame(&self, dir: &Path, frame: &StepFrame) -> Result<()> {
        let path = dir.join(format!("frame_{:05}.png", frame.step));
        self.render(frame)
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(step = frame.step, path = %path.display(), "Frame written");
        Ok(())
    }

    pub fn write_report(&self, path: &Path, summary: &RunSummary) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        let report = RunReport {
            summary,
            final_frame: self.last_frame.as_ref(),
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
        info!(path = %path.display(), "Report written");
        Ok(())
    }
}

fn shade(fraction: f64) -> Rgb<u8> {
    let level = (255.0 - fraction * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([level, level, level])
}

impl FrameSink for FrameWriter {
    fn on_frame(&mut self, frame: &StepFrame) -> dispersal_core::Result<()> {
        let due = frame.step % self.interval == 0 || frame.progress >= 1.0;
        if let (true, Some(dir)) = (due, self.frames_dir.as_deref()) {
            self.write_frame(dir, frame)
                .map_err(|e| Error::Render(format!("{:#}", e)))?;
        }
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispersal_core::Epoch;
    use dispersal_world::OccupancyField;

    fn frame(fractions: Vec<f64>) -> StepFrame {
        StepFrame {
            step: 1,
            epoch: Epoch::new(1_999_750),
            label: "1,999,750 years ago".into(),
            progress: 0.5,
            occupancy: OccupancyField {
                rows: 2,
                cols: 2,
                ensemble_count: 2,
                counts: fractions.iter().map(|f| (f * 2.0) as u32).collect(),
                fractions,
            },
            stats: vec![],
        }
    }

    #[test]
    fn test_render_shades_by_fraction() {
        let writer = FrameWriter::new(None, 10, 3, vec![true, true, false, true]).unwrap();
        let image = writer.render(&frame(vec![1.0, 0.5, 0.0, 0.0]));

        assert_eq!(image.dimensions(), (6, 6));
        // cell (0, 0) fully occupied
        assert_eq!(*image.get_pixel(1, 1), Rgb([0, 0, 0]));
        // cell (0, 1) in half of the ensembles
        assert_eq!(*image.get_pixel(0, 4), Rgb([128, 128, 128]));
        // cell (1, 0) inactive, cell (1, 1) empty land
        assert_eq!(*image.get_pixel(4, 0), INACTIVE);
        assert_eq!(*image.get_pixel(5, 5), UNOCCUPIED);
    }

    #[test]
    fn test_background_blocks_centred_on_samples() {
        let background = RgbRaster::filled(10, 10, [10, 20, 30]);
        let writer = FrameWriter::new(None, 10, 5, vec![true; 4])
            .unwrap()
            .with_background(background);
        let image = writer.render(&frame(vec![1.0, 0.0, 0.0, 0.5]));

        assert_eq!(image.dimensions(), (10, 10));
        // cell (0, 0) is centred on pixel (0, 0) and clipped to 3x3
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(2, 2), Rgb([0, 0, 0]));
        // cell (1, 1) covers pixels 3..=7 around (5, 5)
        assert_eq!(*image.get_pixel(3, 3), Rgb([128, 128, 128]));
        assert_eq!(*image.get_pixel(7, 7), Rgb([128, 128, 128]));
        // unoccupied cells and uncovered pixels keep the map
        assert_eq!(*image.get_pixel(8, 8), Rgb([10, 20, 30]));
        assert_eq!(*image.get_pixel(0, 5), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_sink_keeps_last_frame() {
        let mut writer = FrameWriter::new(None, 10, 1, vec![true; 4]).unwrap();
        writer.on_frame(&frame(vec![0.0; 4])).unwrap();
        let last = writer.last_frame.as_ref().unwrap();
        assert_eq!(last.occupancy.fraction(Position::new(1, 1)), Some(0.0));
    }
}
