//! Command-line runner for the landscape dispersal simulation.

mod raster;
mod render;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dispersal_core::{DensityRule, RunConfig, SweepMode};
use dispersal_world::{RasterClassifier, Simulation};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SweepArg {
    InPlace,
    DoubleBuffered,
}

impl From<SweepArg> for SweepMode {
    fn from(arg: SweepArg) -> Self {
        match arg {
            SweepArg::InPlace => SweepMode::InPlace,
            SweepArg::DoubleBuffered => SweepMode::DoubleBuffered,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DensityArg {
    Neighborhood,
    FixedOffset,
    Disabled,
}

impl From<DensityArg> for DensityRule {
    fn from(arg: DensityArg) -> Self {
        match arg {
            DensityArg::Neighborhood => DensityRule::Neighborhood,
            DensityArg::FixedOffset => DensityRule::FixedOffset,
            DensityArg::Disabled => DensityRule::Disabled,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "dispersal", version, about = "Monte-Carlo landscape dispersal simulation")]
struct Cli {
    /// Vegetation classification raster (PNG)
    #[arg(long)]
    vegetation: PathBuf,

    /// Elevation band raster (PNG)
    #[arg(long)]
    elevation: PathBuf,

    /// JSON run configuration; flags below override it
    #[arg(long, env = "DISPERSAL_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    ensembles: Option<usize>,

    /// Number of steps to simulate
    #[arg(long)]
    steps: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    sweep: Option<SweepArg>,

    #[arg(long, value_enum)]
    density: Option<DensityArg>,

    /// Step ensembles in parallel
    #[arg(long)]
    parallel: bool,

    /// Where to write the JSON run report
    #[arg(long, default_value = "occupancy.json")]
    output: PathBuf,

    /// Directory for PNG occupancy frames; frames are skipped when unset
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Map to paint frames onto, sampled at the same stride as the layers
    #[arg(long)]
    background: Option<PathBuf>,

    /// Write a frame every N steps (the last step is always written)
    #[arg(long, default_value_t = 100)]
    frame_interval: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "DISPERSAL_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RunConfig::default(),
        };

        let simulation = &mut config.simulation;
        if let Some(ensembles) = self.ensembles {
            simulation.ensemble_count = ensembles;
        }
        if let Some(steps) = self.steps {
            simulation.steps = steps;
        }
        if let Some(seed) = self.seed {
            simulation.seed = seed;
        }
        if let Some(sweep) = self.sweep {
            simulation.sweep_mode = sweep.into();
        }
        if let Some(density) = self.density {
            simulation.density_rule = density.into();
        }
        simulation.parallel |= self.parallel;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_telemetry(cli.log_json)?;

    let config = cli.run_config()?;
    info!(
        ensembles = config.simulation.ensemble_count,
        steps = config.simulation.steps,
        seed = config.simulation.seed,
        sweep = ?config.simulation.sweep_mode,
        density = ?config.simulation.density_rule,
        "Starting dispersal run"
    );

    let vegetation = raster::load_rgb(&cli.vegetation)?;
    let elevation = raster::load_rgb(&cli.elevation)?;
    let classifier = RasterClassifier::new(vegetation, elevation, &config.landscape)?;

    let mut simulation =
        Simulation::from_landscape(config.simulation.clone(), &config.landscape, &classifier)?;

    let mut writer = render::FrameWriter::new(
        cli.frames_dir.clone(),
        cli.frame_interval,
        config.landscape.stride,
        simulation.template().active_mask(),
    )?;
    if let Some(path) = &cli.background {
        writer = writer.with_background(raster::load_rgb(path)?);
    }

    let summary = simulation.run(&mut writer)?;
    writer.write_report(&cli.output, &summary)?;

    info!(
        run_id = %summary.run_id,
        final_epoch = %summary.final_epoch,
        "Run finished"
    );

    Ok(())
}
