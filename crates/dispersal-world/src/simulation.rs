//! Monte-Carlo driver: steps every ensemble and aggregates occupancy.

use crate::cell::{Noise, TransitionParams};
use crate::ensemble::{Ensemble, StepStats};
use crate::grid::Grid;
use crate::landscape::Classifier;
use crate::occupancy::OccupancyField;
use chrono::{DateTime, Utc};
use dispersal_core::{Epoch, LandscapeConfig, Result, RunId, SimulationConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, event, info, instrument, Level};

const PROGRESS_LOG_INTERVAL: u64 = 100;

/// Everything the renderer gets for one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFrame {
    /// 1-based step index
    pub step: u64,
    pub epoch: Epoch,
    pub label: String,
    /// Fraction of configured steps completed, in (0, 1]
    pub progress: f64,
    pub occupancy: OccupancyField,
    /// Per-ensemble counters, in ensemble order
    pub stats: Vec<StepStats>,
}

/// Receives each frame as it is produced. An error aborts the run.
pub trait FrameSink {
    fn on_frame(&mut self, frame: &StepFrame) -> Result<()>;
}

impl<F> FrameSink for F
where
    F: FnMut(&StepFrame) -> Result<()>,
{
    fn on_frame(&mut self, frame: &StepFrame) -> Result<()> {
        self(frame)
    }
}

/// Outcome of [`Simulation::run`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: u64,
    pub ensemble_count: usize,
    pub final_epoch: Epoch,
    pub final_mean_occupancy: f64,
    /// Largest number of cells occupied in any ensemble after any step
    pub peak_occupied_cells: usize,
}

pub struct Simulation {
    config: SimulationConfig,
    params: TransitionParams,
    template: Grid,
    ensembles: Vec<Ensemble>,
    steps_taken: u64,
}

impl Simulation {
    /// Replicates `template` into `config.ensemble_count` ensembles, each
    /// seeded from `config.seed` and its index.
    pub fn new(config: SimulationConfig, template: Grid) -> Result<Self> {
        config.validate()?;
        let params = TransitionParams::from_config(&config)?;

        let ensembles = (0..config.ensemble_count)
            .map(|id| Ensemble::new(id, &template, ensemble_seed(config.seed, id)))
            .collect();

        Ok(Self {
            config,
            params,
            template,
            ensembles,
            steps_taken: 0,
        })
    }

    /// Builds the template grid from `classifier` once, then replicates it.
    #[instrument(skip(config, landscape, classifier), fields(rows = landscape.rows, cols = landscape.cols))]
    pub fn from_landscape<C>(
        config: SimulationConfig,
        landscape: &LandscapeConfig,
        classifier: &C,
    ) -> Result<Self>
    where
        C: Classifier + ?Sized,
    {
        config.validate()?;
        let noise = Noise::new(config.noise_sigma)?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let template = Grid::from_landscape(landscape, classifier, &noise, &mut rng)?;

        info!(
            active_cells = template.active_count(),
            seeded_cells = template.occupied_count(),
            ensembles = config.ensemble_count,
            "Landscape template built"
        );

        Self::new(config, template)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn template(&self) -> &Grid {
        &self.template
    }

    pub fn ensembles(&self) -> &[Ensemble] {
        &self.ensembles
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn epoch(&self) -> Epoch {
        Epoch::new(self.config.start_years_before_present)
            .advance(self.steps_taken, self.config.years_per_step)
    }

    pub fn is_finished(&self) -> bool {
        self.steps_taken >= self.config.steps
    }

    /// Current cross-ensemble occupancy
    pub fn occupancy(&self) -> OccupancyField {
        OccupancyField::aggregate(
            self.template.rows(),
            self.template.cols(),
            self.ensembles.iter().map(Ensemble::grid),
        )
    }

    /// Advances every ensemble by one step, then aggregates. Aggregation only
    /// starts once all ensembles have finished the step.
    pub fn step(&mut self) -> StepFrame {
        let params = self.params;
        let mode = self.config.sweep_mode;

        let stats: Vec<StepStats> = if self.config.parallel {
            self.ensembles
                .par_iter_mut()
                .map(|ensemble| ensemble.update(&params, mode))
                .collect()
        } else {
            self.ensembles
                .iter_mut()
                .map(|ensemble| ensemble.update(&params, mode))
                .collect()
        };

        self.steps_taken += 1;
        let epoch = self.epoch();
        let occupancy = self.occupancy();

        debug!(
            step = self.steps_taken,
            years_before_present = epoch.years_before_present,
            occupied_cells = occupancy.occupied_cells(),
            "Step aggregated"
        );

        StepFrame {
            step: self.steps_taken,
            epoch,
            label: epoch.label(),
            progress: (self.steps_taken as f64 / self.config.steps as f64).min(1.0),
            occupancy,
            stats,
        }
    }

    /// Runs the remaining configured steps, handing each frame to `sink`.
    #[instrument(skip(self, sink), fields(steps = self.config.steps, ensembles = self.ensembles.len()))]
    pub fn run<S>(&mut self, sink: &mut S) -> Result<RunSummary>
    where
        S: FrameSink + ?Sized,
    {
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            start = %self.epoch(),
            "Starting simulation for {} steps",
            self.config.steps
        );

        let mut peak_occupied_cells = 0;
        let mut final_mean_occupancy = self.occupancy().mean_fraction();

        while !self.is_finished() {
            let frame = self.step();
            peak_occupied_cells = frame
                .stats
                .iter()
                .map(|stats| stats.occupied)
                .max()
                .unwrap_or(0)
                .max(peak_occupied_cells);
            final_mean_occupancy = frame.occupancy.mean_fraction();

            if frame.step % PROGRESS_LOG_INTERVAL == 0 {
                self.emit_progress(&frame);
            }

            sink.on_frame(&frame)?;
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            steps: self.steps_taken,
            ensemble_count: self.ensembles.len(),
            final_epoch: self.epoch(),
            final_mean_occupancy,
            peak_occupied_cells,
        };
        self.emit_run_summary(&summary);

        Ok(summary)
    }

    fn emit_progress(&self, frame: &StepFrame) {
        let occupied: Vec<usize> = frame.stats.iter().map(|stats| stats.occupied).collect();
        let mean_occupied = occupied.iter().sum::<usize>() as f64 / occupied.len().max(1) as f64;

        info!(
            event = "progress",
            step = frame.step,
            total_steps = self.config.steps,
            epoch = %frame.epoch,
            progress = format!("{:.1}%", frame.progress * 100.0),
            cells_reached = frame.occupancy.occupied_cells(),
            mean_occupied_per_ensemble = mean_occupied,
            "Step {}/{}",
            frame.step,
            self.config.steps
        );

        event!(
            Level::INFO,
            gauge_name = "occupied_cells_mean",
            gauge_value = mean_occupied,
            step = frame.step,
            "Mean occupied cells gauge"
        );
    }

    fn emit_run_summary(&self, summary: &RunSummary) {
        let elapsed = summary.finished_at - summary.started_at;

        info!(
            event = "run_summary",
            run_id = %summary.run_id,
            steps = summary.steps,
            ensembles = summary.ensemble_count,
            final_epoch = %summary.final_epoch,
            final_mean_occupancy = summary.final_mean_occupancy,
            peak_occupied_cells = summary.peak_occupied_cells,
            elapsed_ms = elapsed.num_milliseconds(),
            "Simulation complete"
        );

        event!(
            Level::INFO,
            histogram_name = "run_duration_ms",
            histogram_value = elapsed.num_milliseconds(),
            "Run duration histogram"
        );
    }
}

fn ensemble_seed(base: u64, id: usize) -> u64 {
    base.wrapping_add(id as u64 + 1)
}
