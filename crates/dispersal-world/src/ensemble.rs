//! Independent stochastic replicates of the landscape.

use crate::cell::TransitionParams;
use crate::grid::Grid;
use dispersal_core::{Position, SweepMode};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Counters for one ensemble step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStats {
    pub colonizations: usize,
    pub extinctions: usize,
    /// Occupied cells after the sweep
    pub occupied: usize,
}

/// One replicate: a private deep copy of the template grid plus its own
/// random stream.
#[derive(Debug, Clone)]
pub struct Ensemble {
    id: usize,
    grid: Grid,
    rng: ChaCha8Rng,
    steps_taken: u64,
}

impl Ensemble {
    pub fn new(id: usize, template: &Grid, seed: u64) -> Self {
        Self::with_rng(id, template.clone(), ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_rng(id: usize, grid: Grid, rng: ChaCha8Rng) -> Self {
        Self {
            id,
            grid,
            rng,
            steps_taken: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// Advances the replicate by one step, sweeping cells in row-major
    /// order. Every active cell refreshes its density term; occupied cells
    /// also try to colonize and may go extinct.
    pub fn update(&mut self, params: &TransitionParams, mode: SweepMode) -> StepStats {
        let mut stats = match mode {
            SweepMode::InPlace => self.sweep_in_place(params),
            SweepMode::DoubleBuffered => self.sweep_double_buffered(params),
        };
        stats.occupied = self.grid.occupied_count();
        self.steps_taken += 1;

        trace!(
            ensemble = self.id,
            step = self.steps_taken,
            colonizations = stats.colonizations,
            extinctions = stats.extinctions,
            occupied = stats.occupied,
            "Ensemble stepped"
        );

        stats
    }

    fn sweep_in_place(&mut self, params: &TransitionParams) -> StepStats {
        let mut stats = StepStats::default();
        let (rows, cols) = (self.grid.rows(), self.grid.cols());

        for row in 0..rows {
            for col in 0..cols {
                let cell = self.grid.cell(Position::new(row, col));
                if !cell.is_active() {
                    continue;
                }
                let transition = cell.decide(&self.grid, params, &mut self.rng);
                let applied = self.grid.apply(&transition);
                stats.colonizations += applied.colonized as usize;
                stats.extinctions += applied.extinct as usize;
            }
        }

        stats
    }

    fn sweep_double_buffered(&mut self, params: &TransitionParams) -> StepStats {
        let mut stats = StepStats::default();
        let snapshot = self.grid.clone();

        for cell in snapshot.iter().filter(|cell| cell.is_active()) {
            let transition = cell.decide(&snapshot, params, &mut self.rng);
            let applied = self.grid.apply(&transition);
            stats.colonizations += applied.colonized as usize;
            stats.extinctions += applied.extinct as usize;
        }

        stats
    }
}
