//! Cross-ensemble occupancy aggregation.

use crate::grid::Grid;
use dispersal_core::Position;
use serde::{Deserialize, Serialize};

/// Per-cell count of occupied ensembles and the matching fraction, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyField {
    pub rows: i32,
    pub cols: i32,
    pub ensemble_count: usize,
    pub counts: Vec<u32>,
    pub fractions: Vec<f64>,
}

impl OccupancyField {
    /// Counts, for every landscape cell, how many of `grids` have it occupied.
    /// All grids must share the same dimensions.
    pub fn aggregate<'a, I>(rows: i32, cols: i32, grids: I) -> Self
    where
        I: IntoIterator<Item = &'a Grid>,
    {
        let size = (rows.max(0) * cols.max(0)) as usize;
        let mut counts = vec![0u32; size];
        let mut ensemble_count = 0;

        for grid in grids {
            debug_assert_eq!((grid.rows(), grid.cols()), (rows, cols));
            for (count, cell) in counts.iter_mut().zip(grid.iter()) {
                *count += cell.is_occupied() as u32;
            }
            ensemble_count += 1;
        }

        let fractions = counts
            .iter()
            .map(|&count| {
                if ensemble_count == 0 {
                    0.0
                } else {
                    count as f64 / ensemble_count as f64
                }
            })
            .collect();

        Self {
            rows,
            cols,
            ensemble_count,
            counts,
            fractions,
        }
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.row < 0 || pos.row >= self.rows || pos.col < 0 || pos.col >= self.cols {
            return None;
        }
        Some((pos.row * self.cols + pos.col) as usize)
    }

    pub fn count(&self, pos: Position) -> Option<u32> {
        self.index(pos).map(|i| self.counts[i])
    }

    pub fn fraction(&self, pos: Position) -> Option<f64> {
        self.index(pos).map(|i| self.fractions[i])
    }

    /// Cells occupied in at least one ensemble
    pub fn occupied_cells(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    /// Mean of the per-cell fractions over the whole landscape
    pub fn mean_fraction(&self) -> f64 {
        if self.fractions.is_empty() {
            return 0.0;
        }
        self.fractions.iter().sum::<f64>() / self.fractions.len() as f64
    }
}
