//! 2D cell arena for the landscape.

use crate::cell::{Cell, Noise, Transition};
use crate::landscape::Classifier;
use dispersal_core::{Error, LandscapeConfig, Position, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Depth of the permanently inactive frame around the landscape. Covers
/// both the 4-neighbor lookups and the 5x5 density window.
pub const BORDER: i32 = 2;

/// Result of applying a [`Transition`]. `colonized` is set only when the
/// target went from unoccupied to occupied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub colonized: bool,
    pub extinct: bool,
}

/// A fixed R x C grid of cells stored row-major, framed by [`BORDER`]
/// inactive cells on every side. Public coordinates are landscape
/// coordinates; the frame sits at negative rows/cols and past the far edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    rows: i32,
    cols: i32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Classifies every cell in row-major order. No cell is occupied yet.
    pub fn build<C, R>(
        rows: i32,
        cols: i32,
        classifier: &C,
        noise: &Noise,
        rng: &mut R,
    ) -> Result<Self>
    where
        C: Classifier + ?Sized,
        R: Rng + ?Sized,
    {
        if rows <= 0 || cols <= 0 {
            return Err(Error::Configuration(format!(
                "grid must have positive dimensions, got {}x{}",
                rows, cols
            )));
        }

        let padded_rows = rows + 2 * BORDER;
        let padded_cols = cols + 2 * BORDER;
        let mut cells = Vec::with_capacity((padded_rows * padded_cols) as usize);

        for padded_row in 0..padded_rows {
            for padded_col in 0..padded_cols {
                let pos = Position::new(padded_row - BORDER, padded_col - BORDER);
                let inside = pos.row >= 0 && pos.row < rows && pos.col >= 0 && pos.col < cols;
                let cell = if inside {
                    Cell::new(pos, classifier.classify(pos)?, noise, rng)
                } else {
                    Cell::inactive(pos)
                };
                cells.push(cell);
            }
        }

        Ok(Self { rows, cols, cells })
    }

    /// Builds the landscape and places its seed population.
    pub fn from_landscape<C, R>(
        landscape: &LandscapeConfig,
        classifier: &C,
        noise: &Noise,
        rng: &mut R,
    ) -> Result<Self>
    where
        C: Classifier + ?Sized,
        R: Rng + ?Sized,
    {
        landscape.validate()?;
        let mut grid = Self::build(landscape.rows, landscape.cols, classifier, noise, rng)?;
        let seeded = grid.seed(&landscape.seeds)?;

        debug!(
            rows = grid.rows,
            cols = grid.cols,
            active_cells = grid.active_count(),
            seeds = landscape.seeds.len(),
            seeded = seeded,
            "Built landscape grid"
        );

        Ok(grid)
    }

    /// Marks each seed occupied, returning how many took. Seeds on inactive
    /// cells are skipped.
    pub fn seed(&mut self, seeds: &[Position]) -> Result<usize> {
        if let Some(seed) = seeds.iter().find(|seed| !self.contains(**seed)) {
            return Err(Error::SeedOutOfBounds {
                row: seed.row,
                col: seed.col,
                rows: self.rows,
                cols: self.cols,
            });
        }

        let mut seeded = 0;
        for seed in seeds {
            if self.cell_mut(*seed).occupy() {
                seeded += 1;
            } else {
                warn!(row = seed.row, col = seed.col, "Skipping seed on inactive cell");
            }
        }
        Ok(seeded)
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    /// Number of landscape cells (frame excluded)
    pub fn len(&self) -> usize {
        (self.rows * self.cols) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.row < self.rows && pos.col >= 0 && pos.col < self.cols
    }

    /// Landscape cell at `pos`, or `None` outside the landscape
    pub fn get(&self, pos: Position) -> Option<&Cell> {
        if self.contains(pos) {
            Some(self.cell(pos))
        } else {
            None
        }
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.get(pos).map(Cell::is_occupied).unwrap_or(false)
    }

    /// Cell at `pos`, frame included. `pos` must lie within [`BORDER`] of
    /// the landscape.
    pub(crate) fn cell(&self, pos: Position) -> &Cell {
        &self.cells[self.index(pos)]
    }

    fn cell_mut(&mut self, pos: Position) -> &mut Cell {
        let index = self.index(pos);
        &mut self.cells[index]
    }

    fn index(&self, pos: Position) -> usize {
        debug_assert!(
            pos.row >= -BORDER
                && pos.row < self.rows + BORDER
                && pos.col >= -BORDER
                && pos.col < self.cols + BORDER,
            "{} is outside the grid frame",
            pos
        );
        ((pos.row + BORDER) * (self.cols + 2 * BORDER) + pos.col + BORDER) as usize
    }

    /// Writes a decided transition: density bookkeeping, then colonization,
    /// then extinction.
    pub fn apply(&mut self, transition: &Transition) -> Applied {
        self.cell_mut(transition.position)
            .set_density_extinction(transition.density_extinction);

        // Two occupants of a snapshot may pick the same target; only the
        // first one to land counts.
        let colonized = transition
            .colonized
            .map(|target| {
                let cell = self.cell_mut(target);
                !cell.is_occupied() && cell.occupy()
            })
            .unwrap_or(false);

        if transition.extinct {
            self.cell_mut(transition.position).vacate();
        }

        Applied {
            colonized,
            extinct: transition.extinct,
        }
    }

    /// Landscape positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Position::new(row, col)))
    }

    /// Landscape cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.positions().map(move |pos| self.cell(pos))
    }

    pub fn active_count(&self) -> usize {
        self.iter().filter(|cell| cell.is_active()).count()
    }

    pub fn occupied_count(&self) -> usize {
        self.iter().filter(|cell| cell.is_occupied()).count()
    }

    pub fn occupied_positions(&self) -> Vec<Position> {
        self.iter()
            .filter(|cell| cell.is_occupied())
            .map(Cell::position)
            .collect()
    }

    /// Active flags in row-major order
    pub fn active_mask(&self) -> Vec<bool> {
        self.iter().map(Cell::is_active).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landscape::LandscapeClass;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn checkerboard(pos: Position) -> Result<LandscapeClass> {
        if (pos.row + pos.col) % 2 == 0 {
            Ok(LandscapeClass::active(0.12, 0.05))
        } else {
            Ok(LandscapeClass::inactive())
        }
    }

    #[test]
    fn test_grid_creation() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noise = Noise::new(0.03).unwrap();
        let grid = Grid::build(10, 8, &checkerboard, &noise, &mut rng).unwrap();

        assert_eq!(grid.rows(), 10);
        assert_eq!(grid.cols(), 8);
        assert_eq!(grid.len(), 80);
        assert_eq!(grid.cells.len(), (14 * 12) as usize);
        assert_eq!(grid.active_count(), 40);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn test_frame_is_inactive() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noise = Noise::new(0.0).unwrap();
        let open = |_: Position| -> Result<LandscapeClass> { Ok(LandscapeClass::active(0.0, 0.0)) };
        let grid = Grid::build(3, 3, &open, &noise, &mut rng).unwrap();

        for pos in [Position::new(-2, -2), Position::new(-1, 1), Position::new(3, 4), Position::new(1, 4)] {
            assert!(!grid.cell(pos).is_active());
            assert!(grid.get(pos).is_none());
        }
        assert!(grid.get(Position::new(2, 2)).is_some());
    }

    #[test]
    fn test_row_major_positions() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noise = Noise::new(0.0).unwrap();
        let grid = Grid::build(2, 3, &checkerboard, &noise, &mut rng).unwrap();

        let positions: Vec<_> = grid.positions().collect();
        assert_eq!(positions[0], Position::new(0, 0));
        assert_eq!(positions[2], Position::new(0, 2));
        assert_eq!(positions[3], Position::new(1, 0));
        for (pos, cell) in grid.positions().zip(grid.iter()) {
            assert_eq!(pos, cell.position());
        }
    }

    #[test]
    fn test_classifier_error_propagates() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noise = Noise::new(0.0).unwrap();
        let missing = |pos: Position| -> Result<LandscapeClass> {
            Err(Error::Configuration(format!("no sample at {}", pos)))
        };
        assert!(Grid::build(2, 2, &missing, &noise, &mut rng).is_err());
    }

    #[test]
    fn test_seeding() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noise = Noise::new(0.0).unwrap();
        let landscape = LandscapeConfig {
            rows: 4,
            cols: 4,
            stride: 5,
            seeds: vec![Position::new(0, 0), Position::new(0, 1), Position::new(2, 2)],
        };
        let grid = Grid::from_landscape(&landscape, &checkerboard, &noise, &mut rng).unwrap();

        // (0, 1) is inactive and must not be occupied
        assert_eq!(grid.occupied_positions(), vec![Position::new(0, 0), Position::new(2, 2)]);
        assert!(!grid.is_occupied(Position::new(0, 1)));
    }

    #[test]
    fn test_seed_out_of_bounds_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noise = Noise::new(0.0).unwrap();
        let mut grid = Grid::build(4, 4, &checkerboard, &noise, &mut rng).unwrap();

        let result = grid.seed(&[Position::new(0, 0), Position::new(4, 0)]);
        assert!(matches!(result, Err(Error::SeedOutOfBounds { row: 4, col: 0, .. })));
        // nothing is seeded when the list is rejected
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn test_apply_transition() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noise = Noise::new(0.0).unwrap();
        let mut grid = Grid::build(3, 3, &checkerboard, &noise, &mut rng).unwrap();
        grid.seed(&[Position::new(1, 1)]).unwrap();

        let applied = grid.apply(&Transition {
            position: Position::new(1, 1),
            density_extinction: 0.5,
            colonized: Some(Position::new(0, 1)),
            extinct: true,
        });

        // (0, 1) is inactive on a checkerboard
        assert_eq!(applied, Applied { colonized: false, extinct: true });
        assert_eq!(grid.occupied_count(), 0);
        let cell = grid.get(Position::new(1, 1)).unwrap();
        assert_eq!(cell.density_extinction(), 0.5);
        assert_eq!(cell.total_extinction(), 0.12 + 0.05 + 0.5);
    }

    #[test]
    fn test_apply_onto_occupied_target_is_not_a_colonization() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let noise = Noise::new(0.0).unwrap();
        let open = |_: Position| -> Result<LandscapeClass> { Ok(LandscapeClass::active(0.0, 0.0)) };
        let mut grid = Grid::build(1, 3, &open, &noise, &mut rng).unwrap();
        grid.seed(&[Position::new(0, 0), Position::new(0, 2)]).unwrap();

        let into_middle = |from: Position| Transition {
            position: from,
            density_extinction: 0.0,
            colonized: Some(Position::new(0, 1)),
            extinct: false,
        };
        let first = grid.apply(&into_middle(Position::new(0, 0)));
        let second = grid.apply(&into_middle(Position::new(0, 2)));

        assert!(first.colonized);
        assert!(!second.colonized);
        assert_eq!(grid.occupied_count(), 3);
    }
}
