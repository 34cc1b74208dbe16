//! Read-only neighborhood queries over a grid.

use crate::grid::Grid;
use dispersal_core::{DensityRule, Direction, Position};

/// Half-width of the density window (5x5 block)
pub const DENSITY_RADIUS: i32 = 2;

const DENSITY_NEIGHBORS: f64 = 24.0;
const FIXED_OFFSET_SAMPLES: usize = 25;
const FIXED_OFFSET_DIVISOR: f64 = 96.0;

/// Orthogonal neighbors of `pos` that are active and unoccupied, in
/// up, down, left, right order.
pub fn valid_colonization_targets(grid: &Grid, pos: Position) -> Vec<Direction> {
    Direction::all()
        .into_iter()
        .filter(|direction| {
            let target = grid.cell(pos.step(*direction));
            target.is_active() && !target.is_occupied()
        })
        .collect()
}

/// Occupied fraction of the 24 cells surrounding `pos` in its 5x5 block.
pub fn occupied_fraction(grid: &Grid, pos: Position) -> f64 {
    let mut occupied = 0u32;
    for d_row in -DENSITY_RADIUS..=DENSITY_RADIUS {
        for d_col in -DENSITY_RADIUS..=DENSITY_RADIUS {
            if d_row == 0 && d_col == 0 {
                continue;
            }
            if grid.cell(pos.offset(d_row, d_col)).is_occupied() {
                occupied += 1;
            }
        }
    }
    occupied as f64 / DENSITY_NEIGHBORS
}

/// Density extinction term before noise.
pub fn density(grid: &Grid, pos: Position, rule: DensityRule) -> f64 {
    match rule {
        DensityRule::Neighborhood => occupied_fraction(grid, pos),
        DensityRule::FixedOffset => {
            let corner = grid
                .cell(pos.offset(-DENSITY_RADIUS, -DENSITY_RADIUS))
                .is_occupied();
            let hits = if corner { FIXED_OFFSET_SAMPLES } else { 0 };
            hits as f64 / FIXED_OFFSET_DIVISOR
        }
        DensityRule::Disabled => 0.0,
    }
}
