//! Configuration types for the simulation.

use crate::{Error, Position, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest ensemble count accepted by [`SimulationConfig::validate`]
pub const MAX_ENSEMBLES: usize = 30;
/// Largest step count accepted by [`SimulationConfig::validate`]
pub const MAX_STEPS: u64 = 2000;

/// How the local-density extinction term is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityRule {
    /// Occupied fraction of the 24 cells around the cell in its 5x5 block
    #[default]
    Neighborhood,
    /// Replays the legacy sampler: the (-2, -2) neighbor counted 25 times, over 96
    FixedOffset,
    /// No density contribution (noise only)
    Disabled,
}

/// Order in which transitions see each other's effects within one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// Row-major sweep mutating the live grid; cells colonized ahead of the
    /// cursor are transitioned again in the same sweep
    #[default]
    InPlace,
    /// Decisions read a snapshot taken at sweep start
    DoubleBuffered,
}

/// Monte-Carlo run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of independent replicates
    pub ensemble_count: usize,
    /// Number of steps to run
    pub steps: u64,
    /// Starting epoch in years before present
    pub start_years_before_present: u64,
    /// Simulated years per step
    pub years_per_step: u64,
    /// Chance that an occupied cell attempts colonization each step
    pub colonization_probability: f64,
    /// Standard deviation of the Gaussian noise on extinction components
    pub noise_sigma: f64,
    pub density_rule: DensityRule,
    pub sweep_mode: SweepMode,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Step ensembles on the rayon thread pool
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ensemble_count: 3,
            steps: 1000,
            start_years_before_present: 2_000_000,
            years_per_step: 250,
            colonization_probability: 0.20,
            noise_sigma: 0.03,
            density_rule: DensityRule::default(),
            sweep_mode: SweepMode::default(),
            seed: 0,
            parallel: false,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ENSEMBLES).contains(&self.ensemble_count) {
            return Err(Error::Configuration(format!(
                "ensemble_count must be in 1..={}, got {}",
                MAX_ENSEMBLES, self.ensemble_count
            )));
        }
        if !(1..=MAX_STEPS).contains(&self.steps) {
            return Err(Error::Configuration(format!(
                "steps must be in 1..={}, got {}",
                MAX_STEPS, self.steps
            )));
        }
        if self.years_per_step == 0 {
            return Err(Error::Configuration("years_per_step must be positive".into()));
        }
        if self.steps.saturating_mul(self.years_per_step) > self.start_years_before_present {
            return Err(Error::Configuration(format!(
                "{} steps of {} years run past the present from {} years ago",
                self.steps, self.years_per_step, self.start_years_before_present
            )));
        }
        if !(0.0..=1.0).contains(&self.colonization_probability) {
            return Err(Error::Configuration(format!(
                "colonization_probability must be in [0, 1], got {}",
                self.colonization_probability
            )));
        }
        if !self.noise_sigma.is_finite() || self.noise_sigma < 0.0 {
            return Err(Error::Configuration(format!(
                "noise_sigma must be finite and non-negative, got {}",
                self.noise_sigma
            )));
        }
        Ok(())
    }
}

/// Landscape sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandscapeConfig {
    /// Grid rows (raster x axis after sampling)
    pub rows: i32,
    /// Grid columns (raster y axis after sampling)
    pub cols: i32,
    /// Pixels between raster samples
    pub stride: u32,
    /// Cells occupied at t = 0, in order
    pub seeds: Vec<Position>,
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            rows: 205,
            cols: 155,
            stride: 5,
            // East African founder populations
            seeds: vec![
                Position::new(84, 91),
                Position::new(85, 92),
                Position::new(85, 96),
                Position::new(86, 90),
                Position::new(87, 94),
                Position::new(88, 93),
            ],
        }
    }
}

impl LandscapeConfig {
    pub fn contains(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.row < self.rows && pos.col >= 0 && pos.col < self.cols
    }

    /// Minimum raster size, in pixels, that covers every sample. Fails when
    /// the extent does not fit in a `u32`.
    pub fn required_extent(&self) -> Result<(u32, u32)> {
        let extent = |cells: i32| {
            (cells.max(1) as u32 - 1)
                .checked_mul(self.stride)
                .and_then(|span| span.checked_add(1))
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "{} cells at stride {} overflow the raster extent",
                        cells, self.stride
                    ))
                })
        };
        Ok((extent(self.rows)?, extent(self.cols)?))
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows <= 0 || self.cols <= 0 {
            return Err(Error::Configuration(format!(
                "grid must have positive dimensions, got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.stride == 0 {
            return Err(Error::Configuration("stride must be positive".into()));
        }
        self.required_extent()?;
        if let Some(seed) = self.seeds.iter().find(|seed| !self.contains(**seed)) {
            return Err(Error::SeedOutOfBounds {
                row: seed.row,
                col: seed.col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }
}

/// On-disk run description: simulation parameters plus the landscape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub simulation: SimulationConfig,
    pub landscape: LandscapeConfig,
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.landscape.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let sim = SimulationConfig::default();
        assert_eq!(sim.start_years_before_present, 2_000_000);
        assert_eq!(sim.years_per_step, 250);
        assert_eq!(sim.colonization_probability, 0.20);
        assert_eq!(sim.noise_sigma, 0.03);
        assert!(sim.validate().is_ok());

        let landscape = LandscapeConfig::default();
        assert_eq!((landscape.rows, landscape.cols), (205, 155));
        assert_eq!(landscape.seeds.len(), 6);
        assert!(landscape.validate().is_ok());
    }

    #[test]
    fn test_simulation_bounds() {
        let too_many = SimulationConfig {
            ensemble_count: MAX_ENSEMBLES + 1,
            ..Default::default()
        };
        assert!(too_many.validate().is_err());

        let none = SimulationConfig {
            ensemble_count: 0,
            ..Default::default()
        };
        assert!(none.validate().is_err());

        let bad_probability = SimulationConfig {
            colonization_probability: 1.5,
            ..Default::default()
        };
        assert!(bad_probability.validate().is_err());

        let negative_noise = SimulationConfig {
            noise_sigma: -0.1,
            ..Default::default()
        };
        assert!(negative_noise.validate().is_err());

        let past_present = SimulationConfig {
            steps: 10,
            start_years_before_present: 1000,
            ..Default::default()
        };
        assert!(past_present.validate().is_err());
    }

    #[test]
    fn test_seed_out_of_bounds() {
        let config = LandscapeConfig {
            rows: 10,
            cols: 10,
            seeds: vec![Position::new(2, 2), Position::new(10, 3)],
            ..Default::default()
        };
        match config.validate() {
            Err(Error::SeedOutOfBounds { row, col, .. }) => assert_eq!((row, col), (10, 3)),
            other => panic!("expected seed error, got {:?}", other),
        }
    }

    #[test]
    fn test_required_extent() {
        let config = LandscapeConfig::default();
        assert_eq!(config.required_extent().unwrap(), (1021, 771));
    }

    #[test]
    fn test_oversized_extent_is_a_configuration_error() {
        let huge_stride = LandscapeConfig {
            rows: 3,
            cols: 3,
            stride: u32::MAX,
            seeds: vec![],
        };
        assert!(huge_stride.required_extent().is_err());
        assert!(huge_stride.validate().unwrap_err().is_configuration());

        let huge_grid = LandscapeConfig {
            rows: i32::MAX,
            cols: 2,
            stride: 5,
            seeds: vec![],
        };
        assert!(matches!(huge_grid.validate(), Err(Error::Configuration(_))));

        let json = r#"{"rows": 4, "cols": 4, "stride": 4294967295, "seeds": []}"#;
        let from_file: LandscapeConfig = serde_json::from_str(json).unwrap();
        assert!(from_file.validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let json = r#"{"ensemble_count": 5, "sweep_mode": "double_buffered", "density_rule": "fixed_offset"}"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.ensemble_count, 5);
        assert_eq!(config.sweep_mode, SweepMode::DoubleBuffered);
        assert_eq!(config.density_rule, DensityRule::FixedOffset);
        assert_eq!(config.steps, 1000);
    }

    #[test]
    fn test_run_config_partial_json() {
        let json = r#"{
            "simulation": {"steps": 200, "parallel": true},
            "landscape": {"rows": 10, "cols": 8, "seeds": [{"row": 1, "col": 2}]}
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.simulation.steps, 200);
        assert!(config.simulation.parallel);
        assert_eq!(config.simulation.ensemble_count, 3);
        assert_eq!(config.landscape.stride, 5);
        assert_eq!(config.landscape.seeds, vec![Position::new(1, 2)]);
        assert!(config.validate().is_ok());
    }
}
