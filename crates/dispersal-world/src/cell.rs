//! Cell state and the stochastic colonization/extinction rule.

use crate::grid::Grid;
use crate::landscape::LandscapeClass;
use crate::neighborhood;
use dispersal_core::{DensityRule, Error, Position, Result, SimulationConfig};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Zero-mean Gaussian perturbation applied to extinction components
#[derive(Debug, Clone, Copy)]
pub struct Noise {
    normal: Normal<f64>,
}

impl Noise {
    pub fn new(sigma: f64) -> Result<Self> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(Error::Configuration(format!(
                "noise sigma must be finite and non-negative, got {}",
                sigma
            )));
        }
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| Error::Configuration(format!("invalid noise sigma {}: {}", sigma, e)))?;
        Ok(Self { normal })
    }

    pub fn sigma(&self) -> f64 {
        self.normal.std_dev()
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.normal.sample(rng)
    }
}

/// Parameters shared by every transition of a run
#[derive(Debug, Clone, Copy)]
pub struct TransitionParams {
    pub colonization_probability: f64,
    pub density_rule: DensityRule,
    pub noise: Noise,
}

impl TransitionParams {
    pub fn new(colonization_probability: f64, density_rule: DensityRule, noise_sigma: f64) -> Result<Self> {
        Ok(Self {
            colonization_probability,
            density_rule,
            noise: Noise::new(noise_sigma)?,
        })
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        Self::new(
            config.colonization_probability,
            config.density_rule,
            config.noise_sigma,
        )
    }
}

/// Outcome of one cell's transition, decided against a grid view and
/// applied with [`Grid::apply`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub position: Position,
    pub density_extinction: f64,
    pub colonized: Option<Position>,
    pub extinct: bool,
}

/// One landscape block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    position: Position,
    active: bool,
    occupied: bool,
    vegetation_extinction: f64,
    elevation_extinction: f64,
    density_extinction: f64,
    total_extinction: f64,
}

impl Cell {
    /// Builds a cell from its landscape class. Active cells get independent
    /// noise on the vegetation and elevation rates, drawn once here.
    pub fn new<R: Rng + ?Sized>(
        position: Position,
        class: LandscapeClass,
        noise: &Noise,
        rng: &mut R,
    ) -> Self {
        if !class.active {
            return Self::inactive(position);
        }

        let vegetation_extinction = class.vegetation_extinction + noise.sample(rng);
        let elevation_extinction = class.elevation_extinction + noise.sample(rng);

        Self {
            position,
            active: true,
            occupied: false,
            vegetation_extinction,
            elevation_extinction,
            density_extinction: 0.0,
            total_extinction: vegetation_extinction + elevation_extinction,
        }
    }

    pub fn inactive(position: Position) -> Self {
        Self {
            position,
            active: false,
            occupied: false,
            vegetation_extinction: 1.0,
            elevation_extinction: 1.0,
            density_extinction: 1.0,
            total_extinction: 3.0,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn vegetation_extinction(&self) -> f64 {
        self.vegetation_extinction
    }

    pub fn elevation_extinction(&self) -> f64 {
        self.elevation_extinction
    }

    pub fn density_extinction(&self) -> f64 {
        self.density_extinction
    }

    /// Sum of the three components, unclamped: values above 1
    /// make extinction certain, negative values make it impossible.
    pub fn total_extinction(&self) -> f64 {
        self.total_extinction
    }

    /// Marks the cell occupied. Inactive cells refuse and return `false`.
    pub(crate) fn occupy(&mut self) -> bool {
        if self.active {
            self.occupied = true;
        }
        self.active
    }

    pub(crate) fn vacate(&mut self) {
        self.occupied = false;
    }

    pub(crate) fn set_density_extinction(&mut self, density_extinction: f64) {
        self.density_extinction = density_extinction;
        self.total_extinction =
            self.vegetation_extinction + self.elevation_extinction + density_extinction;
    }

    /// Decides this cell's transition for one step.
    ///
    /// Draw order: density noise, then for occupied cells the colonization
    /// roll, the target pick (only with at least one target), and the
    /// extinction roll.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        view: &Grid,
        params: &TransitionParams,
        rng: &mut R,
    ) -> Transition {
        let density_extinction = neighborhood::density(view, self.position, params.density_rule)
            + params.noise.sample(rng);

        let mut transition = Transition {
            position: self.position,
            density_extinction,
            colonized: None,
            extinct: false,
        };

        if !(self.active && self.occupied) {
            return transition;
        }

        if rng.gen::<f64>() < params.colonization_probability {
            let targets = neighborhood::valid_colonization_targets(view, self.position);
            if !targets.is_empty() {
                let direction = targets[rng.gen_range(0..targets.len())];
                transition.colonized = Some(self.position.step(direction));
            }
        }

        let total_extinction =
            self.vegetation_extinction + self.elevation_extinction + density_extinction;
        transition.extinct = rng.gen::<f64>() < total_extinction;

        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_cell_creation_without_noise() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let noise = Noise::new(0.0).unwrap();
        let cell = Cell::new(
            Position::new(3, 4),
            LandscapeClass::active(0.12, 0.05),
            &noise,
            &mut rng,
        );

        assert!(cell.is_active());
        assert!(!cell.is_occupied());
        assert_eq!(cell.vegetation_extinction(), 0.12);
        assert_eq!(cell.elevation_extinction(), 0.05);
        assert_eq!(cell.total_extinction(), 0.12 + 0.05);
    }

    #[test]
    fn test_noise_is_applied_once_per_component() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let noise = Noise::new(0.03).unwrap();
        let cell = Cell::new(
            Position::new(0, 0),
            LandscapeClass::active(0.12, 0.05),
            &noise,
            &mut rng,
        );

        assert_ne!(cell.vegetation_extinction(), 0.12);
        assert_ne!(cell.elevation_extinction(), 0.05);
        assert!((cell.vegetation_extinction() - 0.12).abs() < 0.3);
        assert!((cell.elevation_extinction() - 0.05).abs() < 0.3);
    }

    #[test]
    fn test_inactive_cell_refuses_occupation() {
        let mut cell = Cell::inactive(Position::new(0, 0));
        assert!(!cell.occupy());
        assert!(!cell.is_occupied());
        assert_eq!(cell.total_extinction(), 3.0);
    }

    #[test]
    fn test_total_extinction_is_exact_sum() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let noise = Noise::new(0.0).unwrap();
        let mut cell = Cell::new(
            Position::new(1, 1),
            LandscapeClass::active(0.17, 0.22),
            &noise,
            &mut rng,
        );

        cell.set_density_extinction(0.25);
        assert_eq!(cell.total_extinction(), 0.17 + 0.22 + 0.25);
    }

    #[test]
    fn test_total_extinction_is_unclamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let noise = Noise::new(0.0).unwrap();
        let mut cell = Cell::new(
            Position::new(1, 1),
            LandscapeClass::active(1.0, 0.22),
            &noise,
            &mut rng,
        );
        cell.set_density_extinction(0.5);
        assert!(cell.total_extinction() > 1.0);
    }

    #[test]
    fn test_invalid_noise_sigma() {
        assert!(Noise::new(-1.0).is_err());
        assert!(Noise::new(f64::NAN).is_err());
        assert!(Noise::new(f64::INFINITY).is_err());
        assert_eq!(Noise::new(0.03).unwrap().sigma(), 0.03);
        assert_eq!(Noise::new(0.0).unwrap().sigma(), 0.0);
    }

    #[test]
    fn test_transition_params_reject_negative_sigma() {
        let err = TransitionParams::new(0.2, DensityRule::Neighborhood, -0.03).unwrap_err();
        assert!(err.is_configuration());
    }
}
