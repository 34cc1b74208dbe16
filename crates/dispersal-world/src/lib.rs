//! Landscape dispersal engine.
//!
//! This crate implements the probabilistic cellular automaton: cells with
//! static and density-driven extinction rates, orthogonal colonization, and
//! a Monte-Carlo ensemble driver that aggregates per-cell occupancy.

pub mod cell;
pub mod ensemble;
pub mod grid;
pub mod landscape;
pub mod neighborhood;
pub mod occupancy;
pub mod simulation;

pub use cell::{Cell, Noise, Transition, TransitionParams};
pub use ensemble::{Ensemble, StepStats};
pub use grid::Grid;
pub use landscape::{Biome, Classifier, ElevationBand, LandscapeClass, RasterClassifier, RgbRaster};
pub use occupancy::OccupancyField;
pub use simulation::{FrameSink, RunSummary, Simulation, StepFrame};
