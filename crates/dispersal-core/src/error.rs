//! Error types for the simulation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "{layer} raster is {width}x{height} but the sampled extent needs at least {required_width}x{required_height}"
    )]
    Coverage {
        layer: String,
        width: u32,
        height: u32,
        required_width: u32,
        required_height: u32,
    },

    #[error("Seed ({row}, {col}) lies outside the {rows}x{cols} grid")]
    SeedOutOfBounds {
        row: i32,
        col: i32,
        rows: i32,
        cols: i32,
    },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// True for errors that are raised while setting a run up, before any
    /// ensemble exists.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::Coverage { .. } | Error::SeedOutOfBounds { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
