//! Sparse ordered-store Conway's Game of Life engine (B3/S23).

pub mod lifegen;
pub mod pattern;
pub use lifegen::{LifeGen, LifeGenConfig, LifeGenError};
