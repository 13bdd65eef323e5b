use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifeGenError {
    /// The coordinate (after any offset) cannot hold a live cell.
    #[error("cell coordinate ({x}, {y}) is outside the supported grid")]
    CoordinateOutOfRange { x: i64, y: i64 },

    /// A flat coordinate list must hold whole `(x, y)` pairs.
    #[error("coordinate list has odd length {0}")]
    OddCoordinateCount(usize),

    #[error("failed to build notify thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
