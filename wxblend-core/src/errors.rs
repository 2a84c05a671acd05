use thiserror::Error;

/// Error type for invalid blending operations.
#[derive(Error, Debug)]
pub enum BlendError {
    #[error("{0}")]
    Error(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unable to merge cubes for blending: {0}")]
    Merge(String),
    #[error("Unsuitable grid geometry: {0}")]
    Geometry(String),
    #[error("Unable to calculate blend weights: {0}")]
    Weights(String),
    #[error("Unable to blend across dimension: {0}")]
    Blending(String),
    #[error("Expected to find exactly 1 {0} coordinate, but found none")]
    CoordinateNotFound(String),
    #[error("Invalid metadata on cube {cube}: {details}")]
    Metadata { cube: String, details: String },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// Convenience type for `Result<T, BlendError>`.
pub type BlendResult<T> = Result<T, BlendError>;
