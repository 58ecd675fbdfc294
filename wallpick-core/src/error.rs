//! Error type shared by the geometry engine and the commit workflow.

use thiserror::Error;

use crate::destination::Destination;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A width or height was zero or negative.
    #[error("invalid dimension {width}x{height}: both sides must be positive")]
    InvalidDimension { width: i32, height: i32 },

    /// The crop surface policy would produce a surface smaller than the screen, or one too large to represent.
    #[error("invalid crop surface policy: scale {scale} must be >= 1, inset {inset} >= 0, and the surface must fit in i32")]
    InvalidSurfacePolicy { scale: f64, inset: i32 },

    /// A gesture tried to zoom out past the point where the image covers the surface.
    #[error("zoom {requested} is below the minimum {minimum}")]
    ZoomBelowMinimum { requested: f64, minimum: f64 },

    /// The crop rectangle rendered at the given zoom leaves part of the surface uncovered.
    #[error("crop rectangle {width}x{height} at zoom {zoom} does not cover the {surface_width}x{surface_height} surface")]
    InvalidCropRectangle {
        width: i64,
        height: i64,
        zoom: f64,
        surface_width: i32,
        surface_height: i32,
    },

    #[error("wallpaper already committed to {0}")]
    AlreadyCommitted(Destination),

    #[error("a commit is still in progress")]
    CommitInProgress,

    #[error("no destinations requested")]
    NoDestinations,

    #[error("set wallpaper failed: {0}")]
    PersistenceFailed(String),

    /// The workflow was created outside a tokio runtime.
    #[error("async runtime unavailable: {0}")]
    Runtime(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
