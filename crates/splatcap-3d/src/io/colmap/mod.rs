mod binary;
mod dataset;
mod text;
mod types;

pub use binary::*;
pub use dataset::*;
pub use text::*;
pub use types::*;

/// Error types for the COLMAP module.
#[derive(Debug, thiserror::Error)]
pub enum ColmapError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// Invalid number of camera parameters
    #[error("Invalid number of camera parameters: {0}")]
    InvalidNumCameraParams(usize),

    /// Unknown camera model id or name
    #[error("Invalid camera model: {0}")]
    InvalidCameraModel(String),

    /// Camera intrinsics that cannot be serialized
    #[error("Invalid camera intrinsics")]
    InvalidIntrinsics,

    /// Image name that cannot be stored, e.g. one holding a NUL byte
    #[error("Invalid image name: {0:?}")]
    InvalidImageName(String),

    /// Parse error
    #[error("Parse error {0}")]
    ParseError(String),
}
