/// An error type for the depth crate.
#[derive(thiserror::Error, Debug)]
pub enum DepthError {
    /// Error to read or write a file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// The buffer does not hold `width * height` values.
    #[error("Invalid depth dimensions {width}x{height} for {len} values")]
    InvalidDimensions {
        /// Width in pixels.
        width: usize,
        /// Height in pixels.
        height: usize,
        /// Number of values in the buffer.
        len: usize,
    },

    /// Near and far planes that cannot be linearized.
    #[error("Invalid clip planes near={near} far={far}")]
    InvalidClipPlanes {
        /// Near plane.
        near: f32,
        /// Far plane.
        far: f32,
    },

    /// Error to encode the PNG image.
    #[error("Failed to encode the png image. {0}")]
    PngEncodingError(String),

    /// Error to write the JSON metadata.
    #[error("Failed to write depth metadata. {0}")]
    MetadataError(#[from] serde_json::Error),
}
