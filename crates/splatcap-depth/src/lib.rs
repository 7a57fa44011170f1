#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for depth operations.
pub mod error;

/// Depth map encoders and file writers.
///
/// See [`export::save_depth`] for the format dispatch.
pub mod export;

/// Reversed-Z to linear depth conversion.
pub mod linear;

/// NumPy `.npy` container.
pub mod npy;

/// Sanity checks on linearized depth.
pub mod validation;

/// Debug visualization of depth maps.
pub mod visualization;

pub use error::DepthError;
pub use export::{save_depth, DepthFormat};
pub use linear::{linearize_depth, scene_depth_to_linear, DepthExportConfig, DepthMap};
