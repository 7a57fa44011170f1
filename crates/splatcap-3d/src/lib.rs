#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera intrinsics and COLMAP camera models.
pub mod camera;

/// Conversion between the engine and the reconstruction coordinate conventions.
pub mod coords;

/// I/O utilities for reading and writing 3D data.
pub mod io;

/// Point cloud and Gaussian splat types.
pub mod pointcloud;

/// Camera trajectory generation.
pub mod trajectory;
