use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{
    properties::{bincode_config, GaussianSplatRecord, PlyType, PointCloudRecord},
    PlyEncoding, PlyError,
};
use crate::pointcloud::{GaussianSplat, PointCloudPoint};

/// Bytes of a binary point record.
pub const POINT_RECORD_SIZE: usize = PointCloudRecord::SIZE;

/// Bytes of a binary splat record.
pub const SPLAT_RECORD_SIZE: usize = GaussianSplatRecord::SIZE;

/// Per-splat figure used by [`estimate_memory_usage`].
pub const SPLAT_MEMORY_ESTIMATE: usize = 236;

/// Splat counts below this are flagged as low.
pub const LOW_SPLAT_COUNT: usize = 1_000;

/// Splat counts above this are flagged as high.
pub const HIGH_SPLAT_COUNT: usize = 10_000_000;

/// Build the header of a vertex-only PLY file.
///
/// # Arguments
///
/// * `format` - The vertex layout.
/// * `vertex_count` - Number of vertices that follow.
/// * `encoding` - Body encoding.
pub fn ply_header(format: &PlyType, vertex_count: usize, encoding: PlyEncoding) -> String {
    let mut header = String::new();
    header.push_str("ply\n");
    let _ = writeln!(header, "format {} 1.0", encoding.name());
    let _ = writeln!(header, "element vertex {vertex_count}");
    for property in format.properties() {
        let _ = writeln!(
            header,
            "property {} {}",
            property.data_type.name(),
            property.name
        );
    }
    header.push_str("end_header\n");
    header
}

/// Approximate memory of `num_splats` splats in bytes.
pub fn estimate_memory_usage(num_splats: usize) -> usize {
    num_splats * SPLAT_MEMORY_ESTIMATE
}

/// Write points with header to any writer.
pub fn write_point_cloud_to<W: Write>(
    writer: &mut W,
    points: &[PointCloudPoint],
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    if points.is_empty() {
        return Err(PlyError::EmptyInput);
    }

    writer.write_all(ply_header(&PlyType::PointCloud, points.len(), encoding).as_bytes())?;

    match encoding {
        PlyEncoding::BinaryLittleEndian => {
            for point in points {
                bincode::encode_into_std_write(
                    PointCloudRecord::from(point),
                    &mut *writer,
                    bincode_config(),
                )?;
            }
        }
        PlyEncoding::Ascii => {
            for point in points {
                let [x, y, z] = point.position;
                let [nx, ny, nz] = point.normal;
                let [r, g, b] = point.color;
                writeln!(
                    writer,
                    "{x:.6} {y:.6} {z:.6} {nx:.6} {ny:.6} {nz:.6} {r} {g} {b}"
                )?;
            }
        }
    }

    Ok(())
}

/// Write a point cloud PLY file.
///
/// # Arguments
///
/// * `path` - Destination file.
/// * `points` - The points, must not be empty.
/// * `encoding` - Binary or ASCII body.
pub fn write_point_cloud(
    path: impl AsRef<Path>,
    points: &[PointCloudPoint],
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    if points.is_empty() {
        return Err(PlyError::EmptyInput);
    }
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_point_cloud_to(&mut writer, points, encoding)?;
    writer.flush()?;

    log::debug!(
        "wrote {} points to {}",
        points.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Write splats with header to any writer.
pub fn write_gaussian_splats_to<W: Write>(
    writer: &mut W,
    splats: &[GaussianSplat],
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    if splats.is_empty() {
        return Err(PlyError::EmptyInput);
    }

    writer.write_all(ply_header(&PlyType::GaussianSplat, splats.len(), encoding).as_bytes())?;

    match encoding {
        PlyEncoding::BinaryLittleEndian => {
            for splat in splats {
                bincode::encode_into_std_write(
                    GaussianSplatRecord::from(splat),
                    &mut *writer,
                    bincode_config(),
                )?;
            }
        }
        PlyEncoding::Ascii => {
            let mut line = String::new();
            for splat in splats {
                line.clear();
                for (i, value) in GaussianSplatRecord::from(splat).values().enumerate() {
                    if i > 0 {
                        line.push(' ');
                    }
                    let _ = write!(line, "{value:.6}");
                }
                writeln!(writer, "{line}")?;
            }
        }
    }

    Ok(())
}

/// Write a 3DGS splat PLY file.
///
/// Binary records are [`SPLAT_RECORD_SIZE`] bytes, all fields little-endian
/// `f32` in header order.
pub fn write_gaussian_splats(
    path: impl AsRef<Path>,
    splats: &[GaussianSplat],
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    if splats.is_empty() {
        return Err(PlyError::EmptyInput);
    }
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_gaussian_splats_to(&mut writer, splats, encoding)?;
    writer.flush()?;

    log::info!(
        "wrote {} splats to {} (~{} MB in memory)",
        splats.len(),
        path.as_ref().display(),
        estimate_memory_usage(splats.len()) / (1024 * 1024)
    );
    Ok(())
}

/// Issues found by [`validate_splats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplatWarning {
    /// No splats at all.
    Empty,
    /// Splats with a NaN or infinite position.
    InvalidPositions(usize),
    /// Splats with opacity outside `[0, 1]`.
    InvalidOpacity(usize),
    /// Splats with a log scale component outside `[-20, 10]`.
    ExtremeScale(usize),
    /// Splats whose rotation norm is off by more than 0.01.
    NonUnitRotation(usize),
    /// Fewer than [`LOW_SPLAT_COUNT`] splats.
    LowSplatCount(usize),
    /// More than [`HIGH_SPLAT_COUNT`] splats.
    HighSplatCount(usize),
}

impl fmt::Display for SplatWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty splat array"),
            Self::InvalidPositions(n) => write!(f, "{n} splats have invalid positions"),
            Self::InvalidOpacity(n) => write!(f, "{n} splats have invalid opacity values"),
            Self::ExtremeScale(n) => write!(f, "{n} splats have extreme scale values"),
            Self::NonUnitRotation(n) => {
                write!(f, "{n} splats have non-unit rotation quaternions")
            }
            Self::LowSplatCount(n) => {
                write!(f, "low splat count ({n}), 10K-1M is typical for quality scenes")
            }
            Self::HighSplatCount(n) => {
                write!(f, "very high splat count ({n}), may impact performance")
            }
        }
    }
}

/// Result of [`validate_splats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplatReport {
    /// False when the input is empty or a position is not finite.
    pub is_valid: bool,
    /// Everything worth reporting.
    pub warnings: Vec<SplatWarning>,
}

/// Sanity check splats before handing them to a trainer.
pub fn validate_splats(splats: &[GaussianSplat]) -> SplatReport {
    if splats.is_empty() {
        return SplatReport {
            is_valid: false,
            warnings: vec![SplatWarning::Empty],
        };
    }

    let count = |pred: fn(&GaussianSplat) -> bool| splats.iter().filter(|s| pred(s)).count();

    let invalid_positions = count(|s| s.position.iter().any(|v| !v.is_finite()));
    let invalid_opacity = count(|s| !(0.0..=1.0).contains(&s.opacity));
    let extreme_scale = count(|s| s.scale.iter().any(|v| !(-20.0..=10.0).contains(v)));
    let non_unit_rotation = count(|s| !(0.99..=1.01).contains(&s.rotation_norm()));

    let mut warnings = Vec::new();
    if invalid_positions > 0 {
        warnings.push(SplatWarning::InvalidPositions(invalid_positions));
    }
    if invalid_opacity > 0 {
        warnings.push(SplatWarning::InvalidOpacity(invalid_opacity));
    }
    if extreme_scale > 0 {
        warnings.push(SplatWarning::ExtremeScale(extreme_scale));
    }
    if non_unit_rotation > 0 {
        warnings.push(SplatWarning::NonUnitRotation(non_unit_rotation));
    }

    if splats.len() < LOW_SPLAT_COUNT {
        warnings.push(SplatWarning::LowSplatCount(splats.len()));
    } else if splats.len() > HIGH_SPLAT_COUNT {
        warnings.push(SplatWarning::HighSplatCount(splats.len()));
    }

    for warning in &warnings {
        log::warn!("{warning}");
    }

    SplatReport {
        is_valid: invalid_positions == 0,
        warnings,
    }
}
