use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use png::{BitDepth, ColorType, Encoder};
use serde::{Deserialize, Serialize};

use crate::{error::DepthError, linear::DepthMap, npy};

/// On-disk depth encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthFormat {
    /// 16-bit grayscale PNG, quantized over the clip window.
    Png16,
    /// Lossless `f32` with a JSON sidecar.
    #[default]
    Float32,
    /// NumPy `.npy` array of `f32`.
    Npy,
    /// Headerless little-endian `f32`.
    RawFloat32,
}

impl DepthFormat {
    /// Usual file extension including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            DepthFormat::Png16 => ".png",
            DepthFormat::Float32 => ".depth.raw",
            DepthFormat::Npy => ".npy",
            DepthFormat::RawFloat32 => ".raw",
        }
    }
}

/// Sidecar written next to [`DepthFormat::Float32`] files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthMetadata {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Smallest value.
    pub min_depth: f32,
    /// Largest value.
    pub max_depth: f32,
    /// Always `float32`.
    pub format: String,
    /// Unit of the values.
    pub units: String,
}

impl From<&DepthMap> for DepthMetadata {
    fn from(depth: &DepthMap) -> Self {
        Self {
            width: depth.width,
            height: depth.height,
            min_depth: depth.min_depth,
            max_depth: depth.max_depth,
            format: "float32".to_string(),
            units: depth.units().to_string(),
        }
    }
}

/// Quantize depth into `0..=65535` over [`DepthMap::encoding_window`].
pub fn encode_u16(depth: &DepthMap) -> Vec<u16> {
    let (lo, hi) = depth.encoding_window();
    let range = if hi > lo { hi - lo } else { 1.0 };
    depth
        .data
        .iter()
        .map(|&d| (((d - lo) / range).clamp(0.0, 1.0) * 65535.0).round() as u16)
        .collect()
}

fn check_valid(depth: &DepthMap) -> Result<(), DepthError> {
    if !depth.is_valid() {
        return Err(DepthError::InvalidDimensions {
            width: depth.width,
            height: depth.height,
            len: depth.data.len(),
        });
    }
    Ok(())
}

fn f32_le_bytes(data: &[f32]) -> Vec<u8> {
    data.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Write a 16-bit grayscale PNG.
///
/// # Arguments
///
/// * `file_path` - The path to the PNG file.
/// * `depth` - The depth map, quantized with [`encode_u16`].
pub fn write_depth_png16(file_path: impl AsRef<Path>, depth: &DepthMap) -> Result<(), DepthError> {
    check_valid(depth)?;

    // png stores 16-bit samples big endian
    let image_data = encode_u16(depth)
        .iter()
        .flat_map(|v| v.to_be_bytes())
        .collect::<Vec<_>>();

    let file = BufWriter::new(File::create(file_path)?);
    let mut encoder = Encoder::new(file, depth.width as u32, depth.height as u32);
    encoder.set_color(ColorType::Grayscale);
    encoder.set_depth(BitDepth::Sixteen);

    let mut writer = encoder
        .write_header()
        .map_err(|e| DepthError::PngEncodingError(e.to_string()))?;
    writer
        .write_image_data(&image_data)
        .map_err(|e| DepthError::PngEncodingError(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| DepthError::PngEncodingError(e.to_string()))?;
    Ok(())
}

/// Write headerless little-endian `f32` values.
pub fn write_depth_raw(file_path: impl AsRef<Path>, depth: &DepthMap) -> Result<(), DepthError> {
    check_valid(depth)?;
    let mut writer = BufWriter::new(File::create(file_path)?);
    writer.write_all(&f32_le_bytes(&depth.data))?;
    writer.flush()?;
    Ok(())
}

/// Paths of the raw data and the JSON sidecar for a float32 export.
///
/// The extension of `file_path` is replaced, `frame.exr` and
/// `frame.depth.raw` both give `frame.depth.raw` and `frame.depth.json`.
pub fn float32_paths(file_path: impl AsRef<Path>) -> (PathBuf, PathBuf) {
    let file_path = file_path.as_ref();
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = stem.strip_suffix(".depth").unwrap_or(&stem);
    (
        file_path.with_file_name(format!("{stem}.depth.raw")),
        file_path.with_file_name(format!("{stem}.depth.json")),
    )
}

/// Write raw `f32` values plus a [`DepthMetadata`] sidecar.
///
/// # Returns
///
/// The path of the raw data file.
pub fn write_depth_float32(
    file_path: impl AsRef<Path>,
    depth: &DepthMap,
) -> Result<PathBuf, DepthError> {
    let (data_path, metadata_path) = float32_paths(file_path);
    write_depth_raw(&data_path, depth)?;

    let writer = BufWriter::new(File::create(metadata_path)?);
    serde_json::to_writer(writer, &DepthMetadata::from(depth))?;

    Ok(data_path)
}

/// Save a depth map in the given format.
///
/// # Arguments
///
/// * `depth` - The linearized depth map.
/// * `file_path` - The destination, see [`float32_paths`] for how float32 exports rename it.
/// * `format` - The encoding.
///
/// # Returns
///
/// The path of the data file that was written.
pub fn save_depth(
    depth: &DepthMap,
    file_path: impl AsRef<Path>,
    format: DepthFormat,
) -> Result<PathBuf, DepthError> {
    let file_path = file_path.as_ref();
    let written = match format {
        DepthFormat::Png16 => {
            write_depth_png16(file_path, depth)?;
            file_path.to_path_buf()
        }
        DepthFormat::Float32 => write_depth_float32(file_path, depth)?,
        DepthFormat::Npy => {
            npy::write_depth_npy(file_path, depth)?;
            file_path.to_path_buf()
        }
        DepthFormat::RawFloat32 => {
            write_depth_raw(file_path, depth)?;
            file_path.to_path_buf()
        }
    };

    log::debug!("saved {:?} depth to {}", format, written.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{linearize_depth, DepthExportConfig};

    fn depth_map() -> Result<DepthMap, DepthError> {
        // 0.1 m, 0.2 m, 1 m and the far plane
        linearize_depth(&[1.0, 0.5, 0.1, 0.0], 2, 2, &DepthExportConfig::default())
    }

    #[test]
    fn test_encode_u16() -> Result<(), DepthError> {
        let depth = depth_map()?;
        let encoded = encode_u16(&depth);
        assert_eq!(encoded[0], 0);
        assert_eq!(encoded[3], 65535);
        assert!(encoded[1] > 0 && encoded[1] < encoded[2]);
        Ok(())
    }

    #[test]
    fn test_float32_paths() {
        let (data, metadata) = float32_paths("/tmp/depth/frame_00001.exr");
        assert_eq!(data, PathBuf::from("/tmp/depth/frame_00001.depth.raw"));
        assert_eq!(metadata, PathBuf::from("/tmp/depth/frame_00001.depth.json"));

        let (data, _) = float32_paths("frame_00001.depth.raw");
        assert_eq!(data, PathBuf::from("frame_00001.depth.raw"));
    }

    #[test]
    fn test_save_depth_float32() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let depth = depth_map()?;

        let written = save_depth(&depth, tmp_dir.path().join("frame.exr"), DepthFormat::Float32)?;
        assert_eq!(written, tmp_dir.path().join("frame.depth.raw"));

        let bytes = std::fs::read(&written)?;
        assert_eq!(bytes.len(), 4 * 4);
        assert_eq!(&bytes[4..8], &depth.data[1].to_le_bytes());

        let metadata: DepthMetadata =
            serde_json::from_slice(&std::fs::read(tmp_dir.path().join("frame.depth.json"))?)?;
        assert_eq!(metadata, DepthMetadata::from(&depth));
        assert_eq!(metadata.format, "float32");
        assert_eq!(metadata.units, "meters");
        Ok(())
    }

    #[test]
    fn test_save_depth_raw_and_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let mut depth = depth_map()?;

        let path = tmp_dir.path().join("frame.raw");
        save_depth(&depth, &path, DepthFormat::RawFloat32)?;
        assert_eq!(std::fs::read(&path)?.len(), 16);

        depth.data.pop();
        assert!(save_depth(&depth, &path, DepthFormat::Png16).is_err());
        Ok(())
    }

    #[test]
    fn test_format_serde() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(serde_json::to_string(&DepthFormat::RawFloat32)?, "\"raw_float32\"");
        assert_eq!(DepthFormat::default(), DepthFormat::Float32);
        assert_eq!(DepthFormat::Npy.extension(), ".npy");
        Ok(())
    }
}
