//! Little-endian COLMAP binary model files.
//!
//! Every file starts with a `u64` record count followed by the records:
//!
//! - camera: `u32 id, i32 model, u64 width, u64 height, f64 x params`
//! - image: `u32 id, f64 x 4 qvec, f64 x 3 tvec, u32 camera id, NUL terminated
//!   name, u64 n, n x (f64 x, f64 y, u64 point3d id)`
//! - point: `u64 id, f64 x 3 xyz, u8 x 3 rgb, f64 error, u64 n, n x (u32 image
//!   id, u32 point2d index)`

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{text::check_num_params, ColmapCamera, ColmapError, ColmapImage, ColmapPoint3d};
use crate::camera::CameraModel;
use crate::io::reserved_capacity;

/// Point id written for keypoints without a 3D point.
pub const INVALID_POINT3D_ID: u64 = u64::MAX;

/// Bytes of a point record without its track.
pub const POINT3D_RECORD_BASE_SIZE: usize = 8 + 3 * 8 + 3 + 8 + 8;

/// Bytes of one track entry.
pub const TRACK_ELEMENT_SIZE: usize = 8;

/// Write the cameras.bin file.
///
/// # Arguments
///
/// * `path` - The path to the cameras.bin file.
/// * `cameras` - The cameras to write.
pub fn write_cameras_bin(
    path: impl AsRef<Path>,
    cameras: &[ColmapCamera],
) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_cameras_bin_to(&mut writer, cameras)?;
    writer.flush()?;
    Ok(())
}

/// Write cameras in the binary format to any writer.
pub fn write_cameras_bin_to<W: Write>(
    writer: &mut W,
    cameras: &[ColmapCamera],
) -> Result<(), ColmapError> {
    writer.write_u64::<LittleEndian>(cameras.len() as u64)?;
    for camera in cameras {
        check_num_params(camera)?;
        writer.write_u32::<LittleEndian>(camera.camera_id)?;
        writer.write_i32::<LittleEndian>(camera.model.model_id())?;
        writer.write_u64::<LittleEndian>(camera.width as u64)?;
        writer.write_u64::<LittleEndian>(camera.height as u64)?;
        for param in &camera.params {
            writer.write_f64::<LittleEndian>(*param)?;
        }
    }
    Ok(())
}

/// Write the images.bin file.
pub fn write_images_bin(path: impl AsRef<Path>, images: &[ColmapImage]) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_images_bin_to(&mut writer, images, |_, _| {})?;
    writer.flush()?;
    Ok(())
}

/// Write images in the binary format to any writer.
///
/// `progress` is called with `(written, total)` after each image.
pub fn write_images_bin_to<W: Write>(
    writer: &mut W,
    images: &[ColmapImage],
    mut progress: impl FnMut(usize, usize),
) -> Result<(), ColmapError> {
    // names are NUL terminated on disk
    if let Some(image) = images.iter().find(|i| i.name.as_bytes().contains(&0)) {
        return Err(ColmapError::InvalidImageName(image.name.clone()));
    }

    writer.write_u64::<LittleEndian>(images.len() as u64)?;
    for (i, image) in images.iter().enumerate() {
        writer.write_u32::<LittleEndian>(image.image_id)?;
        for q in image.rotation {
            writer.write_f64::<LittleEndian>(q)?;
        }
        for t in image.translation {
            writer.write_f64::<LittleEndian>(t)?;
        }
        writer.write_u32::<LittleEndian>(image.camera_id)?;
        writer.write_all(image.name.as_bytes())?;
        writer.write_u8(0)?;

        writer.write_u64::<LittleEndian>(image.points2d.len() as u64)?;
        for (x, y, point3d_id) in &image.points2d {
            writer.write_f64::<LittleEndian>(*x)?;
            writer.write_f64::<LittleEndian>(*y)?;
            let id = u64::try_from(*point3d_id).unwrap_or(INVALID_POINT3D_ID);
            writer.write_u64::<LittleEndian>(id)?;
        }

        progress(i + 1, images.len());
    }
    Ok(())
}

/// Write the points3D.bin file.
pub fn write_points3d_bin(
    path: impl AsRef<Path>,
    points: &[ColmapPoint3d],
) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_points3d_bin_to(&mut writer, points)?;
    writer.flush()?;
    Ok(())
}

/// Write points in the binary format to any writer.
pub fn write_points3d_bin_to<W: Write>(
    writer: &mut W,
    points: &[ColmapPoint3d],
) -> Result<(), ColmapError> {
    writer.write_u64::<LittleEndian>(points.len() as u64)?;
    for point in points {
        writer.write_u64::<LittleEndian>(point.point3d_id)?;
        for v in point.xyz {
            writer.write_f64::<LittleEndian>(v)?;
        }
        writer.write_all(&point.rgb)?;
        writer.write_f64::<LittleEndian>(point.error)?;
        writer.write_u64::<LittleEndian>(point.track.len() as u64)?;
        for (image_id, point2d_idx) in &point.track {
            writer.write_u32::<LittleEndian>(*image_id)?;
            writer.write_u32::<LittleEndian>(*point2d_idx)?;
        }
    }
    Ok(())
}

/// Expected size in bytes of a points3D.bin file.
pub fn points3d_bin_size(points: &[ColmapPoint3d]) -> usize {
    8 + points
        .iter()
        .map(|p| POINT3D_RECORD_BASE_SIZE + TRACK_ELEMENT_SIZE * p.track.len())
        .sum::<usize>()
}

/// Read the cameras.bin file.
pub fn read_cameras_bin(path: impl AsRef<Path>) -> Result<Vec<ColmapCamera>, ColmapError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_cameras = reader.read_u64::<LittleEndian>()?;
    let mut cameras = Vec::with_capacity(reserved_capacity(num_cameras));

    for _ in 0..num_cameras {
        let camera_id = reader.read_u32::<LittleEndian>()?;
        let model_id = reader.read_i32::<LittleEndian>()?;
        let model = CameraModel::from_id(model_id)
            .ok_or_else(|| ColmapError::InvalidCameraModel(model_id.to_string()))?;
        let width = reader.read_u64::<LittleEndian>()? as usize;
        let height = reader.read_u64::<LittleEndian>()? as usize;
        let params = (0..model.num_params())
            .map(|_| reader.read_f64::<LittleEndian>())
            .collect::<Result<Vec<_>, _>>()?;

        cameras.push(ColmapCamera {
            camera_id,
            model,
            width,
            height,
            params,
        });
    }

    Ok(cameras)
}

/// Read the images.bin file.
pub fn read_images_bin(path: impl AsRef<Path>) -> Result<Vec<ColmapImage>, ColmapError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_images = reader.read_u64::<LittleEndian>()?;
    let mut images = Vec::with_capacity(reserved_capacity(num_images));

    for _ in 0..num_images {
        let image_id = reader.read_u32::<LittleEndian>()?;
        let mut rotation = [0.0; 4];
        reader.read_f64_into::<LittleEndian>(&mut rotation)?;
        let mut translation = [0.0; 3];
        reader.read_f64_into::<LittleEndian>(&mut translation)?;
        let camera_id = reader.read_u32::<LittleEndian>()?;

        let mut name_bytes = Vec::new();
        reader.read_until(0, &mut name_bytes)?;
        if name_bytes.pop() != Some(0) {
            return Err(ColmapError::ParseError(
                "Unterminated image name".to_string(),
            ));
        }
        let name = String::from_utf8(name_bytes)
            .map_err(|e| ColmapError::ParseError(format!("Invalid UTF-8 in image name: {e}")))?;

        let num_points2d = reader.read_u64::<LittleEndian>()?;
        let points2d = (0..num_points2d)
            .map(|_| -> Result<(f64, f64, i64), ColmapError> {
                let x = reader.read_f64::<LittleEndian>()?;
                let y = reader.read_f64::<LittleEndian>()?;
                let id = reader.read_u64::<LittleEndian>()?;
                Ok((x, y, i64::try_from(id).unwrap_or(-1)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        images.push(ColmapImage {
            name,
            image_id,
            camera_id,
            rotation,
            translation,
            points2d,
        });
    }

    Ok(images)
}

/// Read the points3D.bin file.
pub fn read_points3d_bin(path: impl AsRef<Path>) -> Result<Vec<ColmapPoint3d>, ColmapError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_points = reader.read_u64::<LittleEndian>()?;
    let mut points = Vec::with_capacity(reserved_capacity(num_points));

    for _ in 0..num_points {
        let point3d_id = reader.read_u64::<LittleEndian>()?;
        let mut xyz = [0.0; 3];
        reader.read_f64_into::<LittleEndian>(&mut xyz)?;
        let mut rgb = [0u8; 3];
        reader.read_exact(&mut rgb)?;
        let error = reader.read_f64::<LittleEndian>()?;
        let track_len = reader.read_u64::<LittleEndian>()?;
        let track = (0..track_len)
            .map(|_| -> Result<(u32, u32), ColmapError> {
                Ok((
                    reader.read_u32::<LittleEndian>()?,
                    reader.read_u32::<LittleEndian>()?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        points.push(ColmapPoint3d {
            point3d_id,
            xyz,
            rgb,
            error,
            track,
        });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_record_layout() -> Result<(), ColmapError> {
        let camera = ColmapCamera {
            camera_id: 7,
            model: CameraModel::SimplePinhole,
            width: 640,
            height: 480,
            params: vec![500.0, 320.0, 240.0],
        };
        let mut buffer = Vec::new();
        write_cameras_bin_to(&mut buffer, &[camera])?;

        assert_eq!(buffer.len(), 8 + 4 + 4 + 8 + 8 + 3 * 8);
        assert_eq!(&buffer[0..8], &1u64.to_le_bytes());
        assert_eq!(&buffer[8..12], &7u32.to_le_bytes());
        assert_eq!(&buffer[12..16], &0i32.to_le_bytes());
        assert_eq!(&buffer[16..24], &640u64.to_le_bytes());
        assert_eq!(&buffer[32..40], &500.0f64.to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_image_record_layout() -> Result<(), ColmapError> {
        let image = ColmapImage {
            name: "a.jpg".to_string(),
            image_id: 1,
            camera_id: 1,
            rotation: [1.0, 0.0, 0.0, 0.0],
            translation: [0.0, 0.0, 0.0],
            points2d: vec![(1.0, 2.0, -1)],
        };
        let mut buffer = Vec::new();
        write_images_bin_to(&mut buffer, &[image], |_, _| {})?;

        let name_start = 8 + 4 + 7 * 8 + 4;
        assert_eq!(&buffer[name_start..name_start + 6], b"a.jpg\0");
        let n_start = name_start + 6;
        assert_eq!(&buffer[n_start..n_start + 8], &1u64.to_le_bytes());
        assert_eq!(&buffer[buffer.len() - 8..], &[0xFF; 8]);
        assert_eq!(buffer.len(), n_start + 8 + 24);
        Ok(())
    }

    #[test]
    fn test_image_name_with_nul_is_rejected() {
        let image = ColmapImage {
            name: "a\0b.jpg".to_string(),
            image_id: 1,
            camera_id: 1,
            rotation: [1.0, 0.0, 0.0, 0.0],
            translation: [0.0, 0.0, 0.0],
            points2d: vec![],
        };
        let mut buffer = Vec::new();
        assert!(matches!(
            write_images_bin_to(&mut buffer, &[image], |_, _| {}),
            Err(ColmapError::InvalidImageName(_))
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_read_bogus_record_counts() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("corrupt.bin");

        // a huge count with no records behind it
        std::fs::write(&path, u64::MAX.to_le_bytes())?;
        assert!(matches!(read_cameras_bin(&path), Err(ColmapError::IoError(_))));
        assert!(matches!(read_images_bin(&path), Err(ColmapError::IoError(_))));
        assert!(matches!(read_points3d_bin(&path), Err(ColmapError::IoError(_))));

        // one valid record, then the file ends
        let point = ColmapPoint3d {
            point3d_id: 1,
            xyz: [0.0; 3],
            rgb: [0; 3],
            error: 0.0,
            track: vec![],
        };
        let mut buffer = Vec::new();
        write_points3d_bin_to(&mut buffer, &[point])?;
        buffer[0..8].copy_from_slice(&(1u64 << 62).to_le_bytes());
        std::fs::write(&path, &buffer)?;
        assert!(matches!(read_points3d_bin(&path), Err(ColmapError::IoError(_))));
        Ok(())
    }

    #[test]
    fn test_points3d_size() -> Result<(), ColmapError> {
        let points = (0..5u64)
            .map(|i| ColmapPoint3d {
                point3d_id: i,
                xyz: [i as f64; 3],
                rgb: [i as u8; 3],
                error: 0.1,
                track: (0..i as u32).map(|j| (j, j)).collect(),
            })
            .collect::<Vec<_>>();
        let mut buffer = Vec::new();
        write_points3d_bin_to(&mut buffer, &points)?;
        assert_eq!(buffer.len(), points3d_bin_size(&points));
        assert_eq!(buffer.len(), 8 + 5 * 51 + 8 * 10);
        Ok(())
    }

    #[test]
    fn test_binary_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;

        let cameras = CameraModel::ALL
            .iter()
            .enumerate()
            .map(|(i, model)| ColmapCamera {
                camera_id: i as u32 + 1,
                model: *model,
                width: 100,
                height: 50,
                params: (0..model.num_params()).map(|p| p as f64 * 0.5).collect(),
            })
            .collect::<Vec<_>>();
        let images = vec![ColmapImage {
            name: "image_00000.jpg".to_string(),
            image_id: 1,
            camera_id: 2,
            rotation: [0.5, -0.5, 0.5, -0.5],
            translation: [1.0, 2.0, 3.0],
            points2d: vec![(1.5, 2.5, -1), (3.0, 4.0, 12)],
        }];
        let points = vec![ColmapPoint3d {
            point3d_id: 12,
            xyz: [0.1, 0.2, 0.3],
            rgb: [9, 8, 7],
            error: 1.25,
            track: vec![(1, 1)],
        }];

        write_cameras_bin(tmp_dir.path().join("cameras.bin"), &cameras)?;
        write_images_bin(tmp_dir.path().join("images.bin"), &images)?;
        write_points3d_bin(tmp_dir.path().join("points3D.bin"), &points)?;

        assert_eq!(read_cameras_bin(tmp_dir.path().join("cameras.bin"))?, cameras);
        assert_eq!(read_images_bin(tmp_dir.path().join("images.bin"))?, images);
        assert_eq!(read_points3d_bin(tmp_dir.path().join("points3D.bin"))?, points);

        Ok(())
    }
}
