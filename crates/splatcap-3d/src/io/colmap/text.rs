use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use super::{ColmapCamera, ColmapError, ColmapImage, ColmapPoint3d};
use crate::camera::CameraModel;

/// Read the cameras.txt file and return a vector of ColmapCamera structs.
///
/// # Arguments
///
/// * `path` - The path to the cameras.txt file.
///
/// # Returns
///
/// A vector of ColmapCamera structs.
pub fn read_cameras_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapCamera>, ColmapError> {
    // open the file and create a buffered reader
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    // skip the first 3 lines containing the header and parse the rest
    let cameras = reader
        .lines()
        .skip(3)
        .map(|line| -> Result<ColmapCamera, ColmapError> {
            let line = line.map_err(ColmapError::from)?;
            parse_camera_line(&line)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cameras)
}

/// Read the points3D.txt file and return a vector of ColmapPoint3d structs.
///
/// # Arguments
///
/// * `path` - The path to the points3D.txt file.
///
/// # Returns
///
/// A vector of ColmapPoint3d structs.
pub fn read_points3d_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapPoint3d>, ColmapError> {
    // open the file and create a buffered reader
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    // skip the first 3 lines containing the header and parse the rest
    let points = reader
        .lines()
        .skip(3)
        .map(|line| -> Result<ColmapPoint3d, ColmapError> {
            let line = line.map_err(ColmapError::from)?;
            parse_point3d_line(&line)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(points)
}

/// Read the images.txt file and return a vector of ColmapImage structs.
///
/// # Arguments
///
/// * `path` - The path to the images.txt file.
///
/// # Returns
///
/// A vector of ColmapImage structs.
pub fn read_images_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapImage>, ColmapError> {
    // open the file and create a buffered reader
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let images = reader
        .lines()
        .skip(4)
        .collect::<Result<Vec<_>, _>>()?
        .chunks(2)
        .map(|chunk| match chunk {
            [line1, line2] => parse_image_line(line1, line2),
            [line1] => parse_image_line(line1, ""),
            _ => Err(ColmapError::ParseError(
                "Invalid number of lines".to_string(),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(images)
}

/// Write the cameras.txt file.
///
/// # Arguments
///
/// * `path` - The path to the cameras.txt file.
/// * `cameras` - The cameras to write.
pub fn write_cameras_txt(
    path: impl AsRef<Path>,
    cameras: &[ColmapCamera],
) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_cameras_txt_to(&mut writer, cameras)?;
    writer.flush()?;
    Ok(())
}

/// Write cameras in the text format to any writer.
pub fn write_cameras_txt_to<W: Write>(
    writer: &mut W,
    cameras: &[ColmapCamera],
) -> Result<(), ColmapError> {
    writeln!(writer, "# Camera list with one line of data per camera:")?;
    writeln!(writer, "#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]")?;
    writeln!(writer, "# Number of cameras: {}", cameras.len())?;

    for camera in cameras {
        check_num_params(camera)?;
        let params = camera
            .params
            .iter()
            .map(|p| format!("{p:.10}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(
            writer,
            "{} {} {} {} {}",
            camera.camera_id,
            camera.model.name(),
            camera.width,
            camera.height,
            params
        )?;
    }

    Ok(())
}

/// Write the images.txt file.
///
/// Every image takes two lines, the second holding its keypoints, which may be empty.
pub fn write_images_txt(path: impl AsRef<Path>, images: &[ColmapImage]) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_images_txt_to(&mut writer, images, |_, _| {})?;
    writer.flush()?;
    Ok(())
}

/// Write images in the text format to any writer.
///
/// `progress` is called with `(written, total)` after each image.
pub fn write_images_txt_to<W: Write>(
    writer: &mut W,
    images: &[ColmapImage],
    mut progress: impl FnMut(usize, usize),
) -> Result<(), ColmapError> {
    writeln!(writer, "# Image list with two lines of data per image:")?;
    writeln!(
        writer,
        "#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME"
    )?;
    writeln!(writer, "#   POINTS2D[] as (X, Y, POINT3D_ID)")?;
    writeln!(writer, "# Number of images: {}", images.len())?;

    for (i, image) in images.iter().enumerate() {
        let [qw, qx, qy, qz] = image.rotation;
        let [tx, ty, tz] = image.translation;
        writeln!(
            writer,
            "{} {qw:.10} {qx:.10} {qy:.10} {qz:.10} {tx:.10} {ty:.10} {tz:.10} {} {}",
            image.image_id, image.camera_id, image.name
        )?;

        let keypoints = image
            .points2d
            .iter()
            .map(|(x, y, id)| format!("{x:.2} {y:.2} {id}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{keypoints}")?;

        progress(i + 1, images.len());
    }

    Ok(())
}

/// Write the points3D.txt file.
pub fn write_points3d_txt(
    path: impl AsRef<Path>,
    points: &[ColmapPoint3d],
) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_points3d_txt_to(&mut writer, points)?;
    writer.flush()?;
    Ok(())
}

/// Write points in the text format to any writer.
pub fn write_points3d_txt_to<W: Write>(
    writer: &mut W,
    points: &[ColmapPoint3d],
) -> Result<(), ColmapError> {
    writeln!(writer, "# 3D point list with one line of data per point:")?;
    writeln!(
        writer,
        "#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)"
    )?;
    writeln!(writer, "# Number of points: {}", points.len())?;

    for point in points {
        let [x, y, z] = point.xyz;
        let [r, g, b] = point.rgb;
        write!(
            writer,
            "{} {x:.10} {y:.10} {z:.10} {r} {g} {b} {:.6}",
            point.point3d_id, point.error
        )?;
        for (image_id, point2d_idx) in &point.track {
            write!(writer, " {image_id} {point2d_idx}")?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

pub(crate) fn check_num_params(camera: &ColmapCamera) -> Result<(), ColmapError> {
    if camera.params.len() != camera.model.num_params() {
        return Err(ColmapError::InvalidNumCameraParams(camera.params.len()));
    }
    Ok(())
}

/// Utility functions for parsing COLMAP text files
fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, ColmapError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| ColmapError::ParseError(format!("{}: {}", s, e)))
}

fn parse_array<T: std::str::FromStr, const N: usize>(parts: &[&str]) -> Result<[T; N], ColmapError>
where
    T::Err: std::fmt::Display,
{
    parts
        .iter()
        .map(|s| parse_part(s))
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| ColmapError::ParseError(format!("Expected {N} values")))
}

/// Parse a camera line and return a ColmapCamera struct.
/// NOTE: The number of parameters depends on the camera model.
///       CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[0], PARAMS[1], ...
fn parse_camera_line(line: &str) -> Result<ColmapCamera, ColmapError> {
    // split the line into parts by whitespace
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 5 {
        return Err(ColmapError::ParseError(format!(
            "Invalid number of parts: {}",
            parts.len()
        )));
    }

    let camera = ColmapCamera {
        camera_id: parse_part(parts[0])?,
        model: parts[1]
            .parse::<CameraModel>()
            .map_err(|e| ColmapError::InvalidCameraModel(e.0))?,
        width: parse_part(parts[2])?,
        height: parse_part(parts[3])?,
        params: parts[4..]
            .iter()
            .map(|s| parse_part(s))
            .collect::<Result<Vec<_>, _>>()?,
    };
    check_num_params(&camera)?;

    Ok(camera)
}

/// Parse a point3d line and return a ColmapPoint3d struct.
///       POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[0], TRACK[1], ...
fn parse_point3d_line(line: &str) -> Result<ColmapPoint3d, ColmapError> {
    // split the line into parts by whitespace
    let parts = line.split_whitespace().collect::<Vec<_>>();

    // check if the number of parts is correct
    if parts.len() < 8 {
        return Err(ColmapError::ParseError(format!(
            "Invalid number of parts: {}",
            parts.len()
        )));
    }

    Ok(ColmapPoint3d {
        point3d_id: parse_part(parts[0])?,
        xyz: parse_array(&parts[1..4])?,
        rgb: parse_array(&parts[4..7])?,
        error: parse_part(parts[7])?,
        track: parts[8..]
            .chunks_exact(2)
            .map(|chunk| -> Result<(u32, u32), ColmapError> {
                Ok((parse_part(chunk[0])?, parse_part(chunk[1])?))
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}

/// Parse an image line and return a ColmapImage struct.
/// #   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
/// #   POINTS2D[] as (X, Y, POINT3D_ID)
fn parse_image_line(line1: &str, line2: &str) -> Result<ColmapImage, ColmapError> {
    // split the line into parts by whitespace
    let parts1 = line1.split_whitespace().collect::<Vec<_>>();
    let parts2 = line2.split_whitespace().collect::<Vec<_>>();

    if parts1.len() < 10 {
        return Err(ColmapError::ParseError(format!(
            "Invalid number of parts: {}",
            parts1.len()
        )));
    }

    Ok(ColmapImage {
        image_id: parse_part(parts1[0])?,
        rotation: parse_array(&parts1[1..5])?,
        translation: parse_array(&parts1[5..8])?,
        camera_id: parse_part(parts1[8])?,
        name: parts1[9..].join(" "),
        points2d: parts2
            .chunks_exact(3)
            .map(|chunk| -> Result<(f64, f64, i64), ColmapError> {
                Ok((
                    parse_part(chunk[0])?,
                    parse_part(chunk[1])?,
                    parse_part(chunk[2])?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}
