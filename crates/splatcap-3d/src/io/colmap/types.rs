use glam::DVec3;
use rayon::prelude::*;

use crate::camera::{CameraIntrinsics, CameraModel};
use crate::coords::{self, Pose};
use crate::pointcloud::PointCloudPoint;
use crate::trajectory::Viewpoint;

/// Default number of digits in generated image names.
pub const IMAGE_INDEX_DIGITS: usize = 5;

/// Default prefix of generated image names.
pub const IMAGE_PREFIX: &str = "image_";

/// Default extension of generated image names.
pub const IMAGE_EXTENSION: &str = ".jpg";

/// Represents a camera in the Colmap system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapCamera {
    /// Camera id
    pub camera_id: u32,
    /// Camera model
    pub model: CameraModel,
    /// Image width
    pub width: usize,
    /// Image height
    pub height: usize,
    /// Camera parameters
    pub params: Vec<f64>,
}

/// Represents an image in the Colmap system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapImage {
    /// Image name
    pub name: String,
    /// Image id
    pub image_id: u32,
    /// Camera id
    pub camera_id: u32,
    /// Rotation
    pub rotation: [f64; 4], // qw, qx, qy, qz
    /// Translation
    pub translation: [f64; 3], // x, y, z
    /// Points2d, a negative point id marks an unmatched keypoint
    pub points2d: Vec<(f64, f64, i64)>,
}

/// Represents a 3D point in the Colmap system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapPoint3d {
    /// Point3d id
    pub point3d_id: u64,
    /// x, y, z coordinates
    pub xyz: [f64; 3],
    /// rgb color
    pub rgb: [u8; 3],
    /// Error
    pub error: f64,
    /// Track
    pub track: Vec<(u32, u32)>,
}

/// On-disk encoding of a sparse model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColmapFormat {
    /// `.txt` files
    #[default]
    Text,
    /// `.bin` files
    Binary,
}

impl ColmapFormat {
    /// File extension including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ColmapFormat::Text => ".txt",
            ColmapFormat::Binary => ".bin",
        }
    }
}

/// Build the camera record for a set of intrinsics.
pub fn create_camera(intrinsics: &CameraIntrinsics, camera_id: u32) -> ColmapCamera {
    ColmapCamera {
        camera_id,
        model: intrinsics.model,
        width: intrinsics.width as usize,
        height: intrinsics.height as usize,
        params: intrinsics.params(),
    }
}

/// Zero pad an index, e.g. `format_image_index(7, 5) == "00007"`.
pub fn format_image_index(index: usize, digits: usize) -> String {
    format!("{index:0digits$}")
}

/// Build an image record from an engine-space camera pose.
///
/// # Arguments
///
/// * `image_id` - The image id, COLMAP ids start at 1.
/// * `camera_id` - The camera the image was taken with.
/// * `name` - The file name relative to the images directory.
/// * `pose` - The camera-to-world pose in engine space.
pub fn image_from_pose(image_id: u32, camera_id: u32, name: String, pose: &Pose) -> ColmapImage {
    let extrinsics = coords::world_to_camera(pose);
    ColmapImage {
        name,
        image_id,
        camera_id,
        rotation: extrinsics.rotation_wxyz(),
        translation: extrinsics.translation_array(),
        points2d: Vec::new(),
    }
}

/// Build one image record per viewpoint.
///
/// Ids start at 1 and follow the viewpoint order, names are
/// `prefix + zero padded index + extension` with a 0-based index. All images
/// share camera 1.
pub fn create_images_from_viewpoints(
    viewpoints: &[Viewpoint],
    prefix: &str,
    extension: &str,
) -> Vec<ColmapImage> {
    viewpoints
        .par_iter()
        .enumerate()
        .map(|(index, viewpoint)| {
            let name = format!(
                "{prefix}{}{extension}",
                format_image_index(index, IMAGE_INDEX_DIGITS)
            );
            image_from_pose(index as u32 + 1, 1, name, &viewpoint.pose())
        })
        .collect()
}

/// Points for a camera path preview, in target space.
///
/// Each camera becomes a green point whose normal is the view direction and
/// the focus point is appended in red.
pub fn camera_path_pointcloud(viewpoints: &[Viewpoint], focus_point: DVec3) -> Vec<PointCloudPoint> {
    let to_f32 = |v: DVec3| [v.x as f32, v.y as f32, v.z as f32];

    viewpoints
        .iter()
        .map(|vp| {
            PointCloudPoint::new(
                to_f32(coords::position_to_target(vp.position)),
                to_f32(coords::direction_to_target(vp.forward())),
                [0, 255, 0],
            )
        })
        .chain(std::iter::once(PointCloudPoint::new(
            to_f32(coords::position_to_target(focus_point)),
            [0.0, -1.0, 0.0],
            [255, 0, 0],
        )))
        .collect()
}
