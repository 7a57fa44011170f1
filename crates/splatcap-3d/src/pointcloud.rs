use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::coords;

/// Zeroth order spherical harmonic basis constant.
pub const SH_C0: f64 = 0.28209479177387814;

/// Number of higher order spherical harmonic coefficients (degree 3, three channels).
pub const SH_REST_COUNT: usize = 45;

/// Default log-space scale for splats seeded from a point cloud.
pub const DEFAULT_INITIAL_SCALE: f32 = -5.0;

/// Convert an 8-bit color channel to its SH DC coefficient.
pub fn color_to_sh_dc(color: u8) -> f32 {
    ((color as f64 / 255.0 - 0.5) / SH_C0) as f32
}

/// Convert an SH DC coefficient back to an 8-bit color channel.
///
/// Values are clamped to `[0, 255]` and rounded.
pub fn sh_dc_to_color(sh: f32) -> u8 {
    ((sh as f64 * SH_C0 + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8
}

/// An axis aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Aabb {
    /// Create a box from two corners.
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Create a box from its center and half extents.
    pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// The box center.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Half of the box size along each axis.
    pub fn half_extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }
}

/// A single point with normal and color, as written to a point cloud PLY.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointCloudPoint {
    /// Position.
    pub position: [f32; 3],
    /// Unit normal.
    pub normal: [f32; 3],
    /// RGB color.
    pub color: [u8; 3],
}

impl Default for PointCloudPoint {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
            color: [255, 255, 255],
        }
    }
}

impl PointCloudPoint {
    /// Create a new point.
    pub fn new(position: [f32; 3], normal: [f32; 3], color: [u8; 3]) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }
}

/// A 3D Gaussian splat in the layout used by splat trainers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianSplat {
    /// Center.
    pub position: [f32; 3],
    /// Normal, unused by most trainers but part of the file layout.
    pub normal: [f32; 3],
    /// SH DC coefficients per color channel.
    pub sh_dc: [f32; 3],
    /// Higher order SH coefficients.
    pub sh_rest: [f32; SH_REST_COUNT],
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Log-space scale per axis.
    pub scale: [f32; 3],
    /// Orientation as `[x, y, z, w]`.
    pub rotation: [f32; 4],
    /// Display color.
    pub color: [u8; 3],
}

impl Default for GaussianSplat {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
            sh_dc: [0.5; 3],
            sh_rest: [0.0; SH_REST_COUNT],
            opacity: 1.0,
            scale: [DEFAULT_INITIAL_SCALE; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            color: [255, 255, 255],
        }
    }
}

impl GaussianSplat {
    /// Create a splat at `position` whose DC term encodes `color`.
    pub fn from_position_color(position: [f32; 3], color: [u8; 3]) -> Self {
        Self {
            position,
            sh_dc: color.map(color_to_sh_dc),
            color,
            ..Default::default()
        }
    }

    /// Like [`GaussianSplat::from_position_color`] with a normal, normalized on the way in.
    pub fn from_position_color_normal(position: [f32; 3], color: [u8; 3], normal: [f32; 3]) -> Self {
        let n = DVec3::new(normal[0] as f64, normal[1] as f64, normal[2] as f64).normalize_or_zero();
        Self {
            normal: [n.x as f32, n.y as f32, n.z as f32],
            ..Self::from_position_color(position, color)
        }
    }

    /// Color recovered from the SH DC coefficients.
    pub fn dc_color(&self) -> [u8; 3] {
        self.sh_dc.map(sh_dc_to_color)
    }

    /// Euclidean norm of the rotation quaternion.
    pub fn rotation_norm(&self) -> f32 {
        self.rotation.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Orientation as a double precision quaternion.
    pub fn quat(&self) -> DQuat {
        let [x, y, z, w] = self.rotation;
        DQuat::from_xyzw(x as f64, y as f64, z as f64, w as f64)
    }
}

/// Convert engine-space mesh vertices into target-space points.
///
/// Normals and colors are used only when their length matches the vertices.
///
/// # Arguments
///
/// * `vertices` - The vertex positions in engine space.
/// * `normals` - Optional per-vertex normals in engine space.
/// * `colors` - Optional per-vertex colors.
///
/// # Returns
///
/// The points in target space.
pub fn points_from_mesh(
    vertices: &[DVec3],
    normals: &[DVec3],
    colors: &[[u8; 3]],
) -> Vec<PointCloudPoint> {
    let use_normals = normals.len() == vertices.len();
    let use_colors = colors.len() == vertices.len();

    vertices
        .iter()
        .enumerate()
        .map(|(i, vertex)| {
            let p = coords::position_to_target(*vertex);
            let mut point = PointCloudPoint {
                position: [p.x as f32, p.y as f32, p.z as f32],
                ..Default::default()
            };
            if use_normals {
                let n = coords::direction_to_target(normals[i]);
                point.normal = [n.x as f32, n.y as f32, n.z as f32];
            }
            if use_colors {
                point.color = colors[i];
            }
            point
        })
        .collect()
}

/// Seed one splat per point with identity rotation, full opacity and a uniform log scale.
pub fn splats_from_point_cloud(points: &[PointCloudPoint], initial_scale: f32) -> Vec<GaussianSplat> {
    points
        .iter()
        .map(|p| GaussianSplat {
            scale: [initial_scale; 3],
            ..GaussianSplat::from_position_color_normal(p.position, p.color, p.normal)
        })
        .collect()
}

/// A point cloud with points, colors, and normals.
#[derive(Debug, Clone)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and normals (optional).
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Self {
        Self {
            points,
            colors,
            normals,
        }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &Vec<[f64; 3]> {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&Vec<[u8; 3]>> {
        self.colors.as_ref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&Vec<[f64; 3]>> {
        self.normals.as_ref()
    }

    /// The bounding box of the points, or `None` when empty.
    pub fn bounds(&self) -> Option<Aabb> {
        let first = DVec3::from_array(*self.points.first()?);
        let (min, max) = self
            .points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Aabb { min, max })
    }

    /// Flatten into writable points. Missing colors default to white and
    /// missing normals to +Z.
    pub fn to_points(&self) -> Vec<PointCloudPoint> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut point = PointCloudPoint {
                    position: p.map(|v| v as f32),
                    ..Default::default()
                };
                if let Some(color) = self.colors.as_ref().and_then(|c| c.get(i)) {
                    point.color = *color;
                }
                if let Some(normal) = self.normals.as_ref().and_then(|n| n.get(i)) {
                    point.normal = normal.map(|v| v as f32);
                }
                point
            })
            .collect()
    }
}

impl From<&[PointCloudPoint]> for PointCloud {
    fn from(points: &[PointCloudPoint]) -> Self {
        Self::new(
            points.iter().map(|p| p.position.map(|v| v as f64)).collect(),
            Some(points.iter().map(|p| p.color).collect()),
            Some(points.iter().map(|p| p.normal.map(|v| v as f64)).collect()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pointcloud() {
        let pointcloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            Some(vec![[255, 0, 0], [0, 255, 0]]),
            Some(vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
        );

        assert_eq!(pointcloud.len(), 2);
        assert_eq!(pointcloud.points().len(), 2);

        if let Some(colors) = pointcloud.colors() {
            assert_eq!(colors.len(), 2);
        }
        if let Some(normals) = pointcloud.normals() {
            assert_eq!(normals.len(), 2);
        }

        let points = pointcloud.to_points();
        assert_eq!(points[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(points[1].color, [0, 255, 0]);
        assert_eq!(points[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bounds() {
        let pointcloud = PointCloud::new(
            vec![[-1.0, 2.0, 0.5], [3.0, -4.0, 1.0], [0.0, 0.0, -2.0]],
            None,
            None,
        );
        let bounds = pointcloud.bounds().unwrap();
        assert_eq!(bounds.min, DVec3::new(-1.0, -4.0, -2.0));
        assert_eq!(bounds.max, DVec3::new(3.0, 2.0, 1.0));
        assert_eq!(bounds.center(), DVec3::new(1.0, -1.0, -0.5));

        assert!(PointCloud::new(vec![], None, None).bounds().is_none());
    }

    #[test]
    fn test_sh_color_round_trip() {
        for c in 0..=255u8 {
            let back = sh_dc_to_color(color_to_sh_dc(c));
            assert!((back as i32 - c as i32).abs() <= 1, "{c} -> {back}");
        }
        assert_eq!(sh_dc_to_color(100.0), 255);
        assert_eq!(sh_dc_to_color(-100.0), 0);
    }

    #[test]
    fn test_splat_defaults() {
        let splat = GaussianSplat::default();
        assert_eq!(splat.opacity, 1.0);
        assert_eq!(splat.scale, [-5.0; 3]);
        assert_eq!(splat.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(splat.sh_rest, [0.0; SH_REST_COUNT]);
        assert_relative_eq!(splat.rotation_norm(), 1.0);
    }

    #[test]
    fn test_splat_from_position_color_normal() {
        let splat = GaussianSplat::from_position_color_normal([1.0, 2.0, 3.0], [10, 128, 250], [0.0, 3.0, 4.0]);
        assert_eq!(splat.dc_color(), [10, 128, 250]);
        assert_relative_eq!(splat.normal[1], 0.6);
        assert_relative_eq!(splat.normal[2], 0.8);
    }

    #[test]
    fn test_points_from_mesh() {
        let vertices = [DVec3::new(100.0, 0.0, 0.0), DVec3::new(0.0, 0.0, 200.0)];
        let normals = [DVec3::Z, DVec3::X];
        let points = points_from_mesh(&vertices, &normals, &[]);
        assert_eq!(points.len(), 2);
        assert_relative_eq!(points[0].position[2], 1.0);
        assert_relative_eq!(points[1].position[1], -2.0);
        assert_relative_eq!(points[0].normal[1], -1.0);
        assert_relative_eq!(points[1].normal[2], 1.0);
        assert_eq!(points[0].color, [255, 255, 255]);
    }

    #[test]
    fn test_splats_from_point_cloud() {
        let points = [PointCloudPoint::new([0.0; 3], [0.0, 0.0, 1.0], [255, 0, 0])];
        let splats = splats_from_point_cloud(&points, DEFAULT_INITIAL_SCALE);
        assert_eq!(splats.len(), 1);
        assert_eq!(splats[0].scale, [-5.0; 3]);
        assert_eq!(splats[0].opacity, 1.0);
        assert_eq!(splats[0].dc_color(), [255, 0, 0]);
    }
}
