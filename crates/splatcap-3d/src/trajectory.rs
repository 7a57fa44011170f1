use std::{f64::consts::PI, fmt};

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::coords::{Pose, Rotator};
use crate::pointcloud::Aabb;

/// Error types for trajectory generation.
#[derive(Debug, thiserror::Error)]
pub enum TrajectoryError {
    /// Ring count or views per ring is zero
    #[error("Trajectory needs at least one ring and one view per ring")]
    EmptyLayout,

    /// Custom trajectory with too few waypoints
    #[error("Custom trajectory needs at least 3 waypoints, got {0}")]
    NotEnoughWaypoints(usize),

    /// The configuration produced no viewpoints
    #[error("Trajectory produced no viewpoints")]
    NoViewpoints,

    /// More viewpoints than 32-bit ids can address
    #[error("Trajectory would produce {0} viewpoints")]
    TooManyViewpoints(usize),
}

/// The camera path layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryType {
    /// Stacked horizontal rings at increasing elevation.
    #[default]
    Orbital,
    /// Fibonacci lattice over the sphere, filtered by elevation.
    Spherical,
    /// One continuous descending spiral of three turns.
    Spiral,
    /// Orbital rings restricted to the upper hemisphere.
    Hemisphere,
    /// Cube-map style captures along a line through the focus point.
    Panoramic,
    /// User supplied waypoints.
    Custom,
}

/// Parameters for camera path generation. Distances are in engine units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Layout algorithm.
    pub trajectory_type: TrajectoryType,
    /// Point the cameras orbit and look at.
    pub focus_point: DVec3,
    /// Orbit radius.
    pub base_radius: f64,
    /// Number of rings.
    pub num_rings: u32,
    /// Views on each ring.
    pub views_per_ring: u32,
    /// Lowest elevation in degrees.
    pub min_elevation: f64,
    /// Highest elevation in degrees.
    pub max_elevation: f64,
    /// Azimuth of the first view in degrees.
    pub start_azimuth: f64,
    /// Modulate the radius from ring to ring.
    pub vary_radius_per_ring: bool,
    /// Relative amplitude of the radius modulation.
    pub radius_variation: f64,
    /// Offset odd rings by half an angular step.
    pub stagger_rings: bool,
    /// Orient cameras towards the focus point.
    pub look_at_focus_point: bool,
    /// Extra pitch in degrees applied to look-at orientations.
    pub pitch_offset: f64,
    /// Waypoints for [`TrajectoryType::Custom`].
    pub custom_waypoints: Vec<Pose>,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            trajectory_type: TrajectoryType::Orbital,
            focus_point: DVec3::ZERO,
            base_radius: 500.0,
            num_rings: 5,
            views_per_ring: 36,
            min_elevation: -30.0,
            max_elevation: 60.0,
            start_azimuth: 0.0,
            vary_radius_per_ring: true,
            radius_variation: 0.15,
            stagger_rings: true,
            look_at_focus_point: true,
            pitch_offset: 0.0,
            custom_waypoints: Vec::new(),
        }
    }
}

impl TrajectoryConfig {
    /// The number of viewpoints the configuration is expected to produce.
    ///
    /// Spherical layouts may produce fewer once filtered by elevation.
    pub fn expected_viewpoint_count(&self) -> usize {
        let rings = self.num_rings as usize;
        let views = self.views_per_ring as usize;
        match self.trajectory_type {
            TrajectoryType::Orbital | TrajectoryType::Spherical | TrajectoryType::Hemisphere => {
                rings.saturating_mul(views)
            }
            TrajectoryType::Spiral => views.saturating_mul(SPIRAL_TURNS),
            TrajectoryType::Panoramic => views.saturating_mul(PANORAMIC_DIRECTIONS.len()),
            TrajectoryType::Custom => self.custom_waypoints.len(),
        }
    }

    /// Elevation span in degrees.
    pub fn elevation_range(&self) -> f64 {
        self.max_elevation - self.min_elevation
    }
}

/// A generated camera placement in engine space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    /// Camera position.
    pub position: DVec3,
    /// Camera-to-world orientation.
    pub rotation: DQuat,
    /// Sequential id starting at 0.
    pub id: u32,
    /// Ring, turn or path position this view belongs to.
    pub ring_index: i32,
    /// Fraction of the way around the ring, in `[0, 1)`.
    pub ring_position: f64,
    /// Orbit radius or distance to the focus point.
    pub distance: f64,
    /// Elevation in degrees.
    pub elevation_deg: f64,
    /// Azimuth in degrees.
    pub azimuth_deg: f64,
}

impl Viewpoint {
    /// The viewpoint as a pose.
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }

    /// Unit view direction in engine space.
    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::X
    }
}

/// A quality warning raised by [`validate_config`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryWarning {
    /// Fewer than 50 viewpoints.
    LowViewpointCount(usize),
    /// More than 500 viewpoints.
    HighViewpointCount(usize),
    /// Radius below 1m.
    SmallRadius(f64),
    /// Radius above 100m.
    LargeRadius(f64),
    /// Elevation range below 30 degrees.
    NarrowElevationRange(f64),
    /// More than 30 degrees between neighbouring views on a ring.
    LargeAngularStep(f64),
    /// Zero rings or zero views per ring.
    EmptyLayout,
    /// Custom trajectory with fewer than 3 waypoints.
    NotEnoughWaypoints(usize),
}

impl fmt::Display for TrajectoryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowViewpointCount(n) => write!(
                f,
                "low viewpoint count ({n}), 100-180 recommended for splat training"
            ),
            Self::HighViewpointCount(n) => write!(
                f,
                "high viewpoint count ({n}) increases capture and training time"
            ),
            Self::SmallRadius(r) => write!(f, "very small radius ({r:.1}) may clip the near plane"),
            Self::LargeRadius(r) => write!(f, "very large radius ({r:.1}) may affect depth precision"),
            Self::NarrowElevationRange(e) => write!(
                f,
                "narrow elevation range ({e:.1} degrees) may leave vertical gaps"
            ),
            Self::LargeAngularStep(s) => write!(
                f,
                "angular step ({s:.1} degrees) may not overlap enough with a 90 degree FOV"
            ),
            Self::EmptyLayout => write!(f, "trajectory has no rings or no views per ring"),
            Self::NotEnoughWaypoints(n) => write!(
                f,
                "custom trajectory requires at least 3 waypoints, got {n}"
            ),
        }
    }
}

/// The outcome of [`validate_config`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectoryReport {
    /// False when the configuration cannot be used.
    pub is_valid: bool,
    /// Quality warnings.
    pub warnings: Vec<TrajectoryWarning>,
}

const SPIRAL_TURNS: usize = 3;

const HEMISPHERE_MAX_ELEVATION: f64 = 85.0;

/// Forward, right, back, left, up, down as (pitch, yaw).
const PANORAMIC_DIRECTIONS: [(f64, f64); 6] = [
    (0.0, 0.0),
    (0.0, 90.0),
    (0.0, 180.0),
    (0.0, 270.0),
    (90.0, 0.0),
    (-90.0, 0.0),
];

/// Convert spherical coordinates around `center` to an engine-space position.
///
/// # Arguments
///
/// * `radius` - Distance from the center.
/// * `elevation_deg` - Angle above the XY plane in degrees.
/// * `azimuth_deg` - Angle from +X towards +Y in degrees.
/// * `center` - The sphere center.
pub fn spherical_to_cartesian(
    radius: f64,
    elevation_deg: f64,
    azimuth_deg: f64,
    center: DVec3,
) -> DVec3 {
    let (se, ce) = elevation_deg.to_radians().sin_cos();
    let (sa, ca) = azimuth_deg.to_radians().sin_cos();
    center + DVec3::new(radius * ce * ca, radius * ce * sa, radius * se)
}

/// Euler angles that point the engine forward axis along `direction`.
pub fn direction_rotator(direction: DVec3) -> Rotator {
    if direction.length_squared() == 0.0 {
        return Rotator::ZERO;
    }
    let yaw = direction.y.atan2(direction.x).to_degrees();
    let pitch = direction
        .z
        .atan2((direction.x * direction.x + direction.y * direction.y).sqrt())
        .to_degrees();
    Rotator::new(pitch, yaw, 0.0)
}

/// Euler angles looking from `from` towards `to`, with `pitch_offset` degrees added.
pub fn look_at_rotation(from: DVec3, to: DVec3, pitch_offset: f64) -> Rotator {
    let mut rotator = direction_rotator((to - from).normalize_or_zero());
    rotator.pitch += pitch_offset;
    rotator
}

fn ring_radius(config: &TrajectoryConfig, ring: u32) -> f64 {
    if !config.vary_radius_per_ring {
        return config.base_radius;
    }
    let variation = (ring as f64 * PI / config.num_rings as f64).sin();
    config.base_radius * (1.0 + config.radius_variation * variation)
}

fn orient(config: &TrajectoryConfig, position: DVec3, fallback: Rotator) -> DQuat {
    if config.look_at_focus_point {
        look_at_rotation(position, config.focus_point, config.pitch_offset).to_quat()
    } else {
        fallback.to_quat()
    }
}

/// Stacked rings evenly spaced in elevation.
pub fn generate_orbital(config: &TrajectoryConfig) -> Vec<Viewpoint> {
    let rings = config.num_rings;
    let views = config.views_per_ring;
    if rings == 0 || views == 0 {
        return Vec::new();
    }

    let elevation_step = if rings > 1 {
        config.elevation_range() / (rings - 1) as f64
    } else {
        0.0
    };
    let angular_step = 360.0 / views as f64;

    let mut viewpoints = Vec::with_capacity(rings as usize * views as usize);

    for ring in 0..rings {
        let elevation = config.min_elevation + elevation_step * ring as f64;
        let radius = ring_radius(config, ring);

        let mut azimuth_offset = config.start_azimuth;
        if config.stagger_rings {
            azimuth_offset += (ring % 2) as f64 * angular_step / 2.0;
        }

        for view in 0..views {
            let azimuth = azimuth_offset + view as f64 * angular_step;
            let position = spherical_to_cartesian(radius, elevation, azimuth, config.focus_point);
            // tangent to the ring when not looking at the focus point
            let rotation = orient(config, position, Rotator::new(-elevation, azimuth + 90.0, 0.0));

            viewpoints.push(Viewpoint {
                position,
                rotation,
                id: viewpoints.len() as u32,
                ring_index: ring as i32,
                ring_position: view as f64 / views as f64,
                distance: radius,
                elevation_deg: elevation,
                azimuth_deg: azimuth,
            });
        }
    }

    viewpoints
}

/// Fibonacci lattice over the sphere, keeping points inside the elevation bounds.
pub fn generate_spherical(config: &TrajectoryConfig) -> Vec<Viewpoint> {
    let total = config.num_rings as usize * config.views_per_ring as usize;
    let golden_ratio = (1.0 + 5f64.sqrt()) / 2.0;

    let mut viewpoints = Vec::with_capacity(total);

    for i in 0..total {
        let y = 1.0 - 2.0 * (i as f64 + 0.5) / total as f64;
        let radius_at_y = (1.0 - y * y).max(0.0).sqrt();
        let theta = 2.0 * PI * i as f64 / golden_ratio;

        let local = DVec3::new(radius_at_y * theta.cos(), radius_at_y * theta.sin(), y)
            * config.base_radius;
        let elevation = y.clamp(-1.0, 1.0).asin().to_degrees();

        if elevation < config.min_elevation || elevation > config.max_elevation {
            continue;
        }

        let position = config.focus_point + local;
        let rotation = orient(config, position, direction_rotator(local));

        viewpoints.push(Viewpoint {
            position,
            rotation,
            id: viewpoints.len() as u32,
            ring_index: 0,
            ring_position: i as f64 / total as f64,
            distance: config.base_radius,
            elevation_deg: elevation,
            azimuth_deg: local.y.atan2(local.x).to_degrees(),
        });
    }

    viewpoints
}

/// A single descending spiral of three full turns.
pub fn generate_spiral(config: &TrajectoryConfig) -> Vec<Viewpoint> {
    let views = config.views_per_ring as usize;
    let total = views * SPIRAL_TURNS;
    let turns = SPIRAL_TURNS as f64;

    (0..total)
        .map(|i| {
            let t = if total > 1 {
                i as f64 / (total - 1) as f64
            } else {
                0.0
            };
            let elevation = config.max_elevation - t * config.elevation_range();
            let azimuth = config.start_azimuth + t * 360.0 * turns;

            let mut radius = config.base_radius;
            if config.vary_radius_per_ring {
                radius *= 1.0 + config.radius_variation * (2.0 * PI * t).sin();
            }

            let position = spherical_to_cartesian(radius, elevation, azimuth, config.focus_point);
            let rotation = orient(config, position, Rotator::new(-elevation, azimuth + 90.0, 0.0));

            Viewpoint {
                position,
                rotation,
                id: i as u32,
                ring_index: (i / views) as i32,
                ring_position: (i % views) as f64 / views as f64,
                distance: radius,
                elevation_deg: elevation,
                azimuth_deg: azimuth % 360.0,
            }
        })
        .collect()
}

/// Orbital rings with the elevation clamped to `[max(0, min), min(85, max)]`.
pub fn generate_hemisphere(config: &TrajectoryConfig) -> Vec<Viewpoint> {
    let hemisphere = TrajectoryConfig {
        min_elevation: config.min_elevation.max(0.0),
        max_elevation: config.max_elevation.min(HEMISPHERE_MAX_ELEVATION),
        ..config.clone()
    };
    generate_orbital(&hemisphere)
}

/// Six axis aligned views at each of `views_per_ring` positions along the X axis.
///
/// The positions span `2 * base_radius` centered on the focus point.
pub fn generate_panoramic(config: &TrajectoryConfig) -> Vec<Viewpoint> {
    let positions = config.views_per_ring as usize;
    let path_length = config.base_radius * 2.0;
    let step = if positions > 1 {
        path_length / (positions - 1) as f64
    } else {
        0.0
    };
    let start = if positions > 1 { -path_length / 2.0 } else { 0.0 };

    let mut viewpoints = Vec::with_capacity(positions * PANORAMIC_DIRECTIONS.len());

    for index in 0..positions {
        let position = config.focus_point + DVec3::new(start + step * index as f64, 0.0, 0.0);
        for (dir, (pitch, yaw)) in PANORAMIC_DIRECTIONS.iter().enumerate() {
            viewpoints.push(Viewpoint {
                position,
                rotation: Rotator::new(*pitch, *yaw, 0.0).to_quat(),
                id: viewpoints.len() as u32,
                ring_index: index as i32,
                ring_position: dir as f64 / PANORAMIC_DIRECTIONS.len() as f64,
                distance: position.distance(config.focus_point),
                elevation_deg: *pitch,
                azimuth_deg: *yaw,
            });
        }
    }

    viewpoints
}

/// One viewpoint per custom waypoint, in order.
pub fn generate_custom(config: &TrajectoryConfig) -> Vec<Viewpoint> {
    config
        .custom_waypoints
        .iter()
        .enumerate()
        .map(|(i, waypoint)| {
            let offset = waypoint.position - config.focus_point;
            let angles = direction_rotator(offset);
            Viewpoint {
                position: waypoint.position,
                rotation: waypoint.rotation.normalize(),
                id: i as u32,
                ring_index: 0,
                ring_position: 0.0,
                distance: offset.length(),
                elevation_deg: angles.pitch,
                azimuth_deg: angles.yaw,
            }
        })
        .collect()
}

/// Generate the viewpoints for a configuration.
///
/// Degenerate layouts yield an empty list; use [`try_generate_viewpoints`] to
/// reject them.
pub fn generate_viewpoints(config: &TrajectoryConfig) -> Vec<Viewpoint> {
    let viewpoints = match config.trajectory_type {
        TrajectoryType::Orbital => generate_orbital(config),
        TrajectoryType::Spherical => generate_spherical(config),
        TrajectoryType::Spiral => generate_spiral(config),
        TrajectoryType::Hemisphere => generate_hemisphere(config),
        TrajectoryType::Panoramic => generate_panoramic(config),
        TrajectoryType::Custom => generate_custom(config),
    };
    log::debug!(
        "generated {} viewpoints for {:?} trajectory",
        viewpoints.len(),
        config.trajectory_type
    );
    viewpoints
}

/// Generate viewpoints, failing on configurations that cannot be captured.
pub fn try_generate_viewpoints(config: &TrajectoryConfig) -> Result<Vec<Viewpoint>, TrajectoryError> {
    if config.trajectory_type == TrajectoryType::Custom {
        if config.custom_waypoints.len() < 3 {
            return Err(TrajectoryError::NotEnoughWaypoints(
                config.custom_waypoints.len(),
            ));
        }
    } else if config.num_rings == 0 || config.views_per_ring == 0 {
        return Err(TrajectoryError::EmptyLayout);
    }

    let expected = config.expected_viewpoint_count();
    if expected > u32::MAX as usize {
        return Err(TrajectoryError::TooManyViewpoints(expected));
    }

    let viewpoints = generate_viewpoints(config);
    if viewpoints.is_empty() {
        return Err(TrajectoryError::NoViewpoints);
    }
    Ok(viewpoints)
}

/// The generated path as poses, for previews.
pub fn preview_trajectory(config: &TrajectoryConfig) -> Vec<Pose> {
    generate_viewpoints(config)
        .iter()
        .map(Viewpoint::pose)
        .collect()
}

/// Derive an orbital configuration that frames `bounds`.
///
/// # Arguments
///
/// * `bounds` - The region to capture, in engine units.
/// * `overlap` - Desired overlap between neighbouring views in `[0, 1)`.
/// * `h_fov` - Horizontal field of view in degrees.
pub fn calculate_optimal_config(bounds: &Aabb, overlap: f64, h_fov: f64) -> TrajectoryConfig {
    let mut config = TrajectoryConfig {
        trajectory_type: TrajectoryType::Orbital,
        focus_point: bounds.center(),
        ..Default::default()
    };

    let max_extent = bounds.half_extents().max_element();
    let min_distance = max_extent / (h_fov.to_radians() / 2.0).tan();
    config.base_radius = min_distance * 1.3;

    let angular_step = h_fov * (1.0 - overlap);
    config.views_per_ring = ((360.0 / angular_step).ceil() as u32).clamp(12, 72);

    // 16:9 frames
    let v_fov = h_fov / (16.0 / 9.0);
    let vertical_step = v_fov * (1.0 - overlap);
    config.num_rings = ((config.elevation_range() / vertical_step).ceil() as u32).clamp(3, 8);

    config.stagger_rings = true;
    config.vary_radius_per_ring = true;
    config.look_at_focus_point = true;

    config
}

/// [`calculate_optimal_config`] with 70% overlap and a 90 degree field of view.
pub fn calculate_optimal_config_default(bounds: &Aabb) -> TrajectoryConfig {
    calculate_optimal_config(bounds, 0.7, 90.0)
}

/// Check a configuration against the ranges that give good reconstructions.
pub fn validate_config(config: &TrajectoryConfig) -> TrajectoryReport {
    let mut warnings = Vec::new();
    let mut is_valid = true;

    let total = config.expected_viewpoint_count();
    if total < 50 {
        warnings.push(TrajectoryWarning::LowViewpointCount(total));
    } else if total > 500 {
        warnings.push(TrajectoryWarning::HighViewpointCount(total));
    }

    if config.base_radius < 100.0 {
        warnings.push(TrajectoryWarning::SmallRadius(config.base_radius));
    } else if config.base_radius > 10000.0 {
        warnings.push(TrajectoryWarning::LargeRadius(config.base_radius));
    }

    if config.elevation_range() < 30.0 {
        warnings.push(TrajectoryWarning::NarrowElevationRange(
            config.elevation_range(),
        ));
    }

    if config.views_per_ring > 0 {
        let angular_step = 360.0 / config.views_per_ring as f64;
        if angular_step > 30.0 {
            warnings.push(TrajectoryWarning::LargeAngularStep(angular_step));
        }
    }

    if config.trajectory_type == TrajectoryType::Custom {
        if config.custom_waypoints.len() < 3 {
            warnings.push(TrajectoryWarning::NotEnoughWaypoints(
                config.custom_waypoints.len(),
            ));
            is_valid = false;
        }
    } else if config.num_rings == 0 || config.views_per_ring == 0 {
        warnings.push(TrajectoryWarning::EmptyLayout);
        is_valid = false;
    }

    for warning in &warnings {
        log::warn!("{warning}");
    }

    TrajectoryReport { is_valid, warnings }
}

/// Mean overlap between consecutive views, wrapping around at the end.
///
/// Returns 0 for fewer than two viewpoints.
pub fn calculate_average_overlap(viewpoints: &[Viewpoint], h_fov: f64) -> f64 {
    if viewpoints.len() < 2 {
        return 0.0;
    }

    let total: f64 = viewpoints
        .iter()
        .zip(viewpoints.iter().cycle().skip(1))
        .map(|(a, b)| {
            let cos = a.forward().dot(b.forward()).clamp(-1.0, 1.0);
            let angle = cos.acos().to_degrees();
            (1.0 - angle / h_fov).clamp(0.0, 1.0)
        })
        .sum();

    total / viewpoints.len() as f64
}
