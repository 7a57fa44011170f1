use serde::{Deserialize, Serialize};

use crate::{error::DepthError, export::DepthFormat};

/// Smallest device depth used as a divisor.
pub const DEPTH_EPSILON: f32 = 1e-6;

/// Engine units (centimeters) to meters.
pub const CM_TO_METERS: f32 = 0.01;

/// Values at or below this are left untouched by inversion.
const INVERSION_THRESHOLD: f32 = 1e-4;

/// Convert a reversed-Z device depth into linear distance.
///
/// The device depth is 1 at the near plane and 0 at the far plane.
///
/// # Arguments
///
/// * `z` - The device depth.
/// * `near` - The near clip plane, in engine units.
/// * `far` - The far clip plane, in engine units.
/// * `infinite_far` - Treat the far plane as infinitely far away.
///
/// # Returns
///
/// The distance clamped to `[near, far]`.
pub fn scene_depth_to_linear(z: f32, near: f32, far: f32, infinite_far: bool) -> f32 {
    if z >= 1.0 {
        return near;
    }
    if z <= 0.0 {
        return far;
    }

    let linear = if infinite_far {
        near / z.max(DEPTH_EPSILON)
    } else {
        (far * near) / (far - z * (far - near)).max(DEPTH_EPSILON)
    };

    linear.clamp(near, far)
}

/// How a captured depth buffer is linearized and exported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthExportConfig {
    /// File format.
    pub format: DepthFormat,
    /// Near clip plane in engine units.
    pub near_plane: f32,
    /// Far clip plane in engine units.
    pub far_plane: f32,
    /// The projection uses an infinite far plane.
    pub infinite_far: bool,
    /// Convert to meters.
    pub export_in_meters: bool,
    /// Redistribute values within `[min, max]` with `gamma`.
    pub apply_gamma: bool,
    /// Gamma exponent.
    pub gamma: f32,
    /// Store `1 / depth`.
    pub invert_depth: bool,
}

impl Default for DepthExportConfig {
    fn default() -> Self {
        Self {
            format: DepthFormat::default(),
            near_plane: 10.0,
            far_plane: 100_000.0,
            infinite_far: true,
            export_in_meters: true,
            apply_gamma: false,
            gamma: 2.2,
            invert_depth: false,
        }
    }
}

/// A linearized depth map, row major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// One value per pixel.
    pub data: Vec<f32>,
    /// Smallest value in `data`.
    pub min_depth: f32,
    /// Largest value in `data`.
    pub max_depth: f32,
    /// Near plane in the units of `data`, before inversion.
    pub near_plane: f32,
    /// Far plane in the units of `data`, before inversion.
    pub far_plane: f32,
    /// Values are in meters, otherwise centimeters.
    pub in_meters: bool,
    /// Values hold inverse depth.
    pub inverted: bool,
}

impl DepthMap {
    /// Dimensions are positive and match the data.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.width.checked_mul(self.height) == Some(self.data.len())
    }

    /// Value at pixel `(x, y)`, or -1 when out of bounds.
    pub fn depth_at(&self, x: usize, y: usize) -> f32 {
        if x < self.width && y < self.height {
            self.data.get(y * self.width + x).copied().unwrap_or(-1.0)
        } else {
            -1.0
        }
    }

    /// Value range mapped onto the full 16-bit range by PNG export.
    pub fn encoding_window(&self) -> (f32, f32) {
        if self.inverted {
            (1.0 / self.far_plane, 1.0 / self.near_plane)
        } else {
            (self.near_plane, self.far_plane)
        }
    }

    /// Unit name written to metadata.
    pub fn units(&self) -> &'static str {
        match (self.in_meters, self.inverted) {
            (true, false) => "meters",
            (false, false) => "centimeters",
            (true, true) => "inverse_meters",
            (false, true) => "inverse_centimeters",
        }
    }

    fn update_range(&mut self) {
        let (min, max) = self
            .data
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &d| (lo.min(d), hi.max(d)));
        self.min_depth = min;
        self.max_depth = max;
    }
}

/// Linearize a captured reversed-Z depth buffer.
///
/// # Arguments
///
/// * `buffer` - Device depth values, row major.
/// * `width` - Width in pixels.
/// * `height` - Height in pixels.
/// * `config` - Clip planes and post processing.
///
/// # Returns
///
/// The depth map in meters or engine units, as configured.
pub fn linearize_depth(
    buffer: &[f32],
    width: usize,
    height: usize,
    config: &DepthExportConfig,
) -> Result<DepthMap, DepthError> {
    if width == 0 || height == 0 || width.checked_mul(height) != Some(buffer.len()) {
        return Err(DepthError::InvalidDimensions {
            width,
            height,
            len: buffer.len(),
        });
    }

    let (near, far) = (config.near_plane, config.far_plane);
    if !(near > 0.0 && far > near) {
        return Err(DepthError::InvalidClipPlanes { near, far });
    }

    let mut depth = DepthMap {
        width,
        height,
        data: buffer
            .iter()
            .map(|&z| scene_depth_to_linear(z, near, far, config.infinite_far))
            .collect(),
        min_depth: 0.0,
        max_depth: 0.0,
        near_plane: near,
        far_plane: far,
        in_meters: false,
        inverted: false,
    };
    depth.update_range();

    if config.export_in_meters {
        depth.data.iter_mut().for_each(|d| *d *= CM_TO_METERS);
        depth.min_depth *= CM_TO_METERS;
        depth.max_depth *= CM_TO_METERS;
        depth.near_plane *= CM_TO_METERS;
        depth.far_plane *= CM_TO_METERS;
        depth.in_meters = true;
    }

    if config.apply_gamma && config.gamma > 0.0 {
        let range = depth.max_depth - depth.min_depth;
        if range > 0.0 {
            let (min, inv_gamma) = (depth.min_depth, 1.0 / config.gamma);
            for d in depth.data.iter_mut() {
                *d = min + ((*d - min) / range).powf(inv_gamma) * range;
            }
        }
    }

    if config.invert_depth {
        for d in depth.data.iter_mut() {
            if *d > INVERSION_THRESHOLD {
                *d = 1.0 / *d;
            }
        }
        depth.update_range();
        depth.inverted = true;
    }

    log::debug!(
        "linearized {}x{} depth, range [{}, {}] {}",
        width,
        height,
        depth.min_depth,
        depth.max_depth,
        depth.units()
    );

    Ok(depth)
}
