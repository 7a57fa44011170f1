//! The engine convention is left-handed with X forward, Y right, Z up and
//! centimeter units. The target convention (COLMAP / OpenCV) is right-handed
//! with X right, Y down, Z forward and meter units.

use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Scale factor from engine units (centimeters) to meters.
pub const CM_TO_METERS: f64 = 0.01;

/// Scale factor from meters to engine units (centimeters).
pub const METERS_TO_CM: f64 = 100.0;

/// Maps engine axes onto target axes: `target = (e.y, -e.z, e.x)`.
pub const AXIS_SWAP: DMat3 = DMat3::from_cols(
    DVec3::new(0.0, 0.0, 1.0),
    DVec3::new(1.0, 0.0, 0.0),
    DVec3::new(0.0, -1.0, 0.0),
);

/// Maps target axes back onto engine axes: `engine = (t.z, t.x, -t.y)`.
pub const INVERSE_AXIS_SWAP: DMat3 = DMat3::from_cols(
    DVec3::new(0.0, 1.0, 0.0),
    DVec3::new(0.0, 0.0, -1.0),
    DVec3::new(1.0, 0.0, 0.0),
);

/// Basis change between the target camera axes (right, down, forward) and the
/// engine camera axes (Y, -Z, X), expressed after the world axis swap.
///
/// Both conventions orient their camera axes like their world axes, so the
/// correction collapses to identity once [`AXIS_SWAP`] is applied.
pub const CAMERA_BASIS_CORRECTION: DMat3 = DMat3::IDENTITY;

/// Euler angles in degrees using the engine convention.
///
/// Yaw turns about +Z, pitch about +Y with positive values looking up, and
/// roll about the forward axis. Rotations compose as yaw, then pitch, then roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotator {
    /// Pitch in degrees.
    pub pitch: f64,
    /// Yaw in degrees.
    pub yaw: f64,
    /// Roll in degrees.
    pub roll: f64,
}

impl Rotator {
    /// The zero rotator, looking down engine +X.
    pub const ZERO: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    /// Create a new rotator from pitch, yaw and roll in degrees.
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Convert to a camera-to-world quaternion in engine space.
    pub fn to_quat(self) -> DQuat {
        let yaw = DQuat::from_rotation_z(self.yaw.to_radians());
        let pitch = DQuat::from_rotation_y(-self.pitch.to_radians());
        let roll = DQuat::from_rotation_x(-self.roll.to_radians());
        (yaw * pitch * roll).normalize()
    }

    /// Recover the Euler angles of an engine-space quaternion.
    ///
    /// At the poles (pitch of +/-90 degrees) roll is folded into yaw.
    pub fn from_quat(q: DQuat) -> Self {
        let m = DMat3::from_quat(q.normalize());
        let forward = m.x_axis;
        let right = m.y_axis;
        let up = m.z_axis;

        let pitch = forward.z.clamp(-1.0, 1.0).asin();
        let cos_pitch = pitch.cos();

        if cos_pitch.abs() < 1e-9 {
            let yaw = (-right.x).atan2(right.y);
            return Self::new(pitch.to_degrees(), yaw.to_degrees(), 0.0);
        }

        let yaw = forward.y.atan2(forward.x);
        let roll = (-right.z).atan2(up.z);

        Self::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
    }

    /// Unit view direction in engine space.
    pub fn forward(self) -> DVec3 {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        DVec3::new(cp * cy, cp * sy, sp)
    }

    /// Wrap every angle into `(-180, 180]`.
    pub fn normalized(self) -> Self {
        Self::new(
            normalize_axis(self.pitch),
            normalize_axis(self.yaw),
            normalize_axis(self.roll),
        )
    }
}

/// Wrap an angle in degrees into `(-180, 180]`.
pub fn normalize_axis(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// A camera-to-world pose in engine space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in centimeters.
    pub position: DVec3,
    /// Camera-to-world orientation.
    pub rotation: DQuat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }
}

impl Pose {
    /// Create a new pose from a position and orientation.
    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    /// Create a new pose from a position and engine Euler angles.
    pub fn from_rotator(position: DVec3, rotator: Rotator) -> Self {
        Self::new(position, rotator.to_quat())
    }

    /// Unit view direction in engine space.
    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::X
    }
}

/// World-to-camera extrinsics in the target convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics {
    /// World-to-camera rotation.
    pub rotation: DQuat,
    /// World-to-camera translation in meters.
    pub translation: DVec3,
}

impl Extrinsics {
    /// Rotation as `[qw, qx, qy, qz]`, the COLMAP ordering.
    pub fn rotation_wxyz(&self) -> [f64; 4] {
        [
            self.rotation.w,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        ]
    }

    /// Translation as `[tx, ty, tz]`.
    pub fn translation_array(&self) -> [f64; 3] {
        self.translation.to_array()
    }

    /// Camera center in target world space.
    pub fn camera_center(&self) -> DVec3 {
        camera_center(self.rotation, self.translation)
    }
}

/// Convert an engine-space position to the target convention.
///
/// # Arguments
///
/// * `position` - The position in engine space (centimeters).
///
/// # Returns
///
/// The position in target space (meters).
pub fn position_to_target(position: DVec3) -> DVec3 {
    AXIS_SWAP * position * CM_TO_METERS
}

/// Convert a target-space position back to the engine convention.
pub fn position_from_target(position: DVec3) -> DVec3 {
    INVERSE_AXIS_SWAP * position * METERS_TO_CM
}

/// Convert a direction (normal, view vector) without translation or scale.
///
/// The result is normalized. A zero vector stays zero.
pub fn direction_to_target(direction: DVec3) -> DVec3 {
    (AXIS_SWAP * direction).normalize_or_zero()
}

/// Convert a target-space direction back to the engine convention.
pub fn direction_from_target(direction: DVec3) -> DVec3 {
    (INVERSE_AXIS_SWAP * direction).normalize_or_zero()
}

/// Convert an engine camera-to-world rotation to a target camera-to-world rotation.
///
/// The engine frame is mirrored into the target frame by conjugating with the
/// axis swap, which keeps the result a proper rotation even though the swap
/// itself flips handedness.
///
/// # Arguments
///
/// * `rotation` - Camera-to-world orientation in engine space.
///
/// # Returns
///
/// The normalized camera-to-world orientation in target space.
pub fn rotation_to_target(rotation: DQuat) -> DQuat {
    let engine = DMat3::from_quat(rotation.normalize());
    let target = AXIS_SWAP * engine * INVERSE_AXIS_SWAP * CAMERA_BASIS_CORRECTION;
    DQuat::from_mat3(&target).normalize()
}

/// Inverse of [`rotation_to_target`].
pub fn rotation_from_target(rotation: DQuat) -> DQuat {
    let target = DMat3::from_quat(rotation.normalize());
    let engine =
        INVERSE_AXIS_SWAP * target * CAMERA_BASIS_CORRECTION.transpose() * AXIS_SWAP;
    DQuat::from_mat3(&engine).normalize()
}

/// Convert engine Euler angles to a target camera-to-world rotation.
pub fn rotator_to_target(rotator: Rotator) -> DQuat {
    rotation_to_target(rotator.to_quat())
}

/// Convert a target camera-to-world rotation to engine Euler angles.
pub fn rotator_from_target(rotation: DQuat) -> Rotator {
    Rotator::from_quat(rotation_from_target(rotation))
}

/// Convert an engine pose into the target camera center and world-to-camera rotation.
pub fn camera_to_target(pose: &Pose) -> (DVec3, DQuat) {
    let center = position_to_target(pose.position);
    let cam_to_world = rotation_to_target(pose.rotation);
    (center, cam_to_world.inverse().normalize())
}

/// Compute the COLMAP world-to-camera extrinsics of an engine pose.
///
/// The translation is `t = -R * C` where `C` is the camera center in target space.
pub fn world_to_camera(pose: &Pose) -> Extrinsics {
    let (center, rotation) = camera_to_target(pose);
    let translation = -(rotation * center);
    Extrinsics {
        rotation,
        translation,
    }
}

/// Recover the camera center `C = -R^T t` from world-to-camera extrinsics.
pub fn camera_center(rotation: DQuat, translation: DVec3) -> DVec3 {
    -(rotation.inverse() * translation)
}

/// Linear map from engine coordinates to target coordinates, unit scale included.
pub fn engine_to_target_matrix() -> DMat3 {
    AXIS_SWAP * CM_TO_METERS
}

/// Linear map from target coordinates to engine coordinates, unit scale included.
pub fn target_to_engine_matrix() -> DMat3 {
    INVERSE_AXIS_SWAP * METERS_TO_CM
}

/// Convert a splat orientation, stored as `[x, y, z, w]`, to the target convention.
///
/// This is the quaternion form of [`rotation_to_target`]: the vector part is an
/// axial vector, so it picks up the determinant of the axis swap.
pub fn splat_rotation_to_target(rotation: [f32; 4]) -> [f32; 4] {
    let [x, y, z, w] = rotation;
    let q = [-y, z, -x, w];
    let norm = q.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return [0.0, 0.0, 0.0, 1.0];
    }
    q.map(|v| v / norm)
}

/// Convert a linear splat scale in centimeters to target axes in meters.
pub fn splat_scale_to_target(scale: [f32; 3]) -> [f32; 3] {
    let s = CM_TO_METERS as f32;
    [scale[1] * s, scale[2] * s, scale[0] * s]
}
