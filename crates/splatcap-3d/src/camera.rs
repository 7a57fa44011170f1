use std::{fmt, str::FromStr};

use glam::DMat3;
use serde::{Deserialize, Serialize};

/// Camera models supported by the COLMAP writer.
///
/// The discriminant is the COLMAP model id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraModel {
    /// f, cx, cy
    SimplePinhole = 0,
    /// fx, fy, cx, cy
    #[default]
    Pinhole = 1,
    /// f, cx, cy, k1
    SimpleRadial = 2,
    /// f, cx, cy, k1, k2
    Radial = 3,
    /// fx, fy, cx, cy, k1, k2, p1, p2
    OpenCv = 4,
    /// fx, fy, cx, cy, k1, k2, p1, p2, k3, k4, k5, k6
    FullOpenCv = 6,
}

impl CameraModel {
    /// All supported models.
    pub const ALL: [CameraModel; 6] = [
        CameraModel::SimplePinhole,
        CameraModel::Pinhole,
        CameraModel::SimpleRadial,
        CameraModel::Radial,
        CameraModel::OpenCv,
        CameraModel::FullOpenCv,
    ];

    /// The COLMAP model id.
    pub fn model_id(self) -> i32 {
        self as i32
    }

    /// The COLMAP model name.
    pub fn name(self) -> &'static str {
        match self {
            CameraModel::SimplePinhole => "SIMPLE_PINHOLE",
            CameraModel::Pinhole => "PINHOLE",
            CameraModel::SimpleRadial => "SIMPLE_RADIAL",
            CameraModel::Radial => "RADIAL",
            CameraModel::OpenCv => "OPENCV",
            CameraModel::FullOpenCv => "FULL_OPENCV",
        }
    }

    /// Number of parameters COLMAP stores for the model.
    pub fn num_params(self) -> usize {
        match self {
            CameraModel::SimplePinhole => 3,
            CameraModel::Pinhole => 4,
            CameraModel::SimpleRadial => 4,
            CameraModel::Radial => 5,
            CameraModel::OpenCv => 8,
            CameraModel::FullOpenCv => 12,
        }
    }

    /// Look up a model from its COLMAP id.
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.model_id() == id)
    }
}

impl fmt::Display for CameraModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown camera model name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported camera model: {0}")]
pub struct UnknownCameraModel(pub String);

impl FromStr for CameraModel {
    type Err = UnknownCameraModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| UnknownCameraModel(s.to_string()))
    }
}

/// Compute a focal length in pixels from a field of view.
///
/// # Arguments
///
/// * `fov_deg` - The field of view in degrees.
/// * `dimension` - The image dimension along the same axis in pixels.
pub fn focal_length_from_fov(fov_deg: f64, dimension: f64) -> f64 {
    (dimension / 2.0) / (fov_deg.to_radians() / 2.0).tan()
}

/// Compute a field of view in degrees from a focal length in pixels.
pub fn fov_from_focal_length(focal_length: f64, dimension: f64) -> f64 {
    2.0 * ((dimension / 2.0) / focal_length).atan().to_degrees()
}

/// The intrinsic parameters of a camera, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraIntrinsics {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Focal length along x.
    pub fx: f64,
    /// Focal length along y.
    pub fy: f64,
    /// Principal point x.
    pub cx: f64,
    /// Principal point y.
    pub cy: f64,
    /// First radial distortion coefficient.
    pub k1: f64,
    /// Second radial distortion coefficient.
    pub k2: f64,
    /// First tangential distortion coefficient.
    pub p1: f64,
    /// Second tangential distortion coefficient.
    pub p2: f64,
    /// Camera model used for serialization.
    pub model: CameraModel,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::from_fov(90.0, 1920, 1080, CameraModel::Pinhole)
    }
}

/// A quality warning raised by [`CameraIntrinsics::validate_for_training`].
#[derive(Debug, Clone, PartialEq)]
pub enum IntrinsicsWarning {
    /// Dimensions, focal length or principal point are not strictly positive.
    InvalidValues,
    /// Resolution below 800x600.
    LowResolution {
        /// image width
        width: u32,
        /// image height
        height: u32,
    },
    /// A dimension above 4096 pixels.
    HighResolution {
        /// image width
        width: u32,
        /// image height
        height: u32,
    },
    /// Horizontal field of view outside [30, 120] degrees.
    UnusualFov(f64),
    /// Aspect ratio outside [0.5, 2.5].
    UnusualAspectRatio(f64),
    /// Principal point further than 10% of the image size from the center.
    OffCenterPrincipalPoint {
        /// horizontal offset in pixels
        dx: f64,
        /// vertical offset in pixels
        dy: f64,
    },
    /// fx and fy differ by more than 1%.
    NonSquarePixels(f64),
}

impl fmt::Display for IntrinsicsWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValues => write!(f, "invalid camera intrinsics"),
            Self::LowResolution { width, height } => write!(
                f,
                "low resolution {width}x{height} may reduce reconstruction quality"
            ),
            Self::HighResolution { width, height } => write!(
                f,
                "high resolution {width}x{height} may cause memory issues"
            ),
            Self::UnusualFov(fov) => write!(f, "unusual field of view {fov:.1} degrees"),
            Self::UnusualAspectRatio(ratio) => write!(f, "unusual aspect ratio {ratio:.2}"),
            Self::OffCenterPrincipalPoint { dx, dy } => write!(
                f,
                "principal point off center by ({dx:.1}, {dy:.1}) pixels"
            ),
            Self::NonSquarePixels(ratio) => write!(f, "non-square pixels (fx/fy = {ratio:.4})"),
        }
    }
}

/// The outcome of validating intrinsics for training.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntrinsicsReport {
    /// False only when the intrinsics are unusable.
    pub is_valid: bool,
    /// Quality warnings.
    pub warnings: Vec<IntrinsicsWarning>,
}

impl CameraIntrinsics {
    /// Creates new intrinsics without distortion.
    pub fn new(
        width: u32,
        height: u32,
        focal_length: (f64, f64),
        principal_point: (f64, f64),
        model: CameraModel,
    ) -> Self {
        Self {
            width,
            height,
            fx: focal_length.0,
            fy: focal_length.1,
            cx: principal_point.0,
            cy: principal_point.1,
            k1: 0.0,
            k2: 0.0,
            p1: 0.0,
            p2: 0.0,
            model,
        }
    }

    /// Creates intrinsics from a horizontal field of view with square pixels.
    ///
    /// # Arguments
    ///
    /// * `h_fov_deg` - The horizontal field of view in degrees.
    /// * `width` - The image width in pixels.
    /// * `height` - The image height in pixels.
    /// * `model` - The camera model to serialize with.
    pub fn from_fov(h_fov_deg: f64, width: u32, height: u32, model: CameraModel) -> Self {
        let focal = focal_length_from_fov(h_fov_deg, width as f64);
        Self::new(
            width,
            height,
            (focal, focal),
            (width as f64 / 2.0, height as f64 / 2.0),
            model,
        )
    }

    /// Creates pinhole intrinsics from a physical sensor and lens.
    ///
    /// Pixels may be non-square here when the sensor and image aspect ratios differ.
    pub fn from_sensor(
        sensor_width_mm: f64,
        sensor_height_mm: f64,
        focal_length_mm: f64,
        width: u32,
        height: u32,
    ) -> Self {
        let fx = focal_length_mm / sensor_width_mm * width as f64;
        let fy = focal_length_mm / sensor_height_mm * height as f64;
        Self::new(
            width,
            height,
            (fx, fy),
            (width as f64 / 2.0, height as f64 / 2.0),
            CameraModel::Pinhole,
        )
    }

    /// Set the distortion coefficients.
    pub fn with_distortion(mut self, k1: f64, k2: f64, p1: f64, p2: f64) -> Self {
        self.k1 = k1;
        self.k2 = k2;
        self.p1 = p1;
        self.p2 = p2;
        self
    }

    /// Whether every dimension, focal length and principal point value is strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.fx > 0.0
            && self.fy > 0.0
            && self.cx > 0.0
            && self.cy > 0.0
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Horizontal field of view in degrees.
    pub fn horizontal_fov(&self) -> f64 {
        fov_from_focal_length(self.fx, self.width as f64)
    }

    /// Vertical field of view in degrees.
    pub fn vertical_fov(&self) -> f64 {
        fov_from_focal_length(self.fy, self.height as f64)
    }

    /// Returns the 3x3 camera matrix K.
    pub fn camera_matrix(&self) -> DMat3 {
        DMat3::from_cols_array(&[
            self.fx, 0.0, 0.0, //
            0.0, self.fy, 0.0, //
            self.cx, self.cy, 1.0,
        ])
    }

    /// The model-specific COLMAP parameter vector.
    pub fn params(&self) -> Vec<f64> {
        let f = self.fx;
        match self.model {
            CameraModel::SimplePinhole => vec![f, self.cx, self.cy],
            CameraModel::Pinhole => vec![self.fx, self.fy, self.cx, self.cy],
            CameraModel::SimpleRadial => vec![f, self.cx, self.cy, self.k1],
            CameraModel::Radial => vec![f, self.cx, self.cy, self.k1, self.k2],
            CameraModel::OpenCv => vec![
                self.fx, self.fy, self.cx, self.cy, self.k1, self.k2, self.p1, self.p2,
            ],
            CameraModel::FullOpenCv => vec![
                self.fx, self.fy, self.cx, self.cy, self.k1, self.k2, self.p1, self.p2, 0.0,
                0.0, 0.0, 0.0,
            ],
        }
    }

    /// Space-separated parameters with 10 decimals, as written to `cameras.txt`.
    pub fn params_string(&self) -> String {
        self.params()
            .iter()
            .map(|p| format!("{p:.10}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check the intrinsics against the ranges reconstruction pipelines expect.
    pub fn validate_for_training(&self) -> IntrinsicsReport {
        let mut warnings = Vec::new();

        if self.width < 800 || self.height < 600 {
            warnings.push(IntrinsicsWarning::LowResolution {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > 4096 || self.height > 4096 {
            warnings.push(IntrinsicsWarning::HighResolution {
                width: self.width,
                height: self.height,
            });
        }

        let fov = self.horizontal_fov();
        if !(30.0..=120.0).contains(&fov) {
            warnings.push(IntrinsicsWarning::UnusualFov(fov));
        }

        let aspect = self.aspect_ratio();
        if !(0.5..=2.5).contains(&aspect) {
            warnings.push(IntrinsicsWarning::UnusualAspectRatio(aspect));
        }

        let dx = self.cx - self.width as f64 / 2.0;
        let dy = self.cy - self.height as f64 / 2.0;
        if dx.abs() > self.width as f64 * 0.1 || dy.abs() > self.height as f64 * 0.1 {
            warnings.push(IntrinsicsWarning::OffCenterPrincipalPoint { dx, dy });
        }

        let is_valid = self.is_valid();
        if !is_valid {
            warnings.push(IntrinsicsWarning::InvalidValues);
        }

        let ratio = self.fx / self.fy;
        if (ratio - 1.0).abs() > 0.01 {
            warnings.push(IntrinsicsWarning::NonSquarePixels(ratio));
        }

        for warning in &warnings {
            log::warn!("{warning}");
        }

        IntrinsicsReport { is_valid, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_focal_length_from_fov() {
        let intrinsics = CameraIntrinsics::from_fov(90.0, 1920, 1080, CameraModel::Pinhole);
        assert!((intrinsics.fx - 960.0).abs() < 1.0);
        assert_eq!(intrinsics.fx, intrinsics.fy);
        assert_eq!(intrinsics.cx, 960.0);
        assert_eq!(intrinsics.cy, 540.0);
        assert_relative_eq!(intrinsics.horizontal_fov(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fov_round_trip() {
        for fov in [30.0, 60.0, 90.0, 110.0] {
            let f = focal_length_from_fov(fov, 1280.0);
            assert_relative_eq!(fov_from_focal_length(f, 1280.0), fov, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_from_sensor() {
        let intrinsics = CameraIntrinsics::from_sensor(36.0, 24.0, 50.0, 1920, 1080);
        assert_relative_eq!(intrinsics.fx, 50.0 / 36.0 * 1920.0, epsilon = 1e-9);
        assert_relative_eq!(intrinsics.fy, 50.0 / 24.0 * 1080.0, epsilon = 1e-9);
        assert_eq!(intrinsics.model, CameraModel::Pinhole);
    }

    #[test]
    fn test_params_per_model() {
        let base = CameraIntrinsics::from_fov(90.0, 1920, 1080, CameraModel::Pinhole)
            .with_distortion(0.1, 0.01, 0.001, 0.002);
        for model in CameraModel::ALL {
            let intrinsics = CameraIntrinsics { model, ..base };
            assert_eq!(intrinsics.params().len(), model.num_params());
        }

        let radial = CameraIntrinsics {
            model: CameraModel::Radial,
            ..base
        };
        assert_eq!(radial.params(), vec![base.fx, 960.0, 540.0, 0.1, 0.01]);
    }

    #[test]
    fn test_model_names_and_ids() {
        assert_eq!(CameraModel::FullOpenCv.model_id(), 6);
        assert_eq!(CameraModel::from_id(4), Some(CameraModel::OpenCv));
        assert_eq!(CameraModel::from_id(5), None);
        assert_eq!(
            "SIMPLE_RADIAL".parse::<CameraModel>(),
            Ok(CameraModel::SimpleRadial)
        );
        assert!("FISHEYE".parse::<CameraModel>().is_err());
    }

    #[test]
    fn test_params_string() {
        let intrinsics = CameraIntrinsics::new(
            100,
            100,
            (50.0, 50.0),
            (50.0, 50.0),
            CameraModel::SimplePinhole,
        );
        assert_eq!(
            intrinsics.params_string(),
            "50.0000000000 50.0000000000 50.0000000000"
        );
    }

    #[test]
    fn test_camera_matrix() {
        let k = CameraIntrinsics::new(640, 480, (500.0, 510.0), (320.0, 240.0), CameraModel::Pinhole)
            .camera_matrix();
        assert_eq!(k.x_axis.x, 500.0);
        assert_eq!(k.y_axis.y, 510.0);
        assert_eq!(k.z_axis.x, 320.0);
        assert_eq!(k.z_axis.y, 240.0);
        assert_eq!(k.z_axis.z, 1.0);
    }

    #[test]
    fn test_validate_for_training() {
        let good = CameraIntrinsics::default().validate_for_training();
        assert!(good.is_valid);
        assert!(good.warnings.is_empty());

        let small = CameraIntrinsics::from_fov(150.0, 640, 480, CameraModel::Pinhole);
        let report = small.validate_for_training();
        assert!(report.is_valid);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, IntrinsicsWarning::LowResolution { .. })));
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, IntrinsicsWarning::UnusualFov(_))));

        let sensor = CameraIntrinsics::from_sensor(36.0, 36.0, 35.0, 1920, 1080);
        let report = sensor.validate_for_training();
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, IntrinsicsWarning::NonSquarePixels(_))));

        let broken = CameraIntrinsics::new(0, 1080, (1.0, 1.0), (1.0, 1.0), CameraModel::Pinhole);
        let report = broken.validate_for_training();
        assert!(!report.is_valid);
        // the remaining checks still run
        assert_eq!(report.warnings.len(), 5);
        assert!(matches!(report.warnings[0], IntrinsicsWarning::LowResolution { width: 0, .. }));
        assert!(matches!(report.warnings[2], IntrinsicsWarning::UnusualAspectRatio(_)));
        assert_eq!(report.warnings[4], IntrinsicsWarning::InvalidValues);
    }
}
