use std::fmt;

use crate::linear::DepthMap;

/// Share of non-positive values above which a warning is raised, in percent.
pub const MAX_NON_POSITIVE_PERCENT: f32 = 5.0;

/// Depth ranges narrower than this are flagged.
pub const MIN_DEPTH_RANGE: f32 = 0.1;

/// Maximum depths beyond this are flagged.
pub const MAX_DEPTH_LIMIT: f32 = 1000.0;

/// Issues found by [`validate_depth`].
#[derive(Debug, Clone, PartialEq)]
pub enum DepthWarning {
    /// Dimensions do not match the data.
    InvalidDimensions,
    /// Number of NaN values.
    NanValues(usize),
    /// Number of infinite values.
    InfiniteValues(usize),
    /// Percentage of values at or below zero.
    NonPositiveValues(f32),
    /// `max - min` is below [`MIN_DEPTH_RANGE`].
    NarrowRange(f32),
    /// The maximum depth exceeds [`MAX_DEPTH_LIMIT`].
    LargeMaxDepth(f32),
}

impl fmt::Display for DepthWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions => write!(f, "invalid depth dimensions or data"),
            Self::NanValues(n) => write!(f, "{n} NaN values detected in depth data"),
            Self::InfiniteValues(n) => write!(f, "{n} infinite values detected in depth data"),
            Self::NonPositiveValues(p) => write!(f, "{p:.1}% invalid depth values (<=0)"),
            Self::NarrowRange(r) => {
                write!(f, "very narrow depth range ({r}), the scene may be flat")
            }
            Self::LargeMaxDepth(d) => {
                write!(f, "very large maximum depth ({d}), may affect precision")
            }
        }
    }
}

/// Result of [`validate_depth`].
#[derive(Debug, Clone, PartialEq)]
pub struct DepthReport {
    /// False on bad dimensions or any NaN.
    pub is_valid: bool,
    /// Everything worth reporting.
    pub warnings: Vec<DepthWarning>,
}

/// Check a linearized depth map before it is used as training supervision.
pub fn validate_depth(depth: &DepthMap) -> DepthReport {
    if !depth.is_valid() {
        return DepthReport {
            is_valid: false,
            warnings: vec![DepthWarning::InvalidDimensions],
        };
    }

    let (mut nan, mut inf, mut non_positive) = (0usize, 0usize, 0usize);
    for d in &depth.data {
        if d.is_nan() {
            nan += 1;
        } else if d.is_infinite() {
            inf += 1;
        } else if *d <= 0.0 {
            non_positive += 1;
        }
    }

    let mut warnings = Vec::new();
    if nan > 0 {
        warnings.push(DepthWarning::NanValues(nan));
    }
    if inf > 0 {
        warnings.push(DepthWarning::InfiniteValues(inf));
    }

    let non_positive_percent = 100.0 * non_positive as f32 / depth.data.len() as f32;
    if non_positive_percent > MAX_NON_POSITIVE_PERCENT {
        warnings.push(DepthWarning::NonPositiveValues(non_positive_percent));
    }

    let range = depth.max_depth - depth.min_depth;
    if range < MIN_DEPTH_RANGE {
        warnings.push(DepthWarning::NarrowRange(range));
    }
    if depth.max_depth > MAX_DEPTH_LIMIT {
        warnings.push(DepthWarning::LargeMaxDepth(depth.max_depth));
    }

    for warning in &warnings {
        log::warn!("{warning}");
    }

    DepthReport {
        is_valid: nan == 0,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_map(data: Vec<f32>) -> DepthMap {
        let finite = data.iter().copied().filter(|d| d.is_finite());
        let min_depth = finite.clone().fold(f32::MAX, f32::min);
        let max_depth = finite.fold(f32::MIN, f32::max);
        DepthMap {
            width: data.len(),
            height: 1,
            data,
            min_depth,
            max_depth,
            near_plane: 0.1,
            far_plane: 1000.0,
            in_meters: true,
            inverted: false,
        }
    }

    #[test]
    fn test_validate_depth_clean() {
        let report = validate_depth(&depth_map(vec![1.0, 2.0, 5.0, 10.0]));
        assert!(report.is_valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_validate_depth_warnings() {
        let mut data = vec![1.0; 18];
        data.push(0.0);
        data.push(f32::INFINITY);
        let report = validate_depth(&depth_map(data));
        assert!(report.is_valid);
        // exactly 5% non-positive is tolerated
        assert_eq!(report.warnings, vec![DepthWarning::InfiniteValues(1)]);

        let report = validate_depth(&depth_map(vec![2.0, 2.05, 2.02]));
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(report.warnings[0], DepthWarning::NarrowRange(_)));

        let report = validate_depth(&depth_map(vec![0.0, 5.0, f32::NAN, 2000.0]));
        assert!(!report.is_valid);
        assert_eq!(report.warnings[0], DepthWarning::NanValues(1));
        assert_eq!(report.warnings[1], DepthWarning::NonPositiveValues(25.0));
        assert_eq!(report.warnings.last(), Some(&DepthWarning::LargeMaxDepth(2000.0)));
    }

    #[test]
    fn test_validate_depth_invalid_dimensions() {
        let mut depth = depth_map(vec![1.0, 2.0]);
        depth.height = 2;
        let report = validate_depth(&depth);
        assert!(!report.is_valid);
        assert_eq!(report.warnings, vec![DepthWarning::InvalidDimensions]);
    }
}
