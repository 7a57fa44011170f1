use crate::linear::DepthMap;

// Turbo colormap control points at 0, 0.25, 0.5, 0.75 and 1.
const TURBO_STOPS: [[f32; 3]; 5] = [
    [0.18995, 0.07176, 0.23217],
    [0.35238, 0.34290, 0.93411],
    [0.56924, 0.77063, 0.46915],
    [0.94227, 0.89411, 0.10175],
    [0.98644, 0.46916, 0.07991],
];

/// Piecewise-linear approximation of the turbo colormap.
pub fn turbo_colormap(value: f32) -> [u8; 3] {
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let segment = ((v * 4.0) as usize).min(3);
    let t = v * 4.0 - segment as f32;

    let (a, b) = (TURBO_STOPS[segment], TURBO_STOPS[segment + 1]);
    [0, 1, 2].map(|c| ((a[c] + t * (b[c] - a[c])) * 255.0) as u8)
}

/// Render a depth map as an RGB8 buffer, near is dark.
///
/// Values are normalized over `[min_depth, max_depth]`. Only meant for
/// eyeballing captures.
///
/// # Arguments
///
/// * `depth` - The depth map.
/// * `colorize` - Use [`turbo_colormap`] instead of grayscale.
pub fn depth_visualization(depth: &DepthMap, colorize: bool) -> Vec<u8> {
    let range = depth.max_depth - depth.min_depth;
    let range = if range > 0.0 { range } else { 1.0 };

    depth
        .data
        .iter()
        .flat_map(|&d| {
            let normalized = ((d - depth.min_depth) / range).clamp(0.0, 1.0);
            if colorize {
                turbo_colormap(normalized)
            } else {
                [(normalized * 255.0) as u8; 3]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{linearize_depth, DepthExportConfig};

    #[test]
    fn test_turbo_colormap() {
        assert_eq!(turbo_colormap(0.0), [48, 18, 59]);
        assert_eq!(turbo_colormap(-1.0), turbo_colormap(0.0));
        assert_eq!(turbo_colormap(1.0), [251, 119, 20]);
        assert_eq!(turbo_colormap(2.0), turbo_colormap(1.0));
        assert_eq!(turbo_colormap(0.5), [145, 196, 119]);
    }

    #[test]
    fn test_depth_visualization() -> Result<(), Box<dyn std::error::Error>> {
        let depth = linearize_depth(&[1.0, 0.0], 2, 1, &DepthExportConfig::default())?;

        let gray = depth_visualization(&depth, false);
        assert_eq!(gray, vec![0, 0, 0, 255, 255, 255]);

        let color = depth_visualization(&depth, true);
        assert_eq!(color.len(), 6);
        assert_eq!(&color[..3], &turbo_colormap(0.0));
        assert_eq!(&color[3..], &turbo_colormap(1.0));
        Ok(())
    }
}
