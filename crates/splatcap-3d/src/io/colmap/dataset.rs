use std::{
    fmt,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use super::{
    write_cameras_bin_to, write_cameras_txt_to, write_images_bin_to, write_images_txt_to,
    write_points3d_bin_to, write_points3d_txt_to, ColmapCamera, ColmapError, ColmapFormat,
    ColmapImage, ColmapPoint3d,
};

/// Below this many images a dataset is flagged as sparse.
pub const MIN_RECOMMENDED_IMAGES: usize = 50;

/// Paths of a dataset directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    /// Dataset root.
    pub root: PathBuf,
    /// `sparse/0`, holds the sparse model files.
    pub sparse: PathBuf,
    /// `images`
    pub images: PathBuf,
    /// `depth`
    pub depth: PathBuf,
}

impl DatasetLayout {
    /// Layout rooted at `root`, without touching the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            sparse: root.join("sparse").join("0"),
            images: root.join("images"),
            depth: root.join("depth"),
            root,
        }
    }
}

/// Create `root`, `root/sparse/0`, `root/images` and `root/depth`.
///
/// Existing directories are left untouched.
pub fn create_directory_structure(root: impl AsRef<Path>) -> Result<DatasetLayout, ColmapError> {
    let layout = DatasetLayout::new(root);
    for dir in [&layout.root, &layout.sparse, &layout.images, &layout.depth] {
        fs::create_dir_all(dir)?;
    }
    Ok(layout)
}

fn create_file(
    dir: impl AsRef<Path>,
    stem: &str,
    format: ColmapFormat,
) -> Result<BufWriter<File>, ColmapError> {
    let path = dir.as_ref().join(format!("{stem}{}", format.extension()));
    Ok(BufWriter::new(File::create(path)?))
}

/// Write `cameras.txt` or `cameras.bin` into `dir`.
pub fn write_cameras(
    dir: impl AsRef<Path>,
    cameras: &[ColmapCamera],
    format: ColmapFormat,
) -> Result<(), ColmapError> {
    let mut writer = create_file(dir, "cameras", format)?;
    match format {
        ColmapFormat::Text => write_cameras_txt_to(&mut writer, cameras)?,
        ColmapFormat::Binary => write_cameras_bin_to(&mut writer, cameras)?,
    }
    writer.flush()?;
    Ok(())
}

/// Write `images.txt` or `images.bin` into `dir`.
pub fn write_images(
    dir: impl AsRef<Path>,
    images: &[ColmapImage],
    format: ColmapFormat,
) -> Result<(), ColmapError> {
    write_images_with_progress(dir, images, format, |_, _| {})
}

/// Same as [`write_images`] but reports `(written, total)` after every image.
pub fn write_images_with_progress(
    dir: impl AsRef<Path>,
    images: &[ColmapImage],
    format: ColmapFormat,
    progress: impl FnMut(usize, usize),
) -> Result<(), ColmapError> {
    let mut writer = create_file(dir, "images", format)?;
    match format {
        ColmapFormat::Text => write_images_txt_to(&mut writer, images, progress)?,
        ColmapFormat::Binary => write_images_bin_to(&mut writer, images, progress)?,
    }
    writer.flush()?;
    Ok(())
}

/// Write `points3D.txt` or `points3D.bin` into `dir`.
pub fn write_points3d(
    dir: impl AsRef<Path>,
    points: &[ColmapPoint3d],
    format: ColmapFormat,
) -> Result<(), ColmapError> {
    let mut writer = create_file(dir, "points3D", format)?;
    match format {
        ColmapFormat::Text => write_points3d_txt_to(&mut writer, points)?,
        ColmapFormat::Binary => write_points3d_bin_to(&mut writer, points)?,
    }
    writer.flush()?;
    Ok(())
}

/// Write a complete sparse model under `root/sparse/0`.
///
/// # Arguments
///
/// * `root` - The dataset root, created if missing.
/// * `cameras` - The camera records.
/// * `images` - The image records.
/// * `points` - The 3D points, may be empty.
/// * `format` - Text or binary files.
///
/// # Returns
///
/// The layout of the written dataset.
pub fn write_dataset(
    root: impl AsRef<Path>,
    cameras: &[ColmapCamera],
    images: &[ColmapImage],
    points: &[ColmapPoint3d],
    format: ColmapFormat,
) -> Result<DatasetLayout, ColmapError> {
    let layout = create_directory_structure(root)?;

    write_cameras(&layout.sparse, cameras, format)?;
    write_images(&layout.sparse, images, format)?;
    write_points3d(&layout.sparse, points, format)?;

    log::info!(
        "wrote COLMAP dataset to {}: {} cameras, {} images, {} points",
        layout.root.display(),
        cameras.len(),
        images.len(),
        points.len()
    );

    Ok(layout)
}

/// Issues found by [`validate_dataset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetWarning {
    /// No `cameras.txt` nor `cameras.bin`.
    MissingCameras,
    /// No `images.txt` nor `images.bin`.
    MissingImages,
    /// The `images` directory does not exist.
    MissingImagesDir,
    /// The `images` directory holds no image files.
    NoImages,
    /// Fewer images than [`MIN_RECOMMENDED_IMAGES`].
    LowImageCount(usize),
}

impl fmt::Display for DatasetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCameras => write!(f, "missing cameras.txt or cameras.bin"),
            Self::MissingImages => write!(f, "missing images.txt or images.bin"),
            Self::MissingImagesDir => write!(f, "missing images directory"),
            Self::NoImages => write!(f, "no image files found in images directory"),
            Self::LowImageCount(n) => write!(
                f,
                "only {n} images found, at least {MIN_RECOMMENDED_IMAGES} are recommended"
            ),
        }
    }
}

/// Result of [`validate_dataset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetReport {
    /// True when both the cameras and images files exist.
    pub is_valid: bool,
    /// A cameras file exists.
    pub has_cameras: bool,
    /// An images file exists.
    pub has_images: bool,
    /// Number of image files in `images`.
    pub image_count: usize,
    /// Everything worth reporting.
    pub warnings: Vec<DatasetWarning>,
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

/// Check that a dataset directory has the files a trainer needs.
pub fn validate_dataset(root: impl AsRef<Path>) -> Result<DatasetReport, ColmapError> {
    let layout = DatasetLayout::new(root);
    let mut report = DatasetReport::default();

    let exists = |stem: &str| {
        [ColmapFormat::Text, ColmapFormat::Binary]
            .iter()
            .any(|f| layout.sparse.join(format!("{stem}{}", f.extension())).is_file())
    };

    report.has_cameras = exists("cameras");
    report.has_images = exists("images");
    if !report.has_cameras {
        report.warnings.push(DatasetWarning::MissingCameras);
    }
    if !report.has_images {
        report.warnings.push(DatasetWarning::MissingImages);
    }

    if layout.images.is_dir() {
        for entry in fs::read_dir(&layout.images)? {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                report.image_count += 1;
            }
        }
        if report.image_count == 0 {
            report.warnings.push(DatasetWarning::NoImages);
        } else if report.image_count < MIN_RECOMMENDED_IMAGES {
            report
                .warnings
                .push(DatasetWarning::LowImageCount(report.image_count));
        }
    } else {
        report.warnings.push(DatasetWarning::MissingImagesDir);
    }

    report.is_valid = report.has_cameras && report.has_images;
    for warning in &report.warnings {
        log::warn!("{warning}");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraIntrinsics;
    use crate::io::colmap::{
        create_camera, create_images_from_viewpoints, read_cameras_bin, read_cameras_txt,
        read_images_bin, read_images_txt, IMAGE_EXTENSION, IMAGE_PREFIX,
    };
    use crate::trajectory::{generate_viewpoints, TrajectoryConfig};

    #[test]
    fn test_create_directory_structure() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let root = tmp_dir.path().join("dataset");
        let layout = create_directory_structure(&root)?;

        assert!(root.is_dir());
        assert!(root.join("sparse").join("0").is_dir());
        assert!(root.join("images").is_dir());
        assert!(root.join("depth").is_dir());
        assert_eq!(layout.sparse, root.join("sparse/0"));

        // calling twice is fine
        create_directory_structure(&root)?;
        Ok(())
    }

    #[test]
    fn test_write_dataset_text_and_binary() -> Result<(), Box<dyn std::error::Error>> {
        let config = TrajectoryConfig {
            num_rings: 2,
            views_per_ring: 6,
            ..Default::default()
        };
        let viewpoints = generate_viewpoints(&config);
        let cameras = vec![create_camera(&CameraIntrinsics::default(), 1)];
        let images = create_images_from_viewpoints(&viewpoints, IMAGE_PREFIX, IMAGE_EXTENSION);

        let tmp_dir = tempfile::tempdir()?;

        let text_root = tmp_dir.path().join("text");
        let layout = write_dataset(&text_root, &cameras, &images, &[], ColmapFormat::Text)?;
        assert_eq!(read_cameras_txt(layout.sparse.join("cameras.txt"))?, cameras);
        assert_eq!(read_images_txt(layout.sparse.join("images.txt"))?.len(), 12);
        assert!(layout.sparse.join("points3D.txt").is_file());

        let bin_root = tmp_dir.path().join("bin");
        let layout = write_dataset(&bin_root, &cameras, &images, &[], ColmapFormat::Binary)?;
        assert_eq!(read_cameras_bin(layout.sparse.join("cameras.bin"))?, cameras);
        assert_eq!(read_images_bin(layout.sparse.join("images.bin"))?, images);
        assert_eq!(fs::read(layout.sparse.join("points3D.bin"))?, 0u64.to_le_bytes());

        Ok(())
    }

    #[test]
    fn test_write_images_progress() -> Result<(), Box<dyn std::error::Error>> {
        let config = TrajectoryConfig {
            num_rings: 1,
            views_per_ring: 8,
            ..Default::default()
        };
        let images = create_images_from_viewpoints(
            &generate_viewpoints(&config),
            IMAGE_PREFIX,
            IMAGE_EXTENSION,
        );

        let tmp_dir = tempfile::tempdir()?;
        let mut calls = Vec::new();
        write_images_with_progress(tmp_dir.path(), &images, ColmapFormat::Binary, |n, total| {
            calls.push((n, total))
        })?;

        assert_eq!(calls.len(), 8);
        assert_eq!(calls.last(), Some(&(8, 8)));
        Ok(())
    }

    #[test]
    fn test_validate_dataset() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let root = tmp_dir.path();

        let report = validate_dataset(root)?;
        assert!(!report.is_valid);
        assert!(report.warnings.contains(&DatasetWarning::MissingCameras));
        assert!(report.warnings.contains(&DatasetWarning::MissingImages));
        assert!(report.warnings.contains(&DatasetWarning::MissingImagesDir));

        let cameras = vec![create_camera(&CameraIntrinsics::default(), 1)];
        write_dataset(root, &cameras, &[], &[], ColmapFormat::Text)?;
        let report = validate_dataset(root)?;
        assert!(report.is_valid);
        assert_eq!(report.warnings, vec![DatasetWarning::NoImages]);

        for i in 0..3 {
            fs::write(root.join("images").join(format!("image_{i:05}.JPG")), b"")?;
        }
        fs::write(root.join("images").join("notes.txt"), b"")?;
        let report = validate_dataset(root)?;
        assert_eq!(report.image_count, 3);
        assert_eq!(report.warnings, vec![DatasetWarning::LowImageCount(3)]);

        Ok(())
    }
}
