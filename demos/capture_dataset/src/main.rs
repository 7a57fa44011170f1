use argh::FromArgs;
use std::path::PathBuf;

use splatcap::scene::{
    camera::{CameraIntrinsics, CameraModel},
    io::{colmap, ply},
    trajectory::{self, TrajectoryConfig, TrajectoryType},
};

#[derive(FromArgs)]
/// Plan a capture trajectory and write the COLMAP sparse model for it
struct Args {
    /// output dataset directory
    #[argh(option, short = 'o')]
    output: PathBuf,

    /// trajectory config as JSON, defaults are used for missing fields
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// trajectory type, overrides the config file
    #[argh(option, short = 't', from_str_fn(parse_trajectory_type))]
    trajectory: Option<TrajectoryType>,

    /// horizontal field of view in degrees
    #[argh(option, default = "90.0")]
    fov: f64,

    /// image width in pixels
    #[argh(option, default = "1920")]
    width: u32,

    /// image height in pixels
    #[argh(option, default = "1080")]
    height: u32,

    /// write .bin files instead of .txt
    #[argh(switch, short = 'b')]
    binary: bool,
}

fn parse_trajectory_type(value: &str) -> Result<TrajectoryType, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("Unsupported trajectory type: {value}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config: TrajectoryConfig = match &args.config {
        Some(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
        None => TrajectoryConfig::default(),
    };
    if let Some(trajectory_type) = args.trajectory {
        config.trajectory_type = trajectory_type;
    }

    let report = trajectory::validate_config(&config);
    for warning in &report.warnings {
        log::warn!("trajectory: {warning}");
    }

    let viewpoints = trajectory::try_generate_viewpoints(&config)?;
    log::info!(
        "generated {} viewpoints, average overlap {:.2}",
        viewpoints.len(),
        trajectory::calculate_average_overlap(&viewpoints, args.fov)
    );

    let intrinsics = CameraIntrinsics::from_fov(args.fov, args.width, args.height, CameraModel::Pinhole);
    let intrinsics_report = intrinsics.validate_for_training();
    if !intrinsics_report.is_valid {
        return Err("invalid camera intrinsics".into());
    }

    let cameras = vec![colmap::create_camera(&intrinsics, 1)];
    let images = colmap::create_images_from_viewpoints(
        &viewpoints,
        colmap::IMAGE_PREFIX,
        colmap::IMAGE_EXTENSION,
    );

    let format = if args.binary {
        colmap::ColmapFormat::Binary
    } else {
        colmap::ColmapFormat::Text
    };
    let layout = colmap::write_dataset(&args.output, &cameras, &images, &[], format)?;

    // camera path preview, not part of the sparse model
    let path_points = colmap::camera_path_pointcloud(&viewpoints, config.focus_point);
    ply::write_point_cloud(
        layout.sparse.join("points3D.ply"),
        &path_points,
        ply::PlyEncoding::BinaryLittleEndian,
    )?;

    println!(
        "Wrote {} images to {}",
        images.len(),
        layout.root.display()
    );

    Ok(())
}
