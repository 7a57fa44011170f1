use argh::FromArgs;
use std::path::PathBuf;

use splatcap::depth::{
    self, validation::validate_depth, visualization::depth_visualization, DepthExportConfig,
};

#[derive(FromArgs)]
/// Linearize a dumped reversed-Z depth buffer and export it
struct Args {
    /// raw little-endian f32 device depth buffer
    #[argh(option, short = 'i')]
    input: PathBuf,

    /// output file
    #[argh(option, short = 'o')]
    output: PathBuf,

    /// buffer width in pixels
    #[argh(option)]
    width: usize,

    /// buffer height in pixels
    #[argh(option)]
    height: usize,

    /// export config as JSON
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// also write a turbo colorized preview png
    #[argh(option)]
    preview: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config: DepthExportConfig = match &args.config {
        Some(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
        None => DepthExportConfig::default(),
    };

    let bytes = std::fs::read(&args.input)?;
    let buffer = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect::<Vec<_>>();

    let depth_map = depth::linearize_depth(&buffer, args.width, args.height, &config)?;

    let report = validate_depth(&depth_map);
    for warning in &report.warnings {
        log::warn!("{warning}");
    }

    let written = depth::save_depth(&depth_map, &args.output, config.format)?;
    println!(
        "Wrote {}x{} depth ({} to {} {}) to {}",
        depth_map.width,
        depth_map.height,
        depth_map.min_depth,
        depth_map.max_depth,
        depth_map.units(),
        written.display()
    );

    if let Some(preview) = args.preview {
        let rgb = depth_visualization(&depth_map, true);
        let file = std::io::BufWriter::new(std::fs::File::create(preview)?);
        let mut encoder = png::Encoder::new(file, depth_map.width as u32, depth_map.height as u32);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.write_header()?.write_image_data(&rgb)?;
    }

    Ok(())
}
