//! avatarview - headless avatar renderer CLI
//!
//! Renders the avatar scene offscreen, optionally projecting a photo and
//! applying landmarks/customization from files, then exports a PNG.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use avatarview::{export, pose::Landmark, Customization, Viewer, ViewerConfig};

/// Render a live-driven 3D avatar head and export it as a PNG
#[derive(Parser, Debug)]
#[command(name = "avatarview", version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Photo to project onto the avatar surface
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Landmark set as a JSON array of {x, y[, z]} points
    #[arg(short, long)]
    landmarks: Option<PathBuf>,

    /// Customization as a JSON object
    #[arg(short = 'z', long)]
    customize: Option<PathBuf>,

    /// Output width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Output height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Number of frames to render before exporting
    #[arg(short, long, default_value_t = 12)]
    frames: u32,

    /// Output PNG path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("{} v{}", avatarview::NAME, avatarview::VERSION);

    let config = ViewerConfig::load(args.config.as_deref())?;
    let mut viewer = Viewer::initialize(config, args.width, args.height).await?;

    if let Some(path) = &args.customize {
        let customization: Customization = serde_json::from_slice(&std::fs::read(path)?)?;
        info!("customization: {customization:?}");
        viewer.apply_customization(customization);
    }

    if let Some(path) = &args.landmarks {
        let landmarks: Vec<Landmark> = serde_json::from_slice(&std::fs::read(path)?)?;
        viewer.apply_landmark_set(Some(&landmarks));
    }

    if let Some(path) = &args.image {
        viewer.apply_image_blocking(&std::fs::read(path)?)?;
    }

    for _ in 0..args.frames.max(1) {
        viewer.render_once();
    }
    info!("rendered {} frames", viewer.frames_rendered());

    let png = viewer.export_frame()?;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(export::EXPORT_FILE_NAME));
    std::fs::write(&output, &png)?;
    info!("wrote {} ({} bytes)", output.display(), png.len());

    let leaked = viewer.dispose();
    anyhow::ensure!(leaked == 0, "{leaked} GPU resources leaked at teardown");
    Ok(())
}
