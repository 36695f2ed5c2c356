//! # Hybrid renderer
//!
//! Opens a window and draws the demo scene: a ray-marched sphere and torus
//! composited with rasterized cubes and a ground grid through one shared
//! depth texture. With `--shaders <DIR>` the WGSL programs are loaded from
//! disk and reloaded whenever they change.

mod app;
mod fps;
mod watcher;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use render::camera::{MAX_FOVY, MIN_FOVY};

/// Command line options
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Window and render target width in pixels
    #[arg(long, default_value_t = 800)]
    pub width: u32,
    /// Window and render target height in pixels
    #[arg(long, default_value_t = 450)]
    pub height: u32,
    /// Vertical field of view in degrees, between 1 and 179
    #[arg(long, default_value_t = 45.0, value_parser = parse_fov)]
    pub fov: f32,
    #[arg(long, default_value_t = 60)]
    pub target_fps: u32,
    /// Load shaders from this directory and watch it for changes
    #[arg(long)]
    pub shaders: Option<PathBuf>,
    /// Exit after rendering this many frames
    #[arg(long)]
    pub frames: Option<u64>,
    /// Save the composited image as PNG on exit
    #[arg(long)]
    pub screenshot: Option<PathBuf>,
}

fn parse_fov(s: &str) -> Result<f32, String> {
    let fov: f32 = s.parse().map_err(|e| format!("`{s}` is not a number: {e}"))?;
    if (MIN_FOVY..=MAX_FOVY).contains(&fov) {
        Ok(fov)
    } else {
        Err(format!("field of view must be between {MIN_FOVY} and {MAX_FOVY} degrees"))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    app::run(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_window() {
        let args = Args::parse_from(["hybrid"]);
        assert_eq!((args.width, args.height), (800, 450));
        assert_eq!(args.fov, 45.0);
        assert_eq!(args.target_fps, 60);
        assert!(args.shaders.is_none());
    }

    #[test]
    fn parses_overrides() {
        let args = Args::parse_from([
            "hybrid",
            "--width",
            "320",
            "--fov",
            "90",
            "--frames",
            "3",
            "--screenshot",
            "out.png",
        ]);
        assert_eq!(args.width, 320);
        assert_eq!(args.fov, 90.0);
        assert_eq!(args.frames, Some(3));
        assert_eq!(args.screenshot, Some(PathBuf::from("out.png")));
    }

    #[test]
    fn rejects_degenerate_fov() {
        for fov in ["0", "180", "-5", "NaN", "wide"] {
            let result = Args::try_parse_from(["hybrid", &format!("--fov={fov}")]);
            assert!(result.is_err(), "--fov {fov} was accepted");
        }
        let args = Args::try_parse_from(["hybrid", "--fov=179"]).unwrap();
        assert_eq!(args.fov, 179.0);
    }
}
