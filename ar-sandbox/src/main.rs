use ar_core::nalgebra::{Matrix4, Point2, Vector2};
use ar_core::{CameraIntrinsics, Distortion};
use ar_pipeline::{
    EndOfStreamPolicy, EyeSpaceHandedness, FeatureMatchSource, LoopConfig, MatchConfig,
    Orchestrator, Renderer, VideoError, VideoSource,
};
use fast_brief::FastBrief;
use image::DynamicImage;
use log::*;
use planar_pnp::{PnpConfig, RobustPlanarPnp};
use rand::{rngs::SmallRng, SeedableRng};
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

#[derive(StructOpt, Clone)]
#[structopt(
    name = "ar-sandbox",
    about = "A tool for testing planar AR tracking on image sequences"
)]
struct Opt {
    /// The reference image the overlay is anchored to.
    #[structopt(short, long)]
    reference: PathBuf,
    /// The x focal length in pixels
    #[structopt(long, default_value = "959.562")]
    x_focal: f64,
    /// The y focal length in pixels
    #[structopt(long, default_value = "958.127")]
    y_focal: f64,
    /// The x optical center coordinate
    #[structopt(long, default_value = "625.232")]
    x_center: f64,
    /// The y optical center coordinate
    #[structopt(long, default_value = "357.149")]
    y_center: f64,
    /// The K1 radial distortion
    #[structopt(long, default_value = "0.0")]
    k1: f64,
    /// The K2 radial distortion
    #[structopt(long, default_value = "0.0")]
    k2: f64,
    /// Output surface width in pixels
    #[structopt(long, default_value = "1280")]
    width: u32,
    /// Output surface height in pixels
    #[structopt(long, default_value = "720")]
    height: u32,
    /// Playback rate the loop paces itself to
    #[structopt(long, default_value = "29.99")]
    fps: f64,
    /// FAST detector threshold
    #[structopt(long, default_value = "20")]
    fast_threshold: u8,
    /// Inlier threshold of the robust solver, in pixels
    #[structopt(long, default_value = "3.0")]
    inlier_pixels: f64,
    /// Loop playback instead of stopping at the last frame
    #[structopt(long)]
    repeat: bool,
    /// List of frame image files, in playback order
    #[structopt(parse(from_os_str))]
    frames: Vec<PathBuf>,
}

/// Plays a list of image files as a video stream.
struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl VideoSource for ImageSequence {
    fn read_frame(&mut self) -> Result<Option<DynamicImage>, VideoError> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let frame = image::open(path)?;
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<(), VideoError> {
        self.cursor = 0;
        Ok(())
    }
}

/// Headless stand-in for a GL renderer: logs the matrices it would upload.
#[derive(Default)]
struct LogRenderer {
    ticks: u64,
    overlays: u64,
}

impl Renderer for LogRenderer {
    fn draw_background(&mut self, frame: &DynamicImage) {
        trace!("background {}x{}", frame.width(), frame.height());
    }

    fn draw_overlay(&mut self, view: &Matrix4<f64>, _projection: &Matrix4<f64>) {
        self.overlays += 1;
        debug!(
            "overlay at translation [{:.3}, {:.3}, {:.3}]",
            view[(0, 3)],
            view[(1, 3)],
            view[(2, 3)]
        );
    }

    fn present(&mut self) {
        self.ticks += 1;
    }

    fn quit_requested(&mut self) -> bool {
        false
    }
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    // Fill intrinsics from args. These default to the calibration of the
    // camera the sample footage was captured with.
    let intrinsics = CameraIntrinsics::identity()
        .focals(Vector2::new(opt.x_focal, opt.y_focal))
        .principal_point(Point2::new(opt.x_center, opt.y_center))
        .distortion(Distortion::radial(opt.k1, opt.k2, 0.0))
        .clip_planes(0.00001, 10000.0);

    let solver = RobustPlanarPnp::new(
        PnpConfig::new().pixel_threshold(opt.inlier_pixels, &intrinsics),
        SmallRng::seed_from_u64(5),
    );
    let source = FeatureMatchSource::from_reference_path(
        &opt.reference,
        FastBrief::new(opt.fast_threshold),
        intrinsics,
        MatchConfig::default(),
        solver,
    )
    .expect("failed to prepare reference image");

    let video = ImageSequence {
        paths: opt.frames.clone(),
        cursor: 0,
    };
    let config = LoopConfig {
        target_fps: opt.fps,
        end_of_stream: if opt.repeat {
            EndOfStreamPolicy::Restart
        } else {
            EndOfStreamPolicy::Stop
        },
        start_render_after: Duration::from_millis(500),
        screen_width: opt.width,
        screen_height: opt.height,
        handedness: EyeSpaceHandedness::RightHanded,
    };

    let mut orchestrator = Orchestrator::new(video, LogRenderer::default(), source, &intrinsics, config);
    info!("tracking {} frames", opt.frames.len());
    if let Err(e) = orchestrator.run() {
        error!("video source failed: {}", e);
        std::process::exit(1);
    }
}
