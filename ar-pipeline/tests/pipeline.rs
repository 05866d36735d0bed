use ar_core::nalgebra::{Matrix4, Point2, Rotation3, Vector2, Vector3};
use ar_core::{CameraIntrinsics, ReferenceToCamera};
use ar_pipeline::{
    EndOfStreamPolicy, EyeSpaceHandedness, FeatureMatchSource, LoopConfig, MarkerDetector,
    MarkerSource, MatchConfig, Orchestrator, PipelineContext, PoseFailure, PoseSource, Renderer,
    SkipReason, TickOutcome, TickStage, VideoError, VideoSource,
};
use fast_brief::FastBrief;
use image::{DynamicImage, GrayImage, Luma};
use planar_pnp::{PnpConfig, RobustPlanarPnp};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::time::Duration;

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::identity()
        .focals(Vector2::new(959.562, 958.127))
        .principal_point(Point2::new(625.232, 357.149))
        .clip_planes(0.00001, 10000.0)
}

fn noise_frame(width: u32, height: u32, seed: u64) -> DynamicImage {
    let mut rng = SmallRng::seed_from_u64(seed);
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |_, _| {
        Luma([rng.gen::<u8>()])
    }))
}

fn black_frame(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([0u8])))
}

struct VecVideoSource {
    frames: Vec<DynamicImage>,
    cursor: usize,
}

impl VecVideoSource {
    fn new(frames: Vec<DynamicImage>) -> Self {
        Self { frames, cursor: 0 }
    }
}

impl VideoSource for VecVideoSource {
    fn read_frame(&mut self) -> Result<Option<DynamicImage>, VideoError> {
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<(), VideoError> {
        self.cursor = 0;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingRenderer {
    backgrounds: usize,
    overlays: usize,
    presents: usize,
    quit_polls: usize,
    quit_after_polls: Option<usize>,
}

impl Renderer for RecordingRenderer {
    fn draw_background(&mut self, _frame: &DynamicImage) {
        self.backgrounds += 1;
    }

    fn draw_overlay(&mut self, _view: &Matrix4<f64>, _projection: &Matrix4<f64>) {
        self.overlays += 1;
    }

    fn present(&mut self) {
        self.presents += 1;
    }

    fn quit_requested(&mut self) -> bool {
        self.quit_polls += 1;
        matches!(self.quit_after_polls, Some(limit) if self.quit_polls > limit)
    }
}

fn feature_source(reference: &DynamicImage) -> FeatureMatchSource<SmallRng> {
    let intrinsics = intrinsics();
    let solver = RobustPlanarPnp::new(
        PnpConfig::new().pixel_threshold(3.0, &intrinsics),
        SmallRng::seed_from_u64(42),
    );
    FeatureMatchSource::from_reference_image(
        reference,
        FastBrief::default(),
        intrinsics,
        MatchConfig::default(),
        solver,
    )
    .expect("reference image must produce features")
}

fn test_config() -> LoopConfig {
    LoopConfig {
        target_fps: 1000.0,
        start_render_after: Duration::ZERO,
        end_of_stream: EndOfStreamPolicy::Stop,
        handedness: EyeSpaceHandedness::RightHanded,
        screen_width: 1280,
        screen_height: 720,
    }
}

/// An all-black frame has no detectable keypoints, which must surface as a
/// pose-unavailable tick, not a crash, and the loop must keep going.
#[test]
fn black_frames_degrade_gracefully() {
    let reference = noise_frame(320, 240, 1);
    let video = VecVideoSource::new(vec![
        black_frame(320, 240),
        black_frame(320, 240),
        black_frame(320, 240),
    ]);
    let mut orchestrator = Orchestrator::new(
        video,
        RecordingRenderer::default(),
        feature_source(&reference),
        &intrinsics(),
        test_config(),
    );

    for _ in 0..3 {
        let outcome = orchestrator.tick().expect("video source cannot fail");
        assert_eq!(
            outcome,
            TickOutcome::BackgroundOnly(SkipReason::Pose(PoseFailure::NoFrameFeatures))
        );
        assert_eq!(orchestrator.context().stage, TickStage::Idle);
    }
    assert_eq!(orchestrator.tick().unwrap(), TickOutcome::EndOfStream);
    // The background video plane rendered every tick; the overlay never did.
    assert_eq!(orchestrator.renderer().backgrounds, 3);
    assert_eq!(orchestrator.renderer().overlays, 0);
    assert_eq!(orchestrator.renderer().presents, 3);
}

/// A frame identical to the reference matches every descriptor exactly, so
/// the full extract-match-solve-render path runs and draws the overlay.
#[test]
fn reference_frame_renders_the_overlay() {
    let reference = noise_frame(320, 240, 2);
    let video = VecVideoSource::new(vec![reference.clone()]);
    let mut orchestrator = Orchestrator::new(
        video,
        RecordingRenderer::default(),
        feature_source(&reference),
        &intrinsics(),
        test_config(),
    );

    assert_eq!(orchestrator.tick().unwrap(), TickOutcome::Rendered);
    assert_eq!(orchestrator.renderer().overlays, 1);
    // The view matrix of the tick is the basis change composed with a pose
    // that keeps the reference plane at unit depth in front of the camera.
    let view = orchestrator.context().view;
    assert!(view[(2, 3)].abs() > 0.5, "reference should sit near unit depth");
}

/// The warm-up window suppresses the overlay while still rendering video.
#[test]
fn warm_up_skips_the_overlay() {
    let reference = noise_frame(320, 240, 3);
    let video = VecVideoSource::new(vec![reference.clone()]);
    let config = LoopConfig {
        start_render_after: Duration::from_secs(3600),
        ..test_config()
    };
    let mut orchestrator = Orchestrator::new(
        video,
        RecordingRenderer::default(),
        feature_source(&reference),
        &intrinsics(),
        config,
    );
    assert_eq!(
        orchestrator.tick().unwrap(),
        TickOutcome::BackgroundOnly(SkipReason::WarmingUp)
    );
}

/// Under the restart policy the loop rewinds at end of stream instead of
/// terminating; a quit request is what finally stops it.
#[test]
fn restart_policy_loops_playback() {
    let frames = vec![black_frame(64, 64), black_frame(64, 64)];
    let video = VecVideoSource::new(frames);
    let renderer = RecordingRenderer {
        quit_after_polls: Some(7),
        ..Default::default()
    };
    let config = LoopConfig {
        end_of_stream: EndOfStreamPolicy::Restart,
        ..test_config()
    };
    let reference = noise_frame(320, 240, 4);
    let mut orchestrator = Orchestrator::new(
        video,
        renderer,
        feature_source(&reference),
        &intrinsics(),
        config,
    );
    orchestrator.run().expect("run must terminate cleanly");
    assert!(
        orchestrator.context().frame_index > 2,
        "playback should have wrapped past the stream length"
    );
}

struct StaticMarkerDetector {
    corners: [Point2<f64>; 4],
}

impl MarkerDetector for StaticMarkerDetector {
    fn detect(&mut self, _frame: &DynamicImage) -> Option<[Point2<f64>; 4]> {
        Some(self.corners)
    }
}

/// The marker pose source recovers the pose that projected the marker's
/// corners into the frame.
#[test]
fn marker_source_recovers_the_projecting_pose() {
    let intrinsics = intrinsics();
    let side_length = 0.07;
    let half = side_length / 2.0;
    let truth = ReferenceToCamera::from_parts(
        Vector3::new(0.05, -0.02, 0.6),
        Rotation3::from_euler_angles(0.2, -0.1, 0.15),
    );

    let plane_corners = [
        (-half, -half),
        (half, -half),
        (half, half),
        (-half, half),
    ];
    let corners = plane_corners.map(|(x, y)| {
        let projected = truth
            .project(ar_core::PlanePoint::on_plane(x, y))
            .expect("marker in front of camera");
        intrinsics.uncalibrate(projected).0
    });

    let mut source = MarkerSource::new(StaticMarkerDetector { corners }, intrinsics, side_length);
    let mut context = PipelineContext {
        stage: TickStage::Idle,
        frame_index: 0,
        view: Matrix4::identity(),
        projection: Matrix4::identity(),
    };
    let pose = source
        .estimate(&black_frame(64, 64), &mut context)
        .expect("marker pose must solve");

    assert!((pose.translation() - truth.translation()).norm() < 1e-6);
    let relative = pose.rotation().transpose() * truth.rotation();
    let angle = ((relative.matrix().trace() - 1.0) * 0.5)
        .clamp(-1.0, 1.0)
        .acos();
    assert!(angle < 1e-6, "rotation error {angle}");
}
