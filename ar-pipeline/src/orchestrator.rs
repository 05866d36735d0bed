use crate::{
    projection_matrix, view_matrix, EyeSpaceHandedness, PoseFailure, PoseSource, Renderer,
    VideoError, VideoSource,
};
use ar_core::nalgebra::Matrix4;
use ar_core::CameraIntrinsics;
use log::*;
use std::time::{Duration, Instant};

/// The stage the pipeline is in within the current tick. One full cycle per
/// video frame:
///
/// `Idle → ExtractingFeatures → Matching → SolvingPose →
/// (PoseAvailable | PoseUnavailable) → Rendering → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    Idle,
    ExtractingFeatures,
    Matching,
    SolvingPose,
    PoseAvailable,
    PoseUnavailable,
    Rendering,
}

/// The mutable state threaded through the stages of one tick. Everything
/// the loop shares between stages lives here explicitly, passed by
/// reference, rather than in ambient globals.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub stage: TickStage,
    /// Number of frames pulled from the video source so far.
    pub frame_index: u64,
    /// View matrix of the most recent successful tick. Only valid while
    /// `stage` is `PoseAvailable` or `Rendering` within the same tick.
    pub view: Matrix4<f64>,
    /// Projection derived from the intrinsics at startup; fixed thereafter
    /// as long as the screen size does not change.
    pub projection: Matrix4<f64>,
}

impl PipelineContext {
    pub(crate) fn enter(&mut self, stage: TickStage) {
        trace!("tick {}: {:?}", self.frame_index, stage);
        self.stage = stage;
    }
}

/// What the loop does when the video source runs out of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfStreamPolicy {
    /// Terminate the loop.
    Stop,
    /// Seek back to the first frame and keep playing.
    Restart,
}

/// The result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Background and overlay were both drawn.
    Rendered,
    /// The background video plane was drawn but the overlay was skipped.
    BackgroundOnly(SkipReason),
    /// The video source is exhausted.
    EndOfStream,
}

/// Why a tick skipped the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// The frame had no pixels to track in.
    EmptyFrame,
    /// Within the configured warm-up period after startup.
    WarmingUp,
    /// Pose estimation failed for this frame.
    Pose(PoseFailure),
}

/// Loop configuration.
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    /// The playback rate the loop paces itself to.
    pub target_fps: f64,
    pub end_of_stream: EndOfStreamPolicy,
    /// Playback time before the first overlay draw; lets the video settle
    /// before pose estimation starts being displayed.
    pub start_render_after: Duration,
    /// Output surface size in pixels, for the projection matrix.
    pub screen_width: u32,
    pub screen_height: u32,
    /// Eye-space convention of the attached renderer.
    pub handedness: EyeSpaceHandedness,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_fps: 29.99,
            end_of_stream: EndOfStreamPolicy::Stop,
            start_render_after: Duration::from_millis(500),
            screen_width: 1280,
            screen_height: 720,
            handedness: EyeSpaceHandedness::RightHanded,
        }
    }
}

/// Drives the per-frame pipeline: pulls a frame, hands it to the pose
/// source, converts any recovered pose into the view matrix, and calls the
/// renderer. All stages run synchronously on the calling thread; the loop
/// accepts variable per-frame latency instead of pipelining.
///
/// A tick that fails pose estimation still draws the background and then
/// continues; only end-of-stream (under the [`Stop`](EndOfStreamPolicy::Stop)
/// policy), a user quit request, or a video source error end the loop.
pub struct Orchestrator<V, R, P> {
    video: V,
    renderer: R,
    source: P,
    config: LoopConfig,
    context: PipelineContext,
    playback: Duration,
}

impl<V, R, P> Orchestrator<V, R, P>
where
    V: VideoSource,
    R: Renderer,
    P: PoseSource,
{
    pub fn new(
        video: V,
        renderer: R,
        source: P,
        intrinsics: &CameraIntrinsics,
        config: LoopConfig,
    ) -> Self {
        let projection = projection_matrix(
            intrinsics,
            config.screen_width,
            config.screen_height,
            config.handedness,
        );
        Self {
            video,
            renderer,
            source,
            config,
            context: PipelineContext {
                stage: TickStage::Idle,
                frame_index: 0,
                view: Matrix4::identity(),
                projection,
            },
            playback: Duration::ZERO,
        }
    }

    /// Runs ticks until the user quits or the stream ends under the
    /// [`Stop`](EndOfStreamPolicy::Stop) policy.
    pub fn run(&mut self) -> Result<(), VideoError> {
        loop {
            if self.renderer.quit_requested() {
                info!("quit requested after {} frames", self.context.frame_index);
                return Ok(());
            }
            let tick_started = Instant::now();
            match self.tick()? {
                TickOutcome::EndOfStream => match self.config.end_of_stream {
                    EndOfStreamPolicy::Stop => {
                        info!("end of stream after {} frames", self.context.frame_index);
                        return Ok(());
                    }
                    EndOfStreamPolicy::Restart => {
                        debug!("end of stream, restarting playback");
                        self.video.rewind()?;
                        continue;
                    }
                },
                TickOutcome::BackgroundOnly(reason) => {
                    debug!(
                        "tick {}: overlay skipped: {:?}",
                        self.context.frame_index, reason
                    );
                }
                TickOutcome::Rendered => {}
            }
            self.pace(tick_started.elapsed());
        }
    }

    /// Executes one full pipeline cycle for the next video frame.
    pub fn tick(&mut self) -> Result<TickOutcome, VideoError> {
        self.context.enter(TickStage::Idle);
        let Some(frame) = self.video.read_frame()? else {
            return Ok(TickOutcome::EndOfStream);
        };
        self.context.frame_index += 1;

        let overlay = if frame.width() == 0 || frame.height() == 0 {
            Err(SkipReason::EmptyFrame)
        } else if self.playback < self.config.start_render_after {
            Err(SkipReason::WarmingUp)
        } else {
            self.source
                .estimate(&frame, &mut self.context)
                .map_err(SkipReason::Pose)
        };

        let outcome = match overlay {
            Ok(pose) => {
                self.context.enter(TickStage::PoseAvailable);
                self.context.view = view_matrix(&pose, self.config.handedness);
                self.context.enter(TickStage::Rendering);
                self.renderer.draw_background(&frame);
                self.renderer
                    .draw_overlay(&self.context.view, &self.context.projection);
                TickOutcome::Rendered
            }
            Err(reason) => {
                if let SkipReason::Pose(_) = reason {
                    self.context.enter(TickStage::PoseUnavailable);
                }
                self.context.enter(TickStage::Rendering);
                self.renderer.draw_background(&frame);
                TickOutcome::BackgroundOnly(reason)
            }
        };
        self.renderer.present();
        self.context.enter(TickStage::Idle);
        Ok(outcome)
    }

    /// Sleeps out the remainder of the frame budget. A tick that ran over
    /// budget is simply late; frames are never dropped to catch up.
    fn pace(&mut self, elapsed: Duration) {
        let budget = Duration::from_secs_f64(1.0 / self.config.target_fps);
        if elapsed < budget {
            std::thread::sleep(budget - elapsed);
        }
        self.playback += budget.max(elapsed);
    }

    /// The context of the current tick, mainly for inspection in tests.
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// The renderer collaborator, for inspection after the loop ends.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}
