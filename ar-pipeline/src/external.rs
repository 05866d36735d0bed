use ar_core::nalgebra::{Matrix4, Point2};
use image::DynamicImage;
use thiserror::Error;

/// Errors produced by a [`VideoSource`].
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("failed to read frame")]
    Io(#[from] std::io::Error),
    #[error("failed to decode frame")]
    Decode(#[from] image::ImageError),
    #[error("video source cannot seek back to the first frame")]
    NotSeekable,
}

/// Supplies video frames to the loop, one per tick.
pub trait VideoSource {
    /// The next frame, or `None` at end of stream.
    fn read_frame(&mut self) -> Result<Option<DynamicImage>, VideoError>;

    /// Seek back to the first frame, used by the
    /// [`Restart`](crate::EndOfStreamPolicy::Restart) end-of-stream policy.
    fn rewind(&mut self) -> Result<(), VideoError>;
}

/// The rendering collaborator. Owns the window, the GL context, shaders,
/// and meshes; the pipeline only hands it the per-frame background image and
/// the view/projection matrices.
pub trait Renderer {
    /// Draw the video frame as the scene background.
    fn draw_background(&mut self, frame: &DynamicImage);

    /// Draw the 3d overlay with the given view and projection. Not called
    /// on ticks where no pose is available.
    fn draw_overlay(&mut self, view: &Matrix4<f64>, projection: &Matrix4<f64>);

    /// Finish the frame (swap buffers, poll window events).
    fn present(&mut self);

    /// Whether the user asked to quit. Checked once per tick boundary.
    fn quit_requested(&mut self) -> bool;
}

/// Detects one known fiducial marker in a frame.
///
/// Implementations wrap whatever marker library is in use; the pipeline only
/// consumes the four detected corners. The corners must be ordered
/// top-left, top-right, bottom-right, bottom-left as seen on the physical
/// marker, in pixel coordinates.
pub trait MarkerDetector {
    fn detect(&mut self, frame: &DynamicImage) -> Option<[Point2<f64>; 4]>;
}
