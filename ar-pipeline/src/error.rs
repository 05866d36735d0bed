use crate::VideoError;
use planar_pnp::PnpError;
use thiserror::Error;

/// Fatal failures during startup. The system cannot run without its
/// reference asset or its video source, so these abort the process with a
/// diagnostic instead of being retried.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load reference image")]
    ReferenceImage(#[from] image::ImageError),
    #[error("reference image produced no features to track against")]
    FeaturelessReference,
    #[error("video source failed")]
    Video(#[from] VideoError),
}

/// The reasons one tick could not produce a pose. All of these are
/// contained within the tick that raised them: the background still renders,
/// the overlay is skipped, and the next frame starts fresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseFailure {
    /// The frame produced no detectable keypoints.
    NoFrameFeatures,
    /// Matching against the reference produced no correspondences.
    NoMatches,
    /// The marker detector found no marker in the frame.
    NoMarker,
    /// The pose solver rejected the correspondences.
    Solve(PnpError),
}
