use crate::{
    match_descriptors, MarkerDetector, MatchConfig, PipelineContext, PoseFailure, StartupError,
    TickStage,
};
use ar_core::{
    CameraIntrinsics, ImagePoint, KeyPoint, PlanePoint, PointCorrespondence, ReferenceToCamera,
};
use bitarray::BitArray;
use fast_brief::{FastBrief, DESCRIPTOR_BYTES};
use image::DynamicImage;
use log::*;
use planar_pnp::{solve_least_squares, RobustPlanarPnp};
use rand::Rng;
use std::path::Path;

/// A strategy for recovering the reference pose from one frame.
///
/// Two strategies exist: matching feature descriptors against a textured
/// reference image, and detecting a fiducial marker of known physical size.
/// Both feed the same downstream view-matrix construction, so the frame loop
/// is written once against this trait and the strategy is chosen by
/// configuration.
pub trait PoseSource {
    fn estimate(
        &mut self,
        frame: &DynamicImage,
        context: &mut PipelineContext,
    ) -> Result<ReferenceToCamera, PoseFailure>;
}

/// Recovers pose by matching binary descriptors of the live frame against a
/// textured reference image.
///
/// The reference is processed exactly once at construction; its keypoints,
/// descriptors, and plane coordinates are read-only for the rest of the run.
/// Frame features are extracted fresh every tick and discarded.
pub struct FeatureMatchSource<R> {
    extractor: FastBrief,
    intrinsics: CameraIntrinsics,
    match_config: MatchConfig,
    solver: RobustPlanarPnp<R>,
    reference_plane_points: Vec<PlanePoint>,
    reference_descriptors: Vec<BitArray<DESCRIPTOR_BYTES>>,
}

impl<R: Rng> FeatureMatchSource<R> {
    /// Extracts the reference features once and fixes the mapping from
    /// reference pixels to reference-plane coordinates.
    ///
    /// The plane coordinates are the keypoint pixel locations divided by
    /// the focal lengths, which places the reference on a unit-depth plane
    /// with a physically plausible scale.
    pub fn from_reference_image(
        reference: &DynamicImage,
        extractor: FastBrief,
        intrinsics: CameraIntrinsics,
        match_config: MatchConfig,
        solver: RobustPlanarPnp<R>,
    ) -> Result<Self, StartupError> {
        let (keypoints, descriptors) = extractor.extract(reference);
        if keypoints.is_empty() {
            return Err(StartupError::FeaturelessReference);
        }
        info!("reference prepared with {} features", keypoints.len());
        let reference_plane_points = keypoints
            .iter()
            .map(|keypoint: &fast_brief::KeyPoint| {
                let p = keypoint.image_point();
                PlanePoint::on_plane(p.x / intrinsics.focals.x, p.y / intrinsics.focals.y)
            })
            .collect();
        Ok(Self {
            extractor,
            intrinsics,
            match_config,
            solver,
            reference_plane_points,
            reference_descriptors: descriptors,
        })
    }

    /// Convenience constructor that loads the reference image from disk.
    pub fn from_reference_path(
        path: impl AsRef<Path>,
        extractor: FastBrief,
        intrinsics: CameraIntrinsics,
        match_config: MatchConfig,
        solver: RobustPlanarPnp<R>,
    ) -> Result<Self, StartupError> {
        let reference = image::open(path)?;
        Self::from_reference_image(&reference, extractor, intrinsics, match_config, solver)
    }
}

impl<R: Rng> PoseSource for FeatureMatchSource<R> {
    fn estimate(
        &mut self,
        frame: &DynamicImage,
        context: &mut PipelineContext,
    ) -> Result<ReferenceToCamera, PoseFailure> {
        context.enter(TickStage::ExtractingFeatures);
        let (frame_keypoints, frame_descriptors) = self.extractor.extract(frame);
        if frame_keypoints.is_empty() {
            return Err(PoseFailure::NoFrameFeatures);
        }

        context.enter(TickStage::Matching);
        let matches = match_descriptors(
            &self.reference_descriptors,
            &frame_descriptors,
            &self.match_config,
        );
        if matches.is_empty() {
            return Err(PoseFailure::NoMatches);
        }

        context.enter(TickStage::SolvingPose);
        let correspondences: Vec<PointCorrespondence> = matches
            .iter()
            .map(|m| {
                PointCorrespondence(
                    self.intrinsics.calibrate(frame_keypoints[m.frame]),
                    self.reference_plane_points[m.reference],
                )
            })
            .collect();
        let solution = self
            .solver
            .solve(&correspondences)
            .map_err(PoseFailure::Solve)?;
        debug!(
            "pose from {} matches with inlier ratio {:.2}",
            correspondences.len(),
            solution.inlier_ratio
        );
        Ok(solution.pose)
    }
}

/// Recovers pose from the four corners of a detected fiducial marker of
/// known side length.
///
/// The marker's own frame puts the origin at its center with x right and y
/// down, matching the detector's corner order (top-left, top-right,
/// bottom-right, bottom-left).
pub struct MarkerSource<D> {
    detector: D,
    intrinsics: CameraIntrinsics,
    corners: [PlanePoint; 4],
}

impl<D: MarkerDetector> MarkerSource<D> {
    pub fn new(detector: D, intrinsics: CameraIntrinsics, side_length: f64) -> Self {
        let half = side_length / 2.0;
        let corners = [
            PlanePoint::on_plane(-half, -half),
            PlanePoint::on_plane(half, -half),
            PlanePoint::on_plane(half, half),
            PlanePoint::on_plane(-half, half),
        ];
        Self {
            detector,
            intrinsics,
            corners,
        }
    }
}

impl<D: MarkerDetector> PoseSource for MarkerSource<D> {
    fn estimate(
        &mut self,
        frame: &DynamicImage,
        context: &mut PipelineContext,
    ) -> Result<ReferenceToCamera, PoseFailure> {
        context.enter(TickStage::ExtractingFeatures);
        let detected = self.detector.detect(frame).ok_or(PoseFailure::NoMarker)?;

        context.enter(TickStage::Matching);
        // The detector's corner order matches the marker frame, so the
        // correspondence is the index pairing itself.
        let correspondences: Vec<PointCorrespondence> = detected
            .iter()
            .zip(self.corners.iter())
            .map(|(&pixel, &plane_point)| {
                PointCorrespondence(
                    self.intrinsics.calibrate(KeyPoint(pixel)),
                    plane_point,
                )
            })
            .collect();

        context.enter(TickStage::SolvingPose);
        let pose = solve_least_squares(&correspondences).map_err(PoseFailure::Solve)?;
        trace!("marker pose at {:?}", pose.translation());
        Ok(pose)
    }
}
