use crate::PointCorrespondence;
use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Matrix4, Rotation3, Vector3};
use sample_consensus::Model;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Residual assigned to an observation whose reference point maps behind the
/// camera under a hypothesized pose. Large enough to always be an outlier.
const BEHIND_CAMERA_RESIDUAL: f64 = 1e6;

/// The rigid-body pose of the planar reference relative to the camera. It
/// transforms points in the reference's local frame (`z = 0` plane) into the
/// camera frame, where positive x is right, positive y is down, and positive
/// z is forwards.
///
/// The pose is recomputed every tick from that tick's correspondences and is
/// never persisted across ticks.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ReferenceToCamera(pub IsometryMatrix3<f64>);

impl ReferenceToCamera {
    /// Creates a pose with no change in position or orientation.
    pub fn identity() -> Self {
        Self(IsometryMatrix3::identity())
    }

    /// Create the pose from rotation and translation.
    pub fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self(IsometryMatrix3::from_parts(translation.into(), rotation))
    }

    /// Retrieve the isometry.
    pub fn isometry(self) -> IsometryMatrix3<f64> {
        self.0
    }

    /// Takes the inverse of the pose.
    pub fn inverse(self) -> Self {
        Self(self.0.inverse())
    }

    /// The rotation part of the pose.
    pub fn rotation(self) -> Rotation3<f64> {
        self.0.rotation
    }

    /// The translation part of the pose, in camera space.
    pub fn translation(self) -> Vector3<f64> {
        self.0.translation.vector
    }

    /// Retrieve the homogeneous matrix.
    pub fn homogeneous(self) -> Matrix4<f64> {
        self.0.to_homogeneous()
    }

    /// Projects a reference-plane point into normalized image coordinates.
    /// Returns `None` if the point does not lie in front of the camera.
    pub fn project(self, point: crate::PlanePoint) -> Option<crate::NormalizedImagePoint> {
        let camera = self.0 * point.0;
        if camera.z <= 0.0 {
            return None;
        }
        Some(crate::NormalizedImagePoint(
            (camera.coords.xy() / camera.z).into(),
        ))
    }
}

impl Model<PointCorrespondence> for ReferenceToCamera {
    /// The Euclidean reprojection distance in normalized image coordinates.
    fn residual(&self, data: &PointCorrespondence) -> f64 {
        let &PointCorrespondence(observation, plane_point) = data;
        match self.project(plane_point) {
            Some(projected) => (projected.0 - observation.0).norm(),
            None => BEHIND_CAMERA_RESIDUAL,
        }
    }
}
