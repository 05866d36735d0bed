use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Point2, Point3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A point in normalized image coordinates. This point has been corrected
/// for lens distortion and normalized based on the camera intrinsic matrix,
/// so it lies on the virtual image plane at depth `1.0` in front of the
/// optical center.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NormalizedImagePoint(pub Point2<f64>);

impl NormalizedImagePoint {
    /// Get the virtual image point as a [`Point3`].
    ///
    /// The virtual image point is the point that is formed on the virtual
    /// image plane at a depth `1.0` in front of the camera.
    pub fn virtual_image_point(self) -> Point3<f64> {
        self.0.coords.push(1.0).into()
    }

    /// Retrieve the unnormalized bearing of the observation.
    pub fn bearing_unnormalized(self) -> Vector3<f64> {
        self.0.coords.push(1.0)
    }
}

/// A 3d point expressed in the local frame of the planar reference. The
/// reference lies on the plane `z = 0` in its own coordinates, so the `z`
/// component is zero for every point that actually belongs to the reference.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PlanePoint(pub Point3<f64>);

impl PlanePoint {
    /// Creates a point on the reference plane from its planar coordinates.
    pub fn on_plane(x: f64, y: f64) -> Self {
        Self(Point3::new(x, y, 0.0))
    }
}
