use crate::{ImagePoint, KeyPoint, NormalizedImagePoint};
use nalgebra::{Matrix3, Point2, Vector2};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Number of fixed-point iterations used to invert the distortion model.
const UNDISTORT_ITERATIONS: usize = 5;

/// Brown-Conrady lens distortion coefficients: three radial terms and two
/// tangential terms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub p1: f64,
    pub p2: f64,
}

impl Distortion {
    /// Radial-only distortion, which is sufficient for most webcams.
    pub fn radial(k1: f64, k2: f64, k3: f64) -> Self {
        Self {
            k1,
            k2,
            k3,
            ..Self::default()
        }
    }

    fn is_zero(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.k3 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0
    }

    /// Applies the forward distortion model to an undistorted normalized point.
    fn distort(&self, p: Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Vector2::new(x * radial + dx, y * radial + dy)
    }

    /// Inverts the distortion model with a fixed-point iteration.
    fn undistort(&self, distorted: Vector2<f64>) -> Vector2<f64> {
        let mut p = distorted;
        for _ in 0..UNDISTORT_ITERATIONS {
            let (x, y) = (p.x, p.y);
            let r2 = x * x + y * y;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            p = Vector2::new((distorted.x - dx) / radial, (distorted.y - dy) / radial);
        }
        p
    }
}

/// The fixed internal parameters of one physical camera as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters),
/// together with its lens distortion and the near/far clip planes used when
/// deriving a perspective projection from the calibration.
///
/// These values are immutable for the lifetime of a run. They are shared
/// read-only by the pose solver (to normalize observations) and the
/// projection builder (to derive the rendering projection matrix).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub distortion: Distortion,
    pub near: f64,
    pub far: f64,
}

impl CameraIntrinsics {
    /// Creates camera intrinsics that would create an identity intrinsic
    /// matrix with no distortion.
    pub fn identity() -> Self {
        Self {
            focals: Vector2::new(1.0, 1.0),
            principal_point: Point2::new(0.0, 0.0),
            distortion: Distortion::default(),
            near: 1e-5,
            far: 1e4,
        }
    }

    pub fn focals(self, focals: Vector2<f64>) -> Self {
        Self { focals, ..self }
    }

    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    pub fn distortion(self, distortion: Distortion) -> Self {
        Self { distortion, ..self }
    }

    pub fn clip_planes(self, near: f64, far: f64) -> Self {
        Self { near, far, ..self }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  0.0,            self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }

    /// Takes in a point from an image in pixel coordinates and converts it
    /// to a [`NormalizedImagePoint`], removing lens distortion in the
    /// process.
    pub fn calibrate<P>(&self, point: P) -> NormalizedImagePoint
    where
        P: ImagePoint,
    {
        let centered = point.image_point() - self.principal_point;
        let distorted = Vector2::new(centered.x / self.focals.x, centered.y / self.focals.y);
        let undistorted = if self.distortion.is_zero() {
            distorted
        } else {
            self.distortion.undistort(distorted)
        };
        NormalizedImagePoint(undistorted.into())
    }

    /// Converts a [`NormalizedImagePoint`] back into pixel coordinates,
    /// reapplying lens distortion.
    pub fn uncalibrate(&self, projection: NormalizedImagePoint) -> KeyPoint {
        let distorted = if self.distortion.is_zero() {
            projection.0.coords
        } else {
            self.distortion.distort(projection.0.coords)
        };
        let centered = Point2::new(distorted.x * self.focals.x, distorted.y * self.focals.y);
        KeyPoint(centered + self.principal_point.coords)
    }

    /// The mean of the two focal lengths, used to convert pixel-space
    /// thresholds into normalized-coordinate thresholds.
    pub fn mean_focal(&self) -> f64 {
        0.5 * (self.focals.x + self.focals.y)
    }
}
