//! This crate solves camera pose estimation for a known planar reference
//! given a set of 3d points on the reference plane and their corresponding
//! normalized image coordinates.
//!
//! This problem is generally known as
//! ["Perspective-n-Point" (PnP)](https://en.wikipedia.org/wiki/Perspective-n-Point).
//! Because the reference is planar, the minimal solver here is not a general
//! P3P: four correspondences determine a plane-induced homography by the
//! direct linear transform, and the homography decomposes in closed form
//! into the rotation and translation of the plane relative to the camera.
//!
//! Real correspondence sets produced by descriptor matching contain
//! mismatches, so the primary entry point is [`RobustPlanarPnp`], a
//! RANSAC-style estimator: it repeatedly hypothesizes a pose from a minimal
//! random subset, scores every correspondence by reprojection error under
//! that hypothesis, keeps the hypothesis with the largest inlier set, and
//! refits on all inliers. The non-robust fit is exposed as
//! [`solve_least_squares`] for callers that know their data is clean.
//!
//! All failure modes are distinct, recoverable values of [`PnpError`]; a
//! caller that drives a frame loop should treat any of them as "no pose this
//! tick" rather than an abort.

mod decompose;
mod homography;

pub use decompose::pose_from_homography;
pub use homography::dlt_homography;

use ar_core::nalgebra::Point2;
use ar_core::sample_consensus::{Estimator, Model};
use ar_core::{CameraIntrinsics, PlanePoint, PointCorrespondence, ReferenceToCamera};
use log::*;
use rand::Rng;
use thiserror::Error;

/// Perpendicular distances below this fraction of the point spread are
/// treated as collinear.
const COLLINEARITY_EPSILON: f64 = 1e-9;

/// The reasons a pose cannot be recovered from a correspondence set. Each is
/// a recoverable per-tick outcome, not a programming error.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PnpError {
    /// Fewer correspondences than the minimal sample requires.
    #[error("need at least {required} correspondences, got {got}")]
    InsufficientCorrespondences { got: usize, required: usize },
    /// The supplied points do not span the reference plane (collinear or
    /// coincident), so no finite pose explains them uniquely.
    #[error("degenerate correspondence geometry")]
    DegenerateGeometry,
    /// No hypothesis reached the required inlier ratio.
    #[error("no consensus: best inlier ratio {best:.2} below required {required:.2}")]
    NoConsensus { best: f64, required: f64 },
}

/// Minimal-sample pose estimator from four planar correspondences, usable
/// with any `sample_consensus` consensus process.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarDlt;

impl PlanarDlt {
    pub fn new() -> Self {
        Self
    }
}

impl Estimator<PointCorrespondence> for PlanarDlt {
    type Model = ReferenceToCamera;
    type ModelIter = Option<ReferenceToCamera>;
    const MIN_SAMPLES: usize = 4;

    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = PointCorrespondence> + Clone,
    {
        let correspondences: Vec<PointCorrespondence> = data.collect();
        dlt_homography(&correspondences).and_then(|h| pose_from_homography(&h))
    }
}

/// Configuration of the robust solver.
#[derive(Debug, Clone, Copy)]
pub struct PnpConfig {
    /// Number of minimal-sample hypotheses to try.
    pub max_iterations: usize,
    /// Maximum reprojection error, in normalized image coordinates, for a
    /// correspondence to count as an inlier.
    pub inlier_threshold: f64,
    /// Minimum fraction of correspondences that must be inliers of the best
    /// hypothesis for the solve to succeed.
    pub min_inlier_ratio: f64,
}

impl PnpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expresses the inlier threshold in pixels of the given camera instead
    /// of normalized coordinates.
    #[must_use]
    pub fn pixel_threshold(self, pixels: f64, intrinsics: &CameraIntrinsics) -> Self {
        Self {
            inlier_threshold: pixels / intrinsics.mean_focal(),
            ..self
        }
    }
}

impl Default for PnpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 256,
            inlier_threshold: 5e-3,
            min_inlier_ratio: 0.5,
        }
    }
}

/// A successfully recovered pose along with its consensus set.
#[derive(Debug, Clone)]
pub struct PnpSolution {
    pub pose: ReferenceToCamera,
    /// Indices into the input correspondence slice that agree with the pose.
    pub inliers: Vec<usize>,
    /// `inliers.len()` over the input length.
    pub inlier_ratio: f64,
}

/// RANSAC-style outlier-robust planar pose solver.
///
/// The random number generator is supplied by the caller so that runs can be
/// made deterministic with a seeded generator.
#[derive(Debug, Clone)]
pub struct RobustPlanarPnp<R> {
    config: PnpConfig,
    rng: R,
}

impl<R: Rng> RobustPlanarPnp<R> {
    pub fn new(config: PnpConfig, rng: R) -> Self {
        Self { config, rng }
    }

    /// Recovers the pose of the reference plane from correspondences that
    /// may contain mismatches.
    ///
    /// At least 4 correspondences whose plane points are not all collinear
    /// are required. On success the pose is refit on the full consensus set.
    pub fn solve(&mut self, data: &[PointCorrespondence]) -> Result<PnpSolution, PnpError> {
        let n = data.len();
        if n < PlanarDlt::MIN_SAMPLES {
            return Err(PnpError::InsufficientCorrespondences {
                got: n,
                required: PlanarDlt::MIN_SAMPLES,
            });
        }
        if !spans_plane(data) {
            return Err(PnpError::DegenerateGeometry);
        }

        let estimator = PlanarDlt::new();
        let mut best_inliers: Vec<usize> = Vec::new();
        let mut best_pose: Option<ReferenceToCamera> = None;
        for _ in 0..self.config.max_iterations {
            let sample = sample_indices(&mut self.rng, n, PlanarDlt::MIN_SAMPLES);
            let sample_data: Vec<PointCorrespondence> =
                sample.iter().map(|&i| data[i]).collect();
            if sample_is_degenerate(&sample_data) {
                continue;
            }
            let Some(pose) = estimator.estimate(sample_data.iter().copied()) else {
                continue;
            };
            let inliers = consensus(&pose, data, self.config.inlier_threshold);
            if inliers.len() > best_inliers.len() {
                best_inliers = inliers;
                best_pose = Some(pose);
                // A hypothesis explaining everything cannot be beaten.
                if best_inliers.len() == n {
                    break;
                }
            }
        }

        let best_ratio = best_inliers.len() as f64 / n as f64;
        let no_consensus = PnpError::NoConsensus {
            best: best_ratio,
            required: self.config.min_inlier_ratio,
        };
        let Some(best_pose) = best_pose else {
            return Err(no_consensus);
        };
        if best_ratio < self.config.min_inlier_ratio {
            debug!(
                "consensus failed: best inlier ratio {:.3} of {} correspondences",
                best_ratio, n
            );
            return Err(no_consensus);
        }

        // Refit on the full consensus set; keep the hypothesis if the refit
        // runs into a degenerate inlier configuration or loses support.
        let inlier_data: Vec<PointCorrespondence> =
            best_inliers.iter().map(|&i| data[i]).collect();
        let refit = solve_least_squares(&inlier_data).unwrap_or(best_pose);
        let refit_inliers = consensus(&refit, data, self.config.inlier_threshold);
        let (pose, inliers) = if refit_inliers.len() >= best_inliers.len() {
            (refit, refit_inliers)
        } else {
            (best_pose, best_inliers)
        };

        let inlier_ratio = inliers.len() as f64 / n as f64;
        trace!(
            "pose recovered with {}/{} inliers",
            inliers.len(),
            n
        );
        Ok(PnpSolution {
            pose,
            inliers,
            inlier_ratio,
        })
    }
}

/// The naive non-robust fit: a least-squares homography over every
/// correspondence, decomposed into a pose. A single gross mismatch can drag
/// the estimate arbitrarily far from the truth, which is what
/// [`RobustPlanarPnp`] exists to prevent.
pub fn solve_least_squares(data: &[PointCorrespondence]) -> Result<ReferenceToCamera, PnpError> {
    if data.len() < PlanarDlt::MIN_SAMPLES {
        return Err(PnpError::InsufficientCorrespondences {
            got: data.len(),
            required: PlanarDlt::MIN_SAMPLES,
        });
    }
    if !spans_plane(data) {
        return Err(PnpError::DegenerateGeometry);
    }
    dlt_homography(data)
        .and_then(|h| pose_from_homography(&h))
        .ok_or(PnpError::DegenerateGeometry)
}

/// Collects the indices whose reprojection error under `pose` is within the
/// threshold.
fn consensus(
    pose: &ReferenceToCamera,
    data: &[PointCorrespondence],
    threshold: f64,
) -> Vec<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, correspondence)| pose.residual(correspondence) < threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Sample `k` distinct indices from `0..n` with a partial Fisher-Yates
/// shuffle.
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

/// Whether the plane points of the correspondences actually span the plane,
/// i.e. are neither all coincident nor all collinear.
fn spans_plane(data: &[PointCorrespondence]) -> bool {
    let points: Vec<PlanePoint> = data.iter().map(|c| c.1).collect();
    let origin = points[0].0.xy();
    // The farthest point from the first defines the candidate line.
    let Some(farthest) = points
        .iter()
        .map(|p| p.0.xy())
        .max_by(|a, b| {
            (a - origin)
                .norm_squared()
                .total_cmp(&(b - origin).norm_squared())
        })
    else {
        return false;
    };
    let span = farthest - origin;
    let spread = span.norm();
    if spread < COLLINEARITY_EPSILON {
        return false;
    }
    let direction = span / spread;
    points.iter().any(|p| {
        let offset = p.0.xy() - origin;
        let along = offset.dot(&direction);
        let perpendicular = (offset - along * direction).norm();
        perpendicular > COLLINEARITY_EPSILON * spread.max(1.0)
    })
}

/// Whether any three of the four sampled plane points are (nearly)
/// collinear, which makes the homography underdetermined.
fn sample_is_degenerate(sample: &[PointCorrespondence]) -> bool {
    let p: Vec<Point2<f64>> = sample.iter().map(|c| c.1 .0.xy()).collect();
    for i in 0..sample.len() {
        for j in i + 1..sample.len() {
            for k in j + 1..sample.len() {
                let a = p[j] - p[i];
                let b = p[k] - p[i];
                let area = (a.x * b.y - a.y * b.x).abs();
                let scale = a.norm().max(b.norm()).max(1.0);
                if area < 1e-9 * scale * scale {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_core::nalgebra::{Rotation3, Vector3};
    use ar_core::NormalizedImagePoint;
    use rand::{rngs::SmallRng, SeedableRng};

    fn ground_truth_pose() -> ReferenceToCamera {
        ReferenceToCamera::from_parts(
            Vector3::new(0.1, -0.2, 2.5),
            Rotation3::from_euler_angles(0.15, -0.1, 0.3),
        )
    }

    fn plane_grid() -> Vec<PlanePoint> {
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..4 {
                points.push(PlanePoint::on_plane(0.2 * i as f64, 0.25 * j as f64));
            }
        }
        points
    }

    fn exact_correspondences(pose: ReferenceToCamera) -> Vec<PointCorrespondence> {
        plane_grid()
            .into_iter()
            .map(|p| PointCorrespondence(pose.project(p).unwrap(), p))
            .collect()
    }

    #[test]
    fn too_few_correspondences() {
        let mut solver = RobustPlanarPnp::new(PnpConfig::new(), SmallRng::seed_from_u64(0));
        let data = exact_correspondences(ground_truth_pose());
        let result = solver.solve(&data[..3]);
        assert_eq!(
            result.unwrap_err(),
            PnpError::InsufficientCorrespondences {
                got: 3,
                required: 4
            }
        );
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let pose = ground_truth_pose();
        let data: Vec<PointCorrespondence> = (0..8)
            .map(|i| {
                let p = PlanePoint::on_plane(0.1 * i as f64, 0.2 * i as f64);
                PointCorrespondence(pose.project(p).unwrap(), p)
            })
            .collect();
        let mut solver = RobustPlanarPnp::new(PnpConfig::new(), SmallRng::seed_from_u64(0));
        assert_eq!(solver.solve(&data).unwrap_err(), PnpError::DegenerateGeometry);
    }

    #[test]
    fn random_correspondences_find_no_consensus() {
        let mut rng = SmallRng::seed_from_u64(99);
        let data: Vec<PointCorrespondence> = (0..24)
            .map(|_| {
                PointCorrespondence(
                    NormalizedImagePoint(Point2::new(
                        rng.gen_range(-0.5..0.5),
                        rng.gen_range(-0.5..0.5),
                    )),
                    PlanePoint::on_plane(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)),
                )
            })
            .collect();
        let mut solver = RobustPlanarPnp::new(PnpConfig::new(), SmallRng::seed_from_u64(1));
        match solver.solve(&data) {
            Err(PnpError::NoConsensus { .. }) => {}
            other => panic!("expected NoConsensus, got {other:?}"),
        }
    }
}
