use ar_core::nalgebra::{DMatrix, Matrix3};
use ar_core::PointCorrespondence;

/// Estimate the homography `H` mapping reference-plane coordinates `(x, y)`
/// to normalized image coordinates `(u, v)` with the direct linear
/// transform, so that `(u, v, 1) ~ H (x, y, 1)`.
///
/// Requires at least 4 correspondences; with more the result is the
/// least-squares fit over all of them. Returns `None` when the design
/// matrix's null space cannot be extracted, which happens for degenerate
/// configurations such as collinear points.
pub fn dlt_homography(correspondences: &[PointCorrespondence]) -> Option<Matrix3<f64>> {
    let n = correspondences.len();
    if n < 4 {
        return None;
    }

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for (i, &PointCorrespondence(observation, plane_point)) in correspondences.iter().enumerate() {
        let x = plane_point.0.x;
        let y = plane_point.0.y;
        let u = observation.0.x;
        let v = observation.0.y;

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // Solve A h = 0 via SVD (null vector of the smallest singular value).
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)?;
    let h = v_t.row(smallest);

    let mut h_mat = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_mat[(r, c)] = h[3 * r + c];
        }
    }
    if !h_mat.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(h_mat)
}
