use ar_core::nalgebra::{Matrix3, Rotation3, Vector3};
use ar_core::ReferenceToCamera;

/// Decompose a plane-induced homography in normalized image coordinates into
/// the pose of the reference plane relative to the camera.
///
/// For a reference on its own `z = 0` plane, the homography factors as
/// `H ~ [r1 r2 t]`, where `r1`/`r2` are the first two rotation columns. The
/// scale is fixed by unit-length rotation columns, the sign by requiring the
/// reference to sit in front of the camera, and the rotation is projected
/// onto SO(3) with a polar decomposition since the two recovered columns are
/// not exactly orthonormal in the presence of noise.
pub fn pose_from_homography(h: &Matrix3<f64>) -> Option<ReferenceToCamera> {
    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let norm1 = h1.norm();
    let norm2 = h2.norm();
    if norm1 < f64::EPSILON || norm2 < f64::EPSILON {
        return None;
    }
    // Average the two column norms for robustness against noise.
    let mut lambda = 2.0 / (norm1 + norm2);

    // The reference must lie in front of the camera (positive z).
    if lambda * h3.z < 0.0 {
        lambda = -lambda;
    }

    let r1: Vector3<f64> = lambda * h1;
    let r2: Vector3<f64> = lambda * h2;
    let r3 = r1.cross(&r2);
    let t = lambda * h3;

    let mut r_mat = Matrix3::zeros();
    r_mat.set_column(0, &r1);
    r_mat.set_column(1, &r2);
    r_mat.set_column(2, &r3);

    // Project onto SO(3) (polar decomposition via SVD).
    let svd = r_mat.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }
    if !r_orth.iter().all(|v| v.is_finite()) || !t.iter().all(|v| v.is_finite()) {
        return None;
    }

    Some(ReferenceToCamera::from_parts(
        t,
        Rotation3::from_matrix_unchecked(r_orth),
    ))
}
