use crate::EyeSpaceHandedness;
use ar_core::nalgebra::Matrix4;
use ar_core::CameraIntrinsics;

/// Builds a perspective projection matrix directly from the camera
/// calibration rather than from a field-of-view angle, so the rendered
/// overlay uses exactly the same projection the lens did.
///
/// The focal lengths land on the diagonal as `2*fx/width` and `2*fy/height`,
/// the principal-point offsets `(2*cx/width − 1)` and `(2*cy/height − 1)`
/// appear in the third column with signs matching the handedness chosen for
/// [`basis_change`](crate::basis_change), and the remaining slots carry the
/// standard near/far depth mapping.
///
/// This depends only on the calibration and screen size, so it is computed
/// once at startup, not per frame.
#[rustfmt::skip]
pub fn projection_matrix(
    intrinsics: &CameraIntrinsics,
    width: u32,
    height: u32,
    handedness: EyeSpaceHandedness,
) -> Matrix4<f64> {
    let (w, h) = (width as f64, height as f64);
    let (near, far) = (intrinsics.near, intrinsics.far);
    let sx = 2.0 * intrinsics.focals.x / w;
    let sy = 2.0 * intrinsics.focals.y / h;
    let ox = 2.0 * intrinsics.principal_point.x / w - 1.0;
    let oy = 2.0 * intrinsics.principal_point.y / h - 1.0;
    let depth_range = far - near;

    match handedness {
        EyeSpaceHandedness::LeftHanded => Matrix4::new(
            sx,  0.0, ox,                        0.0,
            0.0, sy,  -oy,                       0.0,
            0.0, 0.0, (far + near) / depth_range, -2.0 * far * near / depth_range,
            0.0, 0.0, 1.0,                       0.0,
        ),
        EyeSpaceHandedness::RightHanded => Matrix4::new(
            sx,  0.0, -ox,                        0.0,
            0.0, sy,  oy,                         0.0,
            0.0, 0.0, -(far + near) / depth_range, -2.0 * far * near / depth_range,
            0.0, 0.0, -1.0,                       0.0,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis_change;
    use approx::assert_relative_eq;
    use ar_core::nalgebra::{Point2, Vector2, Vector4};

    const WIDTH: u32 = 1280;
    const HEIGHT: u32 = 720;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::identity()
            .focals(Vector2::new(959.562, 958.127))
            .principal_point(Point2::new(625.232, 357.149))
            .clip_planes(0.00001, 10000.0)
    }

    #[test]
    fn diagonal_carries_the_focal_scaling() {
        let intrinsics = intrinsics();
        for handedness in [EyeSpaceHandedness::RightHanded, EyeSpaceHandedness::LeftHanded] {
            let projection = projection_matrix(&intrinsics, WIDTH, HEIGHT, handedness);
            assert_relative_eq!(
                projection[(0, 0)],
                2.0 * 959.562 / WIDTH as f64,
                epsilon = f64::EPSILON
            );
            assert_relative_eq!(
                projection[(1, 1)],
                2.0 * 958.127 / HEIGHT as f64,
                epsilon = f64::EPSILON
            );
        }
    }

    /// The composed basis change and projection must reproduce the pinhole
    /// model: a camera-frame point projected through both lands at the same
    /// normalized device coordinates as its pixel projection.
    #[test]
    fn agrees_with_the_pinhole_projection() {
        let intrinsics = intrinsics();
        let (x, y, z) = (0.3, -0.2, 2.0);

        // Pixel projection with the pinhole model, then into NDC with x
        // right and y up.
        let u = intrinsics.focals.x * x / z + intrinsics.principal_point.x;
        let v = intrinsics.focals.y * y / z + intrinsics.principal_point.y;
        let expected_x = 2.0 * u / WIDTH as f64 - 1.0;
        let expected_y = -(2.0 * v / HEIGHT as f64 - 1.0);

        for handedness in [EyeSpaceHandedness::RightHanded, EyeSpaceHandedness::LeftHanded] {
            let projection = projection_matrix(&intrinsics, WIDTH, HEIGHT, handedness);
            let eye = basis_change(handedness) * Vector4::new(x, y, z, 1.0);
            let clip = projection * eye;
            assert!(clip.w > 0.0, "point in front of the camera must have positive clip w");
            assert_relative_eq!(clip.x / clip.w, expected_x, epsilon = 1e-12);
            assert_relative_eq!(clip.y / clip.w, expected_y, epsilon = 1e-12);
        }
    }

    #[test]
    fn depth_maps_near_and_far_to_the_clip_range() {
        let intrinsics = intrinsics();
        for handedness in [EyeSpaceHandedness::RightHanded, EyeSpaceHandedness::LeftHanded] {
            let projection = projection_matrix(&intrinsics, WIDTH, HEIGHT, handedness);
            let eye_z = |vision_z: f64| match handedness {
                EyeSpaceHandedness::RightHanded => -vision_z,
                EyeSpaceHandedness::LeftHanded => vision_z,
            };
            let near_clip = projection * Vector4::new(0.0, 0.0, eye_z(intrinsics.near), 1.0);
            assert_relative_eq!(near_clip.z / near_clip.w, -1.0, epsilon = 1e-9);
            let far_clip = projection * Vector4::new(0.0, 0.0, eye_z(intrinsics.far), 1.0);
            assert_relative_eq!(far_clip.z / far_clip.w, 1.0, epsilon = 1e-9);
        }
    }
}
