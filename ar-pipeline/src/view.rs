use ar_core::nalgebra::{Matrix4, Vector4};
use ar_core::ReferenceToCamera;

/// The eye-space convention of the target renderer.
///
/// The vision pipeline's camera frame has x right, y down, and z forwards.
/// No common renderer agrees with that, and the disagreement differs by
/// renderer family, so the conversion is selected here rather than hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeSpaceHandedness {
    /// OpenGL-style eye space: x right, y up, the camera looks down −z.
    RightHanded,
    /// Direct3D-style eye space: x right, y up, the camera looks down +z.
    LeftHanded,
}

/// The fixed basis change from the vision camera frame into the renderer's
/// eye space. This is a design constant of the integration, not something
/// derived at runtime: y always flips (vision y is down, eye-space y is up),
/// and z flips exactly when the renderer looks down −z.
///
/// Getting a sign wrong here produces an overlay that is mirrored or
/// upside-down while every component still "looks correct" in isolation,
/// which is why this constant is unit-tested on its own.
pub fn basis_change(handedness: EyeSpaceHandedness) -> Matrix4<f64> {
    match handedness {
        EyeSpaceHandedness::RightHanded => {
            Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, -1.0, 1.0))
        }
        EyeSpaceHandedness::LeftHanded => {
            Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, 1.0, 1.0))
        }
    }
}

/// Converts a recovered pose into the renderer's view matrix by composing
/// the fixed basis change with the pose's rigid transform. The result is
/// directly usable as the model-view transform for the overlay.
pub fn view_matrix(pose: &ReferenceToCamera, handedness: EyeSpaceHandedness) -> Matrix4<f64> {
    basis_change(handedness) * pose.homogeneous()
}
