use crate::{NormalizedImagePoint, PlanePoint};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A claimed match between a reference descriptor and a frame descriptor,
/// by index into the two parallel keypoint/descriptor sequences, together
/// with the descriptor distance of the match (lower is better).
///
/// A set of correspondences is produced fresh each tick and discarded after
/// pose solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Correspondence {
    /// The distance between the two descriptors. Listed first so the derived
    /// ordering ranks correspondences best-first.
    pub distance: u32,
    /// Index of the keypoint in the reference image.
    pub reference: usize,
    /// Index of the keypoint in the live frame.
    pub frame: usize,
}

/// A normalized observation in the live frame paired with the 3d point on
/// the reference plane it is claimed to observe. This is the input unit of
/// the pose solver; the pairing keeps object and image points index-aligned
/// by construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PointCorrespondence(pub NormalizedImagePoint, pub PlanePoint);
