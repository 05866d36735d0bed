//! FAST keypoint detection paired with steered BRIEF binary descriptors.
//!
//! This provides the feature-extraction stage of a planar tracking pipeline:
//! given an image, produce repeatably detectable corner locations together
//! with 256-bit binary fingerprints of their local appearance, suitable for
//! Hamming-distance matching against another image of the same scene.
//!
//! The detector is FAST-9 (a corner is accepted when at least 9 contiguous
//! pixels on a Bresenham circle of radius 3 are all brighter or all darker
//! than the center by a threshold). Each accepted corner is assigned an
//! orientation from the intensity centroid of its patch, and the BRIEF
//! sampling pattern is rotated by that orientation before the intensity
//! comparisons are made, which makes the descriptor rotation-tolerant.

mod descriptor;
mod detector;

use ar_core::{nalgebra::Point2, ImagePoint};
use bitarray::BitArray;
use image::{DynamicImage, GrayImage, ImageResult};
use log::*;
use std::path::Path;

pub use descriptor::DESCRIPTOR_BYTES;

/// Pixels this close to the image border cannot produce keypoints, so that
/// every descriptor sampling location stays inside the image.
pub const BORDER: u32 = 16;

/// A point of interest in an image.
/// This pretty much follows from OpenCV conventions.
#[derive(Debug, Clone, Copy)]
pub struct KeyPoint {
    /// The horizontal and vertical coordinates of the keypoint. +x faces
    /// right starting from the left side of the image and +y faces down
    /// starting from the top of the image.
    pub point: (f32, f32),
    /// The magnitude of response from the detector.
    pub response: f32,
    /// The diameter of the patch the descriptor is sampled from, in pixels.
    pub size: f32,
    /// The orientation angle in radians.
    pub angle: f32,
}

impl ImagePoint for KeyPoint {
    fn image_point(&self) -> Point2<f64> {
        Point2::new(self.point.0 as f64, self.point.1 as f64)
    }
}

/// Contains the configuration parameters of the extractor.
///
/// The most important parameter to pay attention to is `fast_threshold`.
/// [`FastBrief::new`] can be used to set this threshold and let all other
/// parameters remain default. You can also use the helpers
/// [`FastBrief::sparse`] and [`FastBrief::dense`].
#[derive(Debug, Copy, Clone)]
pub struct FastBrief {
    /// Minimum absolute intensity difference to the center for a circle
    /// pixel to count towards the contiguous arc.
    pub fast_threshold: u8,
    /// Radius in pixels of the non-maximum suppression grid.
    pub nms_radius: f32,
    /// Maximum number of keypoints kept, best response first.
    pub max_features: usize,
}

impl FastBrief {
    /// This convenience constructor is provided for the very common case
    /// that the detector threshold needs to be modified.
    pub fn new(fast_threshold: u8) -> Self {
        Self {
            fast_threshold,
            ..Default::default()
        }
    }

    /// Create a config that sparsely detects features.
    ///
    /// Uses a threshold of `40` (default is `20`).
    pub fn sparse() -> Self {
        Self::new(40)
    }

    /// Create a config that densely detects features.
    ///
    /// Uses a threshold of `10` (default is `20`).
    pub fn dense() -> Self {
        Self::new(10)
    }

    /// Extract keypoints and descriptors from an image.
    ///
    /// The image is converted to grayscale internally. The two returned
    /// vectors are parallel: descriptor `i` belongs to keypoint `i`. When the
    /// detector finds no corners (for instance on a uniform image) both
    /// vectors are empty; that is a valid outcome, not an error.
    ///
    /// Returns the keypoints and the descriptors.
    pub fn extract(&self, image: &DynamicImage) -> (Vec<KeyPoint>, Vec<BitArray<DESCRIPTOR_BYTES>>) {
        let gray = image.to_luma8();
        self.extract_from_gray(&gray)
    }

    /// Extract keypoints and descriptors from an already grayscale image.
    pub fn extract_from_gray(
        &self,
        gray: &GrayImage,
    ) -> (Vec<KeyPoint>, Vec<BitArray<DESCRIPTOR_BYTES>>) {
        if gray.width() <= 2 * BORDER || gray.height() <= 2 * BORDER {
            warn!(
                "image of {}x{} is too small to extract features from",
                gray.width(),
                gray.height()
            );
            return (Vec::new(), Vec::new());
        }

        let corners = detector::detect(gray, self);
        trace!("detected {} corners after suppression", corners.len());

        let pattern = descriptor::sampling_pattern();
        let mut keypoints = Vec::with_capacity(corners.len());
        let mut descriptors = Vec::with_capacity(corners.len());
        for corner in corners {
            let angle = descriptor::orientation(gray, corner.x, corner.y);
            let keypoint = KeyPoint {
                point: (corner.x as f32, corner.y as f32),
                response: corner.response,
                size: 2.0 * descriptor::PATCH_RADIUS as f32,
                angle,
            };
            descriptors.push(descriptor::describe(gray, &keypoint, &pattern));
            keypoints.push(keypoint);
        }

        info!("extracted {} features", keypoints.len());
        (keypoints, descriptors)
    }

    /// Extract features from an image on disk.
    ///
    /// Returns an [`ImageResult`] of the keypoints and the descriptors.
    pub fn extract_path(
        &self,
        path: impl AsRef<Path>,
    ) -> ImageResult<(Vec<KeyPoint>, Vec<BitArray<DESCRIPTOR_BYTES>>)> {
        Ok(self.extract(&image::open(path)?))
    }
}

impl Default for FastBrief {
    fn default() -> FastBrief {
        FastBrief {
            fast_threshold: 20,
            nms_radius: 5.0,
            max_features: 500,
        }
    }
}
