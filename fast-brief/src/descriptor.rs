use crate::KeyPoint;
use bitarray::BitArray;
use image::GrayImage;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Length of a descriptor in bytes (256 comparisons, one bit each).
pub const DESCRIPTOR_BYTES: usize = 32;

/// Number of intensity comparisons per descriptor.
const NUM_PAIRS: usize = DESCRIPTOR_BYTES * 8;

/// Radius in pixels of the patch the descriptor samples from. Must stay
/// below [`crate::BORDER`] so rotated sampling locations remain in bounds.
pub(crate) const PATCH_RADIUS: i32 = 13;

/// Radius of the intensity-centroid window used for orientation.
const ORIENTATION_RADIUS: i32 = 7;

/// Seed for the sampling pattern. Fixed so that descriptors are comparable
/// across processes and runs.
const PATTERN_SEED: u64 = 0x5eed_b41f_0b1a_5ed1;

/// One intensity comparison: sample at `(x1, y1)` and `(x2, y2)` relative to
/// the keypoint, emit a 1 bit when the first sample is darker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TestPair {
    pub x1: i8,
    pub y1: i8,
    pub x2: i8,
    pub y2: i8,
}

/// Generates the BRIEF sampling pattern: point pairs drawn uniformly from
/// the disc of radius [`PATCH_RADIUS`], from a fixed seed.
pub(crate) fn sampling_pattern() -> Vec<TestPair> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(PATTERN_SEED);
    let mut disc_sample = move || loop {
        let x: i8 = rng.gen_range(-PATCH_RADIUS as i8..=PATCH_RADIUS as i8);
        let y: i8 = rng.gen_range(-PATCH_RADIUS as i8..=PATCH_RADIUS as i8);
        if (x as i32).pow(2) + (y as i32).pow(2) <= PATCH_RADIUS * PATCH_RADIUS {
            return (x, y);
        }
    };
    (0..NUM_PAIRS)
        .map(|_| {
            let (x1, y1) = disc_sample();
            let (x2, y2) = disc_sample();
            TestPair { x1, y1, x2, y2 }
        })
        .collect()
}

/// Computes the keypoint orientation from the intensity centroid of the
/// surrounding window: the angle from the keypoint towards the centroid.
pub(crate) fn orientation(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > ORIENTATION_RADIUS * ORIENTATION_RADIUS {
                continue;
            }
            let p = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f32;
            m10 += p * dx as f32;
            m01 += p * dy as f32;
        }
    }
    m01.atan2(m10)
}

/// Computes the steered BRIEF descriptor of a keypoint: the sampling pattern
/// is rotated by the keypoint orientation before the comparisons are made.
pub(crate) fn describe(
    image: &GrayImage,
    keypoint: &KeyPoint,
    pattern: &[TestPair],
) -> BitArray<DESCRIPTOR_BYTES> {
    let (cx, cy) = (keypoint.point.0 as i32, keypoint.point.1 as i32);
    let (sin, cos) = keypoint.angle.sin_cos();

    let rotate = |px: i8, py: i8| {
        let rx = (px as f32 * cos - py as f32 * sin) as i32;
        let ry = (px as f32 * sin + py as f32 * cos) as i32;
        (cx + rx, cy + ry)
    };

    let mut bytes = [0u8; DESCRIPTOR_BYTES];
    for (index, pair) in pattern.iter().enumerate() {
        let (x1, y1) = rotate(pair.x1, pair.y1);
        let (x2, y2) = rotate(pair.x2, pair.y2);
        let a = image.get_pixel(x1 as u32, y1 as u32)[0];
        let b = image.get_pixel(x2 as u32, y2 as u32)[0];
        if a < b {
            bytes[index / 8] |= 1 << (index % 8);
        }
    }
    BitArray::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn pattern_is_deterministic_and_in_bounds() {
        let a = sampling_pattern();
        let b = sampling_pattern();
        assert_eq!(a.len(), NUM_PAIRS);
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert_eq!((pa.x1, pa.y1, pa.x2, pa.y2), (pb.x1, pb.y1, pb.x2, pb.y2));
            for (x, y) in [(pa.x1, pa.y1), (pa.x2, pa.y2)] {
                assert!((x as i32).pow(2) + (y as i32).pow(2) <= PATCH_RADIUS * PATCH_RADIUS);
            }
        }
    }

    #[test]
    fn orientation_points_towards_bright_side() {
        // Bright on the right half, so the centroid pulls the angle to ~0.
        let image = GrayImage::from_fn(64, 64, |x, _| {
            if x >= 32 {
                Luma([200u8])
            } else {
                Luma([10u8])
            }
        });
        let angle = orientation(&image, 32, 32);
        assert!(angle.abs() < 0.2, "angle was {angle}");
    }

    #[test]
    fn descriptor_differs_between_distinct_patches() {
        let gradient = GrayImage::from_fn(64, 64, |x, y| Luma([((x * 3 + y) % 256) as u8]));
        let flat_then_edge = GrayImage::from_fn(64, 64, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let pattern = sampling_pattern();
        let keypoint = KeyPoint {
            point: (32.0, 32.0),
            response: 1.0,
            size: 2.0 * PATCH_RADIUS as f32,
            angle: 0.0,
        };
        let a = describe(&gradient, &keypoint, &pattern);
        let b = describe(&flat_then_edge, &keypoint, &pattern);
        assert_ne!(a, b);
    }
}
