use crate::{FastBrief, BORDER};
use float_ord::FloatOrd;
use image::GrayImage;
use std::collections::HashSet;

/// A detected corner before orientation assignment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Corner {
    pub x: u32,
    pub y: u32,
    pub response: f32,
}

/// The Bresenham circle of radius 3 used by FAST, starting at the top and
/// proceeding clockwise.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// The minimum contiguous arc length for FAST-9.
const ARC_LENGTH: usize = 9;

/// Detect FAST corners, suppress non-maxima, and keep the strongest
/// responses up to the configured feature cap.
pub(crate) fn detect(image: &GrayImage, config: &FastBrief) -> Vec<Corner> {
    let (width, height) = (image.width(), image.height());
    let mut corners = Vec::new();
    for y in BORDER..height - BORDER {
        for x in BORDER..width - BORDER {
            let center = image.get_pixel(x, y)[0];
            if !cardinal_pre_check(image, x, y, center, config.fast_threshold) {
                continue;
            }
            if let Some(response) = corner_response(image, x, y, center, config.fast_threshold) {
                corners.push(Corner { x, y, response });
            }
        }
    }
    suppress(corners, config)
}

/// Quick rejection using the four cardinal circle pixels. A contiguous arc
/// of nine covers at least two of them, so anything with fewer than two
/// cardinals on one side of the threshold cannot be a corner.
fn cardinal_pre_check(image: &GrayImage, x: u32, y: u32, center: u8, threshold: u8) -> bool {
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);
    let cardinal = [
        image.get_pixel(x, y - 3)[0],
        image.get_pixel(x + 3, y)[0],
        image.get_pixel(x, y + 3)[0],
        image.get_pixel(x - 3, y)[0],
    ];
    let brighter = cardinal.iter().filter(|&&p| p > bright).count();
    let darker = cardinal.iter().filter(|&&p| p < dark).count();
    brighter >= 2 || darker >= 2
}

/// Runs the full segment test. Returns the corner response (the sum of
/// absolute differences beyond the threshold over the circle) when a
/// contiguous arc of at least [`ARC_LENGTH`] brighter or darker pixels
/// exists, and `None` otherwise.
fn corner_response(image: &GrayImage, x: u32, y: u32, center: u8, threshold: u8) -> Option<f32> {
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);

    let mut longest_bright = 0usize;
    let mut longest_dark = 0usize;
    let mut run_bright = 0usize;
    let mut run_dark = 0usize;
    // Walk the circle twice to handle arcs that wrap around the start.
    for i in 0..CIRCLE.len() * 2 {
        let (dx, dy) = CIRCLE[i % CIRCLE.len()];
        let p = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0];
        if p > bright {
            run_bright += 1;
            run_dark = 0;
        } else if p < dark {
            run_dark += 1;
            run_bright = 0;
        } else {
            run_bright = 0;
            run_dark = 0;
        }
        longest_bright = longest_bright.max(run_bright);
        longest_dark = longest_dark.max(run_dark);
    }

    if longest_bright < ARC_LENGTH && longest_dark < ARC_LENGTH {
        return None;
    }

    let response: u32 = CIRCLE
        .iter()
        .map(|&(dx, dy)| {
            let p = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0];
            let diff = (p as i32 - center as i32).unsigned_abs();
            diff.saturating_sub(threshold as u32)
        })
        .sum();
    Some(response as f32)
}

/// Grid-based non-maximum suppression: corners are visited best response
/// first and claim a cell neighborhood; weaker corners landing in a claimed
/// neighborhood are dropped. Truncates to the configured feature cap.
fn suppress(mut corners: Vec<Corner>, config: &FastBrief) -> Vec<Corner> {
    corners.sort_by_key(|c| core::cmp::Reverse(FloatOrd(c.response)));

    let mut claimed = HashSet::new();
    let mut selected = Vec::new();
    for corner in corners {
        let cell_x = (corner.x as f32 / config.nms_radius) as i32;
        let cell_y = (corner.y as f32 / config.nms_radius) as i32;
        let free = (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (cell_x + dx, cell_y + dy)))
            .all(|cell| !claimed.contains(&cell));
        if free {
            claimed.insert((cell_x, cell_y));
            selected.push(corner);
            if selected.len() >= config.max_features {
                break;
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// A bright square on a dark background fires at its four corners but
    /// not along its straight edges or in flat regions.
    #[test]
    fn square_corners_are_detected() {
        let (lo, hi) = (40u32, 88u32);
        let image = GrayImage::from_fn(128, 128, |x, y| {
            if (lo..=hi).contains(&x) && (lo..=hi).contains(&y) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let corners = detect(&image, &FastBrief::default());
        assert!(!corners.is_empty());
        let expected = [(lo, lo), (hi, lo), (lo, hi), (hi, hi)];
        for c in &corners {
            let near = expected.iter().any(|&(ex, ey)| {
                (c.x as i32 - ex as i32).abs() <= 4 && (c.y as i32 - ey as i32).abs() <= 4
            });
            assert!(near, "corner at ({}, {}) is not a square corner", c.x, c.y);
        }
    }

    #[test]
    fn suppression_caps_feature_count() {
        let corners: Vec<Corner> = (0..1000)
            .map(|i| Corner {
                x: 16 + (i % 100) * 12,
                y: 16 + (i / 100) * 12,
                response: i as f32,
            })
            .collect();
        let config = FastBrief {
            max_features: 100,
            ..Default::default()
        };
        let kept = suppress(corners, &config);
        assert_eq!(kept.len(), 100);
        // Best responses survive.
        assert!(kept.iter().all(|c| c.response >= 900.0));
    }
}
