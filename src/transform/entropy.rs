//! Entropy-guided crop window selection.
//!
//! When a crop has no focal point, the window should land on the visually
//! busy part of the image rather than a uniform background. After the source
//! is cover-resized to fill the target box, exactly one axis overflows; this
//! module slides a target-sized window along that axis and keeps the position
//! whose greyscale histogram has the highest Shannon entropy.
//!
//! The choice of heuristic is deliberately loose: output only needs to
//! "prefer busy regions", not match any other implementation bit-for-bit.

use super::geometry::{Dimensions, Region};
use image::GrayImage;

/// Number of candidate window positions evaluated along the overflow axis.
const CANDIDATE_STEPS: u32 = 16;

/// Pick the most information-dense target-sized window.
///
/// `image` must already cover `target` on both axes (fill-resized); at most
/// one axis overflows.
pub fn entropy_region(image: &GrayImage, target: Dimensions) -> Region {
    let max_x = image.width().saturating_sub(target.width);
    let max_y = image.height().saturating_sub(target.height);

    let mut best = Region {
        left: 0,
        top: 0,
        width: target.width,
        height: target.height,
    };

    if max_x == 0 && max_y == 0 {
        return best;
    }

    let mut best_entropy = f64::MIN;
    for step in 0..=CANDIDATE_STEPS {
        let (left, top) = if max_x > 0 {
            (max_x * step / CANDIDATE_STEPS, 0)
        } else {
            (0, max_y * step / CANDIDATE_STEPS)
        };
        let candidate = Region {
            left,
            top,
            width: target.width,
            height: target.height,
        };
        let entropy = window_entropy(image, &candidate);
        if entropy > best_entropy {
            best_entropy = entropy;
            best = candidate;
        }
    }
    best
}

/// Shannon entropy of the greyscale histogram inside `region`.
fn window_entropy(image: &GrayImage, region: &Region) -> f64 {
    let mut histogram = [0u64; 256];
    for y in region.top..region.top + region.height {
        for x in region.left..region.left + region.width {
            histogram[image.get_pixel(x, y).0[0] as usize] += 1;
        }
    }

    let total = (region.width as u64 * region.height as u64) as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}
