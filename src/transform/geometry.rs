//! Pure calculation functions for crop and resize geometry.
//!
//! All functions here are pure and testable without any I/O or pixel data.

/// Width/height pair used throughout the transform engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Rectangular extraction window inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Axis that exactly fills the target box during a focal-point crop.
/// The other axis overflows and is where the extraction window slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingAxis {
    Width,
    Height,
}

/// Intermediate resize step of a focal-point crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intermediate {
    pub dims: Dimensions,
    /// Source-to-intermediate scale divisor; focal coordinates map into the
    /// intermediate image as `coord / factor`.
    pub factor: f64,
    pub binding: BindingAxis,
}

/// Fit `source` inside an optionally constrained box, preserving aspect
/// ratio and never upscaling ("contain" semantics).
///
/// An absent constraint leaves that axis unbounded. At least one pixel is
/// kept on each axis.
pub fn contain_dimensions(
    source: Dimensions,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> Dimensions {
    let scale_w = max_width.map(|w| w as f64 / source.width as f64);
    let scale_h = max_height.map(|h| h as f64 / source.height as f64);
    let scale = match (scale_w, scale_h) {
        (Some(w), Some(h)) => w.min(h),
        (Some(w), None) => w,
        (None, Some(h)) => h,
        (None, None) => 1.0,
    }
    .min(1.0);

    Dimensions {
        width: ((source.width as f64 * scale).round() as u32).max(1),
        height: ((source.height as f64 * scale).round() as u32).max(1),
    }
}

/// Dimensions that completely cover `target` while preserving the source
/// aspect ratio ("cover" semantics, resize-before-crop).
///
/// One axis matches the target exactly, the other meets or exceeds it.
pub fn fill_dimensions(source: Dimensions, target: Dimensions) -> Dimensions {
    let src_aspect = source.width as f64 / source.height as f64;
    let tgt_aspect = target.width as f64 / target.height as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height matches, width overflows.
        Dimensions {
            width: ((target.height as f64 * src_aspect).round() as u32).max(target.width),
            height: target.height,
        }
    } else {
        Dimensions {
            width: target.width,
            height: ((target.width as f64 / src_aspect).round() as u32).max(target.height),
        }
    }
}

/// Compute the intermediate image for a focal-point crop.
///
/// The axis with the smaller `original/target` ratio is the binding
/// constraint: the intermediate exactly fills the target along it and
/// overflows along the other.
pub fn intermediate_dimensions(original: Dimensions, target: Dimensions) -> Intermediate {
    let h_ratio = original.height as f64 / target.height as f64;
    let w_ratio = original.width as f64 / target.width as f64;

    if h_ratio < w_ratio {
        let factor = h_ratio;
        Intermediate {
            dims: Dimensions {
                width: (original.width as f64 / factor).round() as u32,
                height: target.height,
            },
            factor,
            binding: BindingAxis::Height,
        }
    } else {
        let factor = w_ratio;
        Intermediate {
            dims: Dimensions {
                width: target.width,
                height: (original.height as f64 / factor).round() as u32,
            },
            factor,
            binding: BindingAxis::Width,
        }
    }
}

/// Position the extraction window inside the intermediate image so its center
/// lands as close to the focal point as the bounds allow.
///
/// `focal` is in source-image pixel coordinates. The binding axis offset is
/// always 0; only the overflowing axis slides, clamped into the image.
pub fn extraction_region(
    intermediate: &Intermediate,
    focal: (f64, f64),
    target: Dimensions,
) -> Region {
    let center_x = focal.0 / intermediate.factor;
    let center_y = focal.1 / intermediate.factor;

    let mut region = Region {
        left: 0,
        top: 0,
        width: target.width,
        height: target.height,
    };

    match intermediate.binding {
        BindingAxis::Height => {
            let max = intermediate.dims.width.saturating_sub(target.width);
            region.left = clamp_offset(center_x - target.width as f64 / 2.0, max);
        }
        BindingAxis::Width => {
            let max = intermediate.dims.height.saturating_sub(target.height);
            region.top = clamp_offset(center_y - target.height as f64 / 2.0, max);
        }
    }
    region
}

fn clamp_offset(value: f64, max: u32) -> u32 {
    (value.round() as i64).clamp(0, max as i64) as u32
}
