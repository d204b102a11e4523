//! The transform engine: bytes in, transformed bytes out.
//!
//! A pure function from `(source bytes, spec)` to an output buffer plus its
//! discovered format. No storage, no caching — the serving pipeline owns
//! those. Geometry is delegated to [`geometry`](super::geometry), busy-region
//! selection to [`entropy`](super::entropy).

use super::entropy::entropy_region;
use super::geometry::{
    Dimensions, contain_dimensions, extraction_region, fill_dimensions, intermediate_dimensions,
};
use super::params::{PresetRegistry, TransformMode, TransformSpec};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

/// Encoding quality for lossy output formats.
const JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// A transformed image buffer and the format it was encoded in.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl TransformOutput {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Apply `spec` to `source`, resolving presets through `presets`.
///
/// A matched preset wins outright over explicit width/height/mode. Crop mode
/// with both dimensions extracts an exact `w×h` window (focal-point-guided
/// when a valid focal point is present, entropy-guided otherwise); anything
/// else is a contain fit. Output is re-encoded in the source's own format
/// when it is one the engine can write, PNG otherwise.
pub fn transform(
    source: &[u8],
    spec: &TransformSpec,
    presets: &PresetRegistry,
) -> Result<TransformOutput, TransformError> {
    let (width, height, mode) = match spec.preset.as_deref().and_then(|name| presets.find(name)) {
        Some(preset) => (Some(preset.width), Some(preset.height), preset.mode),
        None => (spec.width, spec.height, spec.mode),
    };

    let img = decode(source)?;
    let format = output_format(image::guess_format(source).ok());

    let out = match (mode, width, height) {
        (TransformMode::Crop, Some(w), Some(h)) => {
            let target = Dimensions::new(w, h);
            match spec.focal_point {
                Some(fp) => {
                    let focal = (
                        fp.x * img.width() as f64,
                        fp.y * img.height() as f64,
                    );
                    crop_to_focal_point(&img, target, focal)
                }
                None => crop_to_busiest_region(&img, target),
            }
        }
        // A crop with only one axis has nothing to trim against; it degrades
        // to an aspect-preserving fit on the present axis.
        (_, w, h) => resize_contain(&img, w, h),
    };

    Ok(TransformOutput {
        bytes: encode(&out, format)?,
        format,
    })
}

/// Decode image bytes, tolerating whatever leniency the codec offers.
pub(crate) fn decode(source: &[u8]) -> Result<DynamicImage, TransformError> {
    image::load_from_memory(source).map_err(|e| TransformError::Decode(e.to_string()))
}

/// Contain fit: inside the box, aspect preserved, never upscaled.
fn resize_contain(img: &DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    let source = Dimensions::new(img.width(), img.height());
    let dims = contain_dimensions(source, width, height);
    if dims == source {
        img.clone()
    } else {
        img.resize_exact(dims.width, dims.height, FilterType::Lanczos3)
    }
}

/// Cover-resize then extract the window the entropy heuristic prefers.
fn crop_to_busiest_region(img: &DynamicImage, target: Dimensions) -> DynamicImage {
    let source = Dimensions::new(img.width(), img.height());
    let fill = fill_dimensions(source, target);
    let filled = img.resize_exact(fill.width, fill.height, FilterType::Lanczos3);
    let region = entropy_region(&filled.to_luma8(), target);
    filled.crop_imm(region.left, region.top, region.width, region.height)
}

/// Resize so the binding axis exactly fills the target, then extract the
/// window centered as close to the focal point as the bounds allow.
fn crop_to_focal_point(
    img: &DynamicImage,
    target: Dimensions,
    focal: (f64, f64),
) -> DynamicImage {
    let source = Dimensions::new(img.width(), img.height());
    let inter = intermediate_dimensions(source, target);
    let resized = img.resize_exact(inter.dims.width, inter.dims.height, FilterType::Lanczos3);
    let region = extraction_region(&inter, focal, target);
    resized.crop_imm(region.left, region.top, region.width, region.height)
}

/// Formats the engine re-encodes as themselves; everything else becomes PNG.
pub(crate) fn output_format(source: Option<ImageFormat>) -> ImageFormat {
    match source {
        Some(
            f @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Tiff),
        ) => f,
        _ => ImageFormat::Png,
    }
}

/// Encode an image in the given format, in memory.
pub(crate) fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, TransformError> {
    let mut buf = Cursor::new(Vec::new());
    let result = match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            // The JPEG encoder rejects alpha; flatten first.
            img.to_rgb8().write_with_encoder(encoder)
        }
        ImageFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut buf);
            img.to_rgba8().write_with_encoder(encoder)
        }
        ImageFormat::Tiff => img.write_to(&mut buf, ImageFormat::Tiff),
        _ => img.write_to(&mut buf, ImageFormat::Png),
    };
    result.map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}
