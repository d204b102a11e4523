//! Upload-time preview generation.
//!
//! Every stored asset gets a preview blob alongside its source:
//!
//! - Images already inside the configured bounding box pass through
//!   byte-identical (no upscaling, no pointless re-encode).
//! - Larger images are contain-resized into the box.
//! - Non-image assets get a generic preview: a procedurally drawn file icon
//!   with the mime-type string rendered across it. The icon is drawn rather
//!   than bundled so the binary ships no image assets.
//!
//! Decode failures surface as [`TransformError::Decode`]; the upload pipeline
//! decides whether to fall back to [`generic_preview`].

use super::engine::{TransformError, decode, encode, output_format};
use super::geometry::{Dimensions, contain_dimensions};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Maximum dimensions of generated previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_width: 1600,
            max_height: 1600,
        }
    }
}

/// Side length of the square generic-preview canvas.
const ICON_CANVAS: u32 = 800;

/// Generate the preview blob for a freshly uploaded asset.
///
/// Image assets follow the pass-through/contain rules above; everything else
/// gets the generic icon. Returns encoded image bytes ready for storage.
pub fn generate_preview(
    mime_type: &str,
    data: &[u8],
    config: &PreviewConfig,
) -> Result<Vec<u8>, TransformError> {
    if !is_image_mime(mime_type) {
        return generic_preview(mime_type);
    }

    let img = decode(data)?;
    if img.width() <= config.max_width && img.height() <= config.max_height {
        // Already fits: the preview is the original, byte for byte.
        return Ok(data.to_vec());
    }

    let source = Dimensions::new(img.width(), img.height());
    let dims = contain_dimensions(source, Some(config.max_width), Some(config.max_height));
    let resized = img.resize_exact(dims.width, dims.height, FilterType::Lanczos3);
    let format = output_format(image::guess_format(data).ok());
    encode(&resized, format)
}

/// Generic preview for non-image (or undecodable) assets: a document icon
/// with the mime type written across the lower third. Always PNG.
pub fn generic_preview(mime_type: &str) -> Result<Vec<u8>, TransformError> {
    let mut canvas = RgbImage::from_pixel(ICON_CANVAS, ICON_CANVAS, Rgb([255, 255, 255]));
    draw_document_icon(&mut canvas);

    let label = mime_type.to_ascii_uppercase();
    let scale = text_scale(&label);
    let text_width = text_pixel_width(&label, scale);
    let x = (ICON_CANVAS.saturating_sub(text_width)) / 2;
    draw_text(&mut canvas, &label, x, 620, scale, Rgb([0x66, 0x66, 0x66]));

    encode(&DynamicImage::ImageRgb8(canvas), ImageFormat::Png)
}

pub(crate) fn is_image_mime(mime_type: &str) -> bool {
    mime_type.split('/').next() == Some("image")
}

/// Stylized sheet of paper with a folded top-right corner.
fn draw_document_icon(canvas: &mut RgbImage) {
    const PAGE_LEFT: u32 = 270;
    const PAGE_RIGHT: u32 = 530;
    const PAGE_TOP: u32 = 120;
    const PAGE_BOTTOM: u32 = 520;
    const FOLD: u32 = 70;
    const BORDER: u32 = 4;

    let fill = Rgb([236, 238, 240]);
    let edge = Rgb([150, 155, 160]);
    let fold_fill = Rgb([210, 214, 218]);

    for y in PAGE_TOP..PAGE_BOTTOM {
        for x in PAGE_LEFT..PAGE_RIGHT {
            let in_fold_cutout = x >= PAGE_RIGHT - FOLD && y < PAGE_TOP + FOLD;
            if in_fold_cutout {
                // Diagonal of the folded corner.
                let dx = x - (PAGE_RIGHT - FOLD);
                let dy = y - PAGE_TOP;
                if dx > dy {
                    continue; // outside the page silhouette
                }
                let on_diagonal = dx.abs_diff(dy) < BORDER;
                canvas.put_pixel(x, y, if on_diagonal { edge } else { fold_fill });
                continue;
            }
            let on_border = x < PAGE_LEFT + BORDER
                || x >= PAGE_RIGHT - BORDER
                || y < PAGE_TOP + BORDER
                || y >= PAGE_BOTTOM - BORDER;
            canvas.put_pixel(x, y, if on_border { edge } else { fill });
        }
    }
}

/// 5×7 glyph bitmaps, one bit per pixel, row-major, bit 4 = leftmost column.
/// Covers uppercase letters, digits, and the punctuation mime types use.
const GLYPHS: &[(char, [u8; 7])] = &[
    ('A', [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('B', [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E]),
    ('C', [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E]),
    ('D', [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C]),
    ('E', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F]),
    ('F', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10]),
    ('G', [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F]),
    ('H', [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('I', [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('J', [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C]),
    ('K', [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11]),
    ('L', [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F]),
    ('M', [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11]),
    ('N', [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11]),
    ('O', [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('P', [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10]),
    ('Q', [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D]),
    ('R', [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11]),
    ('S', [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E]),
    ('T', [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04]),
    ('U', [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('V', [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04]),
    ('W', [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11]),
    ('X', [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11]),
    ('Y', [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04]),
    ('Z', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F]),
    ('0', [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E]),
    ('1', [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('2', [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F]),
    ('3', [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E]),
    ('4', [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02]),
    ('5', [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E]),
    ('6', [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E]),
    ('7', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08]),
    ('8', [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E]),
    ('9', [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C]),
    ('/', [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10]),
    ('-', [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00]),
    ('+', [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00]),
    ('.', [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C]),
    (' ', [0x00; 7]),
];

/// Horizontal advance per character: 5 columns plus 1 of spacing.
const GLYPH_ADVANCE: u32 = 6;

fn glyph_for(c: char) -> [u8; 7] {
    GLYPHS
        .iter()
        .find(|(g, _)| *g == c)
        .map(|(_, rows)| *rows)
        .unwrap_or([0; 7])
}

/// Largest scale (capped at 6) that keeps the label within the canvas.
fn text_scale(text: &str) -> u32 {
    let available = ICON_CANVAS * 9 / 10;
    let natural = text.chars().count() as u32 * GLYPH_ADVANCE;
    (available / natural.max(1)).clamp(1, 6)
}

fn text_pixel_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_ADVANCE * scale
}

fn draw_text(canvas: &mut RgbImage, text: &str, x: u32, y: u32, scale: u32, color: Rgb<u8>) {
    let mut pen_x = x;
    for c in text.chars() {
        let rows = glyph_for(c);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5u32 {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = pen_x + col * scale + dx;
                        let py = y + row as u32 * scale + dy;
                        if px < canvas.width() && py < canvas.height() {
                            canvas.put_pixel(px, py, color);
                        }
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::engine::encode;
    use image::DynamicImage;

    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        encode(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg).unwrap()
    }

    // =========================================================================
    // Image previews
    // =========================================================================

    #[test]
    fn small_image_passes_through_unchanged() {
        let source = test_jpeg(400, 300);
        let preview = generate_preview("image/jpeg", &source, &PreviewConfig::default()).unwrap();
        assert_eq!(preview, source);
    }

    #[test]
    fn oversized_image_is_contained_to_bounds() {
        let source = test_jpeg(2000, 1000);
        let preview = generate_preview("image/jpeg", &source, &PreviewConfig::default()).unwrap();
        let img = image::load_from_memory(&preview).unwrap();
        assert_eq!((img.width(), img.height()), (1600, 800));
    }

    #[test]
    fn preview_respects_custom_bounds() {
        let source = test_jpeg(1000, 500);
        let config = PreviewConfig {
            max_width: 100,
            max_height: 100,
        };
        let preview = generate_preview("image/jpeg", &source, &config).unwrap();
        let img = image::load_from_memory(&preview).unwrap();
        assert_eq!((img.width(), img.height()), (100, 50));
    }

    #[test]
    fn oversized_preview_keeps_source_format() {
        let source = test_jpeg(2000, 100);
        let preview = generate_preview("image/jpeg", &source, &PreviewConfig::default()).unwrap();
        assert_eq!(&preview[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn corrupt_image_is_a_decode_error() {
        let err =
            generate_preview("image/jpeg", b"garbage", &PreviewConfig::default()).unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    // =========================================================================
    // Generic previews
    // =========================================================================

    #[test]
    fn non_image_mime_gets_generic_png() {
        let preview =
            generate_preview("application/pdf", b"%PDF-1.4", &PreviewConfig::default()).unwrap();
        let img = image::load_from_memory(&preview).unwrap();
        assert_eq!((img.width(), img.height()), (ICON_CANVAS, ICON_CANVAS));
        assert_eq!(
            image::guess_format(&preview).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn generic_preview_is_not_blank() {
        let preview = generic_preview("application/pdf").unwrap();
        let img = image::load_from_memory(&preview).unwrap().to_rgb8();
        let non_white = img.pixels().filter(|p| p.0 != [255, 255, 255]).count();
        assert!(non_white > 1000, "icon and text should mark pixels");
    }

    #[test]
    fn generic_previews_differ_by_mime_label() {
        let a = generic_preview("application/pdf").unwrap();
        let b = generic_preview("video/mp4").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn long_mime_label_still_fits_canvas() {
        let preview = generic_preview("application/vnd.openxmlformats-officedocument").unwrap();
        let img = image::load_from_memory(&preview).unwrap();
        assert_eq!(img.width(), ICON_CANVAS);
    }

    #[test]
    fn is_image_mime_checks_major_type() {
        assert!(is_image_mime("image/png"));
        assert!(!is_image_mime("video/mp4"));
        assert!(!is_image_mime("application/octet-stream"));
    }

    #[test]
    fn text_scale_shrinks_for_long_labels() {
        assert!(text_scale("A/B") > text_scale("application/vnd.extremely-long-subtype-name"));
    }
}
