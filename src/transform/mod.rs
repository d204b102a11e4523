//! Image transformation — pure Rust, no external binaries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** (JPEG, PNG, WebP, TIFF, GIF) | `image` crate |
//! | **Resize / crop** | Lanczos3 via `image::imageops` |
//! | **Busy-region crop** | greyscale histogram entropy ([`entropy`]) |
//! | **Encode** | format-matching `image` encoders, PNG fallback |
//!
//! The module is split into:
//! - **Geometry**: pure dimension math (unit testable without pixels)
//! - **Params**: data structures describing a requested transform
//! - **Entropy**: crop window selection for focal-point-less crops
//! - **Engine**: `transform(bytes, spec) -> bytes` plus output format
//! - **Preview**: upload-time preview blobs, including the generic file icon

pub mod engine;
pub mod entropy;
pub mod geometry;
pub mod params;
pub mod preview;

pub use engine::{TransformError, TransformOutput, transform};
pub use geometry::{Dimensions, Region};
pub use params::{FocalPoint, Preset, PresetRegistry, TransformMode, TransformSpec};
pub use preview::{PreviewConfig, generate_preview, generic_preview};
