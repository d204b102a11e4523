//! Parameter types describing a requested transform.
//!
//! These structs describe *what* to do, not *how* to do it; the
//! [`engine`](super::engine) turns them into pixel work. Parsing is lenient
//! on purpose: a malformed width is not an error, it simply means "no width
//! was requested", which lets the serving pipeline fall through to serving
//! the plain asset instead of rejecting the request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a requested box is applied to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Fill the box exactly, trimming overflow (entropy- or focal-guided).
    Crop,
    /// Fit inside the box, aspect preserved, no trimming, no upscaling.
    Resize,
}

impl TransformMode {
    /// Parse a query value. Absent defaults to `Crop`; any value other than
    /// the literal `crop` behaves as `Resize`, mirroring how the transform
    /// treats unknown modes as plain fits.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("crop") => TransformMode::Crop,
            Some(_) => TransformMode::Resize,
        }
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformMode::Crop => write!(f, "crop"),
            TransformMode::Resize => write!(f, "resize"),
        }
    }
}

/// Normalized image coordinate marking the region to preserve when cropping.
/// `(0,0)` is the top-left corner, `(1,1)` the bottom-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalPoint {
    pub x: f64,
    pub y: f64,
}

impl FocalPoint {
    /// Both coordinates must parse and land in `[0,1]`, otherwise the focal
    /// point is discarded and entropy cropping applies.
    pub fn parse(fpx: Option<&str>, fpy: Option<&str>) -> Option<Self> {
        let x = fpx?.parse::<f64>().ok()?;
        let y = fpy?.parse::<f64>().ok()?;
        if (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) {
            Some(Self { x, y })
        } else {
            None
        }
    }
}

/// A parsed variant request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mode: TransformMode,
    pub focal_point: Option<FocalPoint>,
    pub preset: Option<String>,
    /// Write the generated variant back to storage. Only the literal
    /// `cache=false` disables this.
    pub cache: bool,
}

impl TransformSpec {
    /// Parse query parameters into a spec.
    ///
    /// Numeric parameters are canonicalized (floats rounded, zero and
    /// negatives dropped) so that superficially different query strings
    /// cannot split cache entries.
    pub fn from_query(query: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| query.get(key).map(String::as_str);
        Self {
            width: parse_dimension(get("w")),
            height: parse_dimension(get("h")),
            mode: TransformMode::parse(get("mode")),
            focal_point: FocalPoint::parse(get("fpx"), get("fpy")),
            preset: get("preset").map(str::to_string),
            cache: get("cache") != Some("false"),
        }
    }

    /// Whether explicit dimensions were requested (the `w`/`h` branch of
    /// cache-key derivation; presets are keyed separately).
    pub fn has_dimensions(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Lenient positive-integer parse: `"150"` and `"150.4"` both work, while
/// `"abc"`, `"0"` and `"-3"` all mean "not requested".
fn parse_dimension(value: Option<&str>) -> Option<u32> {
    let n = value?.trim().parse::<f64>().ok()?;
    if n.is_finite() && n > 0.0 && n <= u32::MAX as f64 {
        let rounded = n.round() as u32;
        (rounded > 0).then_some(rounded)
    } else {
        None
    }
}

/// Named shortcut for a fixed `(width, height, mode)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mode: TransformMode,
}

/// Process-wide preset table, built once at startup and read-only afterwards.
///
/// Seeded with the built-in sizes; caller-supplied presets replace built-ins
/// by name, later entries winning.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: Vec<Preset>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        let builtin = |name: &str, size: u32, mode| Preset {
            name: name.to_string(),
            width: size,
            height: size,
            mode,
        };
        Self {
            presets: vec![
                builtin("tiny", 50, TransformMode::Crop),
                builtin("thumb", 150, TransformMode::Crop),
                builtin("small", 300, TransformMode::Resize),
                builtin("medium", 500, TransformMode::Resize),
                builtin("large", 800, TransformMode::Resize),
            ],
        }
    }

    /// Merge caller presets over the registry, replacing by name.
    pub fn merge(&mut self, presets: impl IntoIterator<Item = Preset>) {
        for preset in presets {
            match self.presets.iter_mut().find(|p| p.name == preset.name) {
                Some(existing) => *existing = preset,
                None => self.presets.push(preset),
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
