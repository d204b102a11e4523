//! Deterministic cache identifiers for transformed variants.
//!
//! A variant request must map to exactly one storage identifier, no matter
//! how the query string was spelled. The identifier is the request path with
//! a hex digest of the normalized transform parameters inserted before the
//! extension, nested under a dedicated `cache/` segment:
//!
//! ```text
//! /preview/3f/photo.jpg?w=150&h=150&mode=crop
//!   → cache/preview/3f/photo{digest}.jpg
//! ```
//!
//! Explicit-dimension requests and preset requests hash different input
//! strings, so `?preset=tiny` and `?w=50&h=50&mode=crop` cache separately
//! even when they resolve to identical geometry. That asymmetry is part of
//! the serving contract and is kept deliberately.
//!
//! Requests with no recognizable transform parameters map to the plain
//! request path; there is nothing to cache separately.

use crate::transform::{PresetRegistry, TransformSpec};
use sha2::{Digest, Sha256};

/// Hex length of the inserted digest.
const DIGEST_LEN: usize = 32;

/// Derive the storage identifier for a request.
///
/// `path` is the request path naming the source asset; `spec` the parsed
/// query. Numeric parameters were canonicalized during parsing, so equal
/// parameter sets always hash equal here.
pub fn derive(path: &str, spec: &TransformSpec, presets: &PresetRegistry) -> String {
    let plain = path.trim_start_matches('/');

    let focal = spec
        .focal_point
        .map(|fp| format!("_fpx{}_fpy{}", fp.x, fp.y))
        .unwrap_or_default();

    let hash_input = if spec.has_dimensions() {
        let w = spec.width.map(|w| w.to_string()).unwrap_or_default();
        let h = spec.height.map(|h| h.to_string()).unwrap_or_default();
        format!("_transform_w{w}_h{h}_m{}{focal}", spec.mode)
    } else if let Some(name) = spec.preset.as_deref()
        && presets.find(name).is_some()
    {
        format!("_transform_pre_{name}{focal}")
    } else {
        return plain.to_string();
    };

    format!("cache/{}", insert_suffix(plain, &digest(&hash_input)))
}

/// Hex digest of the normalized parameter string, truncated for identifier
/// brevity (distribution is all that matters here).
fn digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("{digest:x}")[..DIGEST_LEN].to_string()
}

/// Insert `suffix` between the filename stem and extension, keeping any
/// directory components in place.
fn insert_suffix(path: &str, suffix: &str) -> String {
    let (dir, base) = match path.rsplit_once('/') {
        Some((dir, base)) => (Some(dir), base),
        None => (None, path),
    };
    let (stem, ext) = match base.rfind('.') {
        Some(pos) if pos > 0 => base.split_at(pos),
        _ => (base, ""),
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}{suffix}{ext}"),
        None => format!("{stem}{suffix}{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec(pairs: &[(&str, &str)]) -> TransformSpec {
        let query: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TransformSpec::from_query(&query)
    }

    fn presets() -> PresetRegistry {
        PresetRegistry::new()
    }

    #[test]
    fn no_transform_params_yields_plain_path() {
        let key = derive("/source/ab/photo.jpg", &spec(&[]), &presets());
        assert_eq!(key, "source/ab/photo.jpg");
    }

    #[test]
    fn malformed_params_yield_plain_path() {
        let key = derive("/photo.jpg", &spec(&[("w", "abc")]), &presets());
        assert_eq!(key, "photo.jpg");
    }

    #[test]
    fn dimension_request_nests_under_cache_with_suffix() {
        let key = derive(
            "/preview/3f/photo.jpg",
            &spec(&[("w", "150"), ("h", "150"), ("mode", "crop")]),
            &presets(),
        );
        assert!(key.starts_with("cache/preview/3f/photo"));
        assert!(key.ends_with(".jpg"));
        // stem + 32 hex chars + extension
        let base = key.rsplit('/').next().unwrap();
        assert_eq!(base.len(), "photo".len() + DIGEST_LEN + ".jpg".len());
    }

    #[test]
    fn key_is_order_insensitive() {
        let a = derive(
            "/photo.jpg",
            &spec(&[("w", "150"), ("h", "150"), ("mode", "crop")]),
            &presets(),
        );
        let b = derive(
            "/photo.jpg",
            &spec(&[("mode", "crop"), ("h", "150"), ("w", "150")]),
            &presets(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn key_is_formatting_insensitive() {
        let a = derive("/photo.jpg", &spec(&[("w", "150")]), &presets());
        let b = derive("/photo.jpg", &spec(&[("w", "150.0")]), &presets());
        assert_eq!(a, b);
    }

    #[test]
    fn different_dimensions_produce_different_keys() {
        let a = derive("/photo.jpg", &spec(&[("w", "150"), ("h", "150")]), &presets());
        let b = derive("/photo.jpg", &spec(&[("w", "300"), ("h", "150")]), &presets());
        assert_ne!(a, b);
    }

    #[test]
    fn mode_is_part_of_the_key() {
        let a = derive(
            "/photo.jpg",
            &spec(&[("w", "150"), ("h", "150"), ("mode", "crop")]),
            &presets(),
        );
        let b = derive(
            "/photo.jpg",
            &spec(&[("w", "150"), ("h", "150"), ("mode", "resize")]),
            &presets(),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn focal_point_is_part_of_the_key() {
        let without = derive(
            "/photo.jpg",
            &spec(&[("w", "150"), ("h", "150")]),
            &presets(),
        );
        let with = derive(
            "/photo.jpg",
            &spec(&[("w", "150"), ("h", "150"), ("fpx", "0.2"), ("fpy", "0.7")]),
            &presets(),
        );
        assert_ne!(without, with);
    }

    #[test]
    fn registered_preset_hashes_under_preset_key() {
        let key = derive("/photo.jpg", &spec(&[("preset", "tiny")]), &presets());
        assert!(key.starts_with("cache/photo"));
        assert!(key.ends_with(".jpg"));
    }

    #[test]
    fn unregistered_preset_yields_plain_path() {
        let key = derive("/photo.jpg", &spec(&[("preset", "nope")]), &presets());
        assert_eq!(key, "photo.jpg");
    }

    #[test]
    fn preset_and_equivalent_dimensions_cache_separately() {
        // tiny = 50x50 crop; the two requests resolve to identical geometry
        // but key different hash inputs.
        let preset_key = derive("/photo.jpg", &spec(&[("preset", "tiny")]), &presets());
        let explicit_key = derive(
            "/photo.jpg",
            &spec(&[("w", "50"), ("h", "50"), ("mode", "crop")]),
            &presets(),
        );
        assert_ne!(preset_key, explicit_key);
    }

    #[test]
    fn dimensions_take_precedence_over_preset_in_key() {
        let a = derive(
            "/photo.jpg",
            &spec(&[("w", "150"), ("preset", "tiny")]),
            &presets(),
        );
        let b = derive("/photo.jpg", &spec(&[("w", "150")]), &presets());
        assert_eq!(a, b);
    }

    #[test]
    fn suffix_insertion_handles_extensionless_names() {
        let key = derive("/blob", &spec(&[("w", "10"), ("h", "10")]), &presets());
        assert!(key.starts_with("cache/blob"));
        assert!(!key.contains('.'));
    }
}
