//! Storage filename generation: normalization, conflict ordinals, sharding.
//!
//! Uploaded filenames arrive as arbitrary user input (`Fête du Vélo.JPG`) and
//! must become safe, collision-free storage-relative paths. This module owns
//! the whole journey:
//!
//! - [`normalize_string`] folds the name to a plain lowercase slug while
//!   preserving the extension.
//! - [`DefaultNamingStrategy`] appends `__preview` for preview blobs and
//!   resolves collisions with a zero-padded `__NN` ordinal suffix.
//! - [`HashedNamingStrategy`] wraps the default strategy and prefixes names
//!   with `source/` or `preview/` plus a 2-hex-character shard directory, so
//!   no single directory accumulates an unbounded number of files.
//! - [`generate_unique_name`] drives a strategy against an existence probe
//!   until a free name is found, bounded by [`MAX_NAME_ATTEMPTS`].

use sha2::{Digest, Sha256};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Upper bound on conflict-resolution attempts per name.
///
/// A store retrying past this many ordinals indicates something pathological
/// (or adversarial) about the inputs; failing loudly beats spinning in the
/// probe loop.
pub const MAX_NAME_ATTEMPTS: u32 = 50;

/// Extensions the transform engine can re-encode format-for-format.
/// Previews of anything else are forced to `.png`.
const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff"];

/// Characters stripped outright during normalization.
const STRIPPED_PUNCTUATION: &[char] = &[
    '!', '"', '£', '$', '%', '^', '&', '*', '(', ')', '+', '[', ']', '{', '}', ';', ':', '@', '#',
    '~', '?', '\\', '/', ',', '|', '>', '<', '`', '¬', '\'', '=',
];

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("could not find a free name after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Normalize an arbitrary filename into a storage-safe slug.
///
/// Unicode-decomposes the input (NFD), drops combining marks, lowercases,
/// removes punctuation, and collapses whitespace runs to `replacer`. The
/// extension survives because `.` is not in the stripped set.
///
/// ```
/// # use assetserve::naming::normalize_string;
/// assert_eq!(normalize_string("Fête du Vélo.JPG", "-"), "fete-du-velo.jpg");
/// ```
pub fn normalize_string(input: &str, replacer: &str) -> String {
    let stripped: String = input
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .flat_map(|c| c.to_lowercase())
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect();

    // Collapse whitespace runs into a single replacer.
    let mut out = String::with_capacity(stripped.len());
    let mut in_whitespace = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push_str(replacer);
                in_whitespace = true;
            }
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out
}

/// Pluggable naming policy for stored source and preview blobs.
///
/// `conflict` is the previously generated name that turned out to exist;
/// strategies use it to derive the next candidate (ordinal bump). The caller
/// loops via [`generate_unique_name`] until the storage probe reports free.
pub trait NamingStrategy: Send + Sync {
    fn generate_source_name(&self, original: &str, conflict: Option<&str>) -> String;
    fn generate_preview_name(&self, source_name: &str, conflict: Option<&str>) -> String;
}

/// Normalizes names and resolves conflicts with an incrementing `__NN` suffix.
#[derive(Debug, Default)]
pub struct DefaultNamingStrategy;

impl DefaultNamingStrategy {
    pub fn new() -> Self {
        Self
    }

    fn increment_ordinal_suffix(&self, base: &str, conflict: &str) -> String {
        let next = parse_ordinal(conflict) + 1;
        add_suffix(base, &format!("__{next:02}"))
    }
}

impl NamingStrategy for DefaultNamingStrategy {
    fn generate_source_name(&self, original: &str, conflict: Option<&str>) -> String {
        let normalized = normalize_string(original, "-");
        match conflict {
            None => normalized,
            Some(conflict) => self.increment_ordinal_suffix(&normalized, conflict),
        }
    }

    fn generate_preview_name(&self, source_name: &str, conflict: Option<&str>) -> String {
        let preview = if is_supported_image_format(source_name) {
            add_suffix(source_name, "__preview")
        } else {
            // The engine cannot guarantee format-preserving output for other
            // formats; those previews are always encoded as PNG.
            format!("{}.png", add_suffix(source_name, "__preview"))
        };
        match conflict {
            None => preview,
            Some(conflict) => self.increment_ordinal_suffix(&preview, conflict),
        }
    }
}

/// Hashed-directory decorator over [`DefaultNamingStrategy`].
///
/// Generated names gain a `source/` or `preview/` prefix plus a two-character
/// shard directory taken from a hash of the final filename. With 256 shards a
/// store of 200k assets keeps every directory under ~800 entries. The hash
/// only needs good distribution, not integrity.
#[derive(Debug, Default)]
pub struct HashedNamingStrategy {
    inner: DefaultNamingStrategy,
}

impl HashedNamingStrategy {
    pub fn new() -> Self {
        Self {
            inner: DefaultNamingStrategy::new(),
        }
    }

    fn hashed_dir(filename: &str) -> String {
        let digest = Sha256::digest(filename.as_bytes());
        format!("{digest:x}")[..2].to_string()
    }
}

impl NamingStrategy for HashedNamingStrategy {
    fn generate_source_name(&self, original: &str, conflict: Option<&str>) -> String {
        let filename = self.inner.generate_source_name(original, conflict);
        format!("source/{}/{}", Self::hashed_dir(&filename), filename)
    }

    fn generate_preview_name(&self, source_name: &str, conflict: Option<&str>) -> String {
        let filename = self.inner.generate_preview_name(source_name, conflict);
        format!("preview/{}/{}", Self::hashed_dir(&filename), filename)
    }
}

/// Drive a naming function against an existence probe until a free name
/// appears, bounded by [`MAX_NAME_ATTEMPTS`].
///
/// Each round feeds the previous (conflicting) candidate back into the
/// generator so it can bump the ordinal.
pub fn generate_unique_name(
    input: &str,
    mut generate: impl FnMut(&str, Option<&str>) -> String,
    exists: impl Fn(&str) -> bool,
) -> Result<String, NamingError> {
    let mut candidate: Option<String> = None;
    for _ in 0..MAX_NAME_ATTEMPTS {
        let next = generate(input, candidate.as_deref());
        if !exists(&next) {
            return Ok(next);
        }
        candidate = Some(next);
    }
    Err(NamingError::Exhausted {
        attempts: MAX_NAME_ATTEMPTS,
    })
}

/// Parse the trailing `__NN` ordinal from a previously conflicting name.
///
/// Absent or unparsable ordinals count as 1, so the first retry of `photo.jpg`
/// becomes `photo__02.jpg`.
fn parse_ordinal(conflict: &str) -> u32 {
    let (stem, _ext) = split_extension(basename(conflict));
    match stem.rsplit_once("__") {
        Some((_, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<u32>().ok().filter(|&n| n > 0).unwrap_or(1)
        }
        _ => 1,
    }
}

/// Insert `suffix` between a filename's stem and extension.
///
/// Operates on the basename: any directory components of `name` are dropped,
/// which is what lets a preview name derived from `source/ab/photo.jpg` start
/// over under its own `preview/` shard.
fn add_suffix(name: &str, suffix: &str) -> String {
    let (stem, ext) = split_extension(basename(name));
    format!("{stem}{suffix}{ext}")
}

fn basename(name: &str) -> &str {
    name.rsplit_once('/').map_or(name, |(_, base)| base)
}

/// Split `photo.jpg` into `("photo", ".jpg")`. Dotfiles and extensionless
/// names yield an empty extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

fn is_supported_image_format(name: &str) -> bool {
    let (_, ext) = split_extension(basename(name));
    ext.strip_prefix('.')
        .is_some_and(|e| SUPPORTED_IMAGE_EXTENSIONS.contains(&e))
}
