//! # assetserve
//!
//! Binary asset storage with on-demand, cached image transforms. Uploads get
//! normalized, sharded storage names and an automatic preview; any stored
//! image can then be requested in arbitrary sizes and crops through query
//! parameters, with each distinct variant generated on first request and
//! cached for every request after.
//!
//! # Architecture: Miss-Driven Variant Pipeline
//!
//! Serving is a two-step protocol where a cache miss is data, not an error:
//!
//! ```text
//! request(path, query) → derive cache key → read
//!     hit  → respond
//!     miss → load source → transform → write-through → respond
//! ```
//!
//! Variants never expire and are never invalidated automatically; a cache
//! entry is simply a stored blob whose name encodes the transform that made
//! it. Deleting the file is the only (manual) invalidation.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Filename normalization, `__NN` conflict ordinals, hashed-directory sharding |
//! | [`storage`] | `StorageBackend` trait and the local-filesystem implementation |
//! | [`transform`] | Geometry math, entropy/focal cropping, encoding, preview generation |
//! | [`cache_key`] | Query parameters → deterministic cache identifier |
//! | [`serve`] | The request pipeline: hit/miss state machine and content types |
//! | [`upload`] | Asset ingestion: unique naming, source + preview persistence |
//! | [`config`] | `assetserve.toml` loading and validation |
//!
//! # Design Decisions
//!
//! ## Strategies Are Traits, Chosen at Startup
//!
//! Naming ([`naming::NamingStrategy`]) and storage
//! ([`storage::StorageBackend`]) are trait objects selected once while
//! building the [`serve::AssetPipeline`]. The pipeline is an explicit context
//! handed to request handlers — there is no module-level singleton to
//! bootstrap or to trip over in tests.
//!
//! ## Pure-Rust Imaging
//!
//! All pixel work goes through the `image` crate (Lanczos3 resampling): no
//! ImageMagick, no libvips, no system dependencies. Entropy cropping is a
//! greyscale-histogram heuristic over candidate windows; focal-point cropping
//! is exact geometry. Output re-encodes in the source's own format where
//! possible, falling back to PNG.
//!
//! ## Deterministic Cache Identifiers
//!
//! Query parameters are parsed into canonical numeric forms before hashing,
//! so `?w=150&h=150` and `?h=150.0&w=150` name the same cache entry. Preset
//! requests hash a different input string than explicit dimensions and so
//! cache separately, even at identical geometry — a quirk of the serving
//! contract this crate preserves on purpose.
//!
//! # Concurrency
//!
//! The pipeline is synchronous and `Send + Sync`; the embedding layer brings
//! its own worker pool (the CLI uses rayon). Concurrent misses for the same
//! variant may race, which is safe: transforms are deterministic enough to be
//! idempotent in effect and the cache write is last-write-wins.

pub mod cache_key;
pub mod config;
pub mod naming;
pub mod serve;
pub mod storage;
pub mod transform;
pub mod upload;
