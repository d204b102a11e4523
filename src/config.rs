//! Server configuration module.
//!
//! Handles loading and validating the `assetserve.toml` consumed at startup.
//! Every option has a default; user files are sparse and only override what
//! they need. Unknown keys are rejected to catch typos early.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! upload_dir = "assets"        # Root directory for stored blobs
//! route = "assets"             # URL segment used when deriving absolute URLs
//! # url_prefix = "https://cdn.example.com/assets/"  # Static prefix (optional)
//!
//! [preview]
//! max_width = 1600             # Preview bounding box
//! max_height = 1600
//!
//! # Extra presets; matching names replace the built-ins
//! # (tiny/thumb/small/medium/large).
//! [[presets]]
//! name = "hero"
//! width = 1200
//! height = 600
//! mode = "crop"
//! ```

use crate::transform::{Preset, PresetRegistry, PreviewConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Asset server configuration.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetServerConfig {
    /// Root directory for stored blobs.
    pub upload_dir: PathBuf,
    /// URL path segment assets are served under; used when deriving absolute
    /// URLs from a request's scheme and host.
    pub route: String,
    /// Static absolute-URL prefix. When set, wins over derivation.
    pub url_prefix: Option<String>,
    /// Preview bounding box.
    pub preview: PreviewConfig,
    /// Caller presets, merged over the built-ins by name.
    pub presets: Vec<Preset>,
}

impl Default for AssetServerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("assets"),
            route: "assets".to_string(),
            url_prefix: None,
            preview: PreviewConfig::default(),
            presets: Vec::new(),
        }
    }
}

impl AssetServerConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.route.is_empty() {
            return Err(ConfigError::Validation("route must not be empty".into()));
        }
        if self.preview.max_width == 0 || self.preview.max_height == 0 {
            return Err(ConfigError::Validation(
                "preview.max_width and preview.max_height must be non-zero".into(),
            ));
        }
        for preset in &self.presets {
            if preset.name.is_empty() {
                return Err(ConfigError::Validation("preset name must not be empty".into()));
            }
            if preset.width == 0 || preset.height == 0 {
                return Err(ConfigError::Validation(format!(
                    "preset '{}' dimensions must be non-zero",
                    preset.name
                )));
            }
        }
        Ok(())
    }

    /// Build the process-wide preset table: built-ins overridden by this
    /// config's presets.
    pub fn preset_registry(&self) -> PresetRegistry {
        let mut registry = PresetRegistry::new();
        registry.merge(self.presets.iter().cloned());
        registry
    }
}

/// A stock config file with all options documented, for `gen-config`.
pub fn stock_config_toml() -> String {
    let mut out = String::new();
    out.push_str("# assetserve configuration\n");
    out.push_str("# All options are optional - defaults shown below.\n\n");
    out.push_str("# Root directory for stored blobs\nupload_dir = \"assets\"\n\n");
    out.push_str("# URL segment used when deriving absolute asset URLs\nroute = \"assets\"\n\n");
    out.push_str("# Static absolute-URL prefix; wins over derivation when set\n");
    out.push_str("# url_prefix = \"https://cdn.example.com/assets/\"\n\n");
    out.push_str("# Previews are contained within this bounding box\n");
    out.push_str("[preview]\nmax_width = 1600\nmax_height = 1600\n\n");
    out.push_str("# Extra transform presets; matching names replace built-ins\n");
    out.push_str("# (tiny/thumb/small/medium/large).\n");
    out.push_str("# [[presets]]\n# name = \"hero\"\n# width = 1200\n# height = 600\n# mode = \"crop\"\n");
    out
}
