//! Bake configuration.
//!
//! [`BakeConfig`] is built either in code with the `with_*` builder methods or
//! from a TOML file. Every field has a default, so a config file only needs
//! the keys it changes:
//!
//! ```toml
//! renderer = "/opt/node/bin/mmdc"
//! timeout_secs = 30
//! link_prefix = "images/"
//! theme = "forest"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default program used to render diagrams.
pub const DEFAULT_RENDERER: &str = "mmdc";

/// Default wall-clock budget for a single render.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default alt text of the replacement image line.
pub const DEFAULT_ALT_TEXT: &str = "Diagram";

/// Errors raised while loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path:?}")]
    Read {
        /// Path of the config file.
        path: std::path::PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`BakeConfig`].
    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        /// Path of the config file.
        path: std::path::PathBuf,
        /// The TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Built-in mermaid-cli themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MermaidTheme {
    /// Dark text on a light background
    Default,
    /// Light text on a dark background
    Dark,
    /// Green tones
    Forest,
    /// Grayscale
    Neutral,
}

impl MermaidTheme {
    /// Returns the theme string for the `--theme` flag of mmdc.
    pub fn as_str(&self) -> &'static str {
        match self {
            MermaidTheme::Default => "default",
            MermaidTheme::Dark => "dark",
            MermaidTheme::Forest => "forest",
            MermaidTheme::Neutral => "neutral",
        }
    }
}

impl std::str::FromStr for MermaidTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(MermaidTheme::Default),
            "dark" => Ok(MermaidTheme::Dark),
            "forest" => Ok(MermaidTheme::Forest),
            "neutral" => Ok(MermaidTheme::Neutral),
            other => Err(format!(
                "unknown theme '{other}' (expected default, dark, forest or neutral)"
            )),
        }
    }
}

/// Settings for a bake run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BakeConfig {
    /// Program name (looked up on `PATH`) or path of the renderer.
    pub renderer: String,
    /// Hard wall-clock budget per render, in seconds.
    pub timeout_secs: u64,
    /// Alt text of the `![alt](<id>.png)` replacement line.
    pub alt_text: String,
    /// Prepended to the image file name in the replacement link.
    pub link_prefix: String,
    /// Optional `--theme` for mmdc.
    pub theme: Option<MermaidTheme>,
    /// Optional `--scale` for mmdc.
    pub scale: Option<u32>,
    /// Optional `--backgroundColor` for mmdc.
    pub background: Option<String>,
    /// Extra arguments appended to the mmdc invocation.
    pub extra_args: Vec<String>,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            renderer: DEFAULT_RENDERER.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            alt_text: DEFAULT_ALT_TEXT.to_string(),
            link_prefix: String::new(),
            theme: None,
            scale: None,
            background: None,
            extra_args: Vec::new(),
        }
    }
}

impl BakeConfig {
    /// Loads a config from a TOML file; absent keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The per-render budget as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sets the renderer program.
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = renderer.into();
        self
    }

    /// Sets the per-render budget, in seconds.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the alt text of the replacement line.
    #[must_use]
    pub fn with_alt_text(mut self, alt_text: impl Into<String>) -> Self {
        self.alt_text = alt_text.into();
        self
    }

    /// Sets the prefix of image links (e.g. `"images/"`).
    #[must_use]
    pub fn with_link_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.link_prefix = prefix.into();
        self
    }

    /// Sets the mmdc theme.
    #[must_use]
    pub fn with_theme(mut self, theme: MermaidTheme) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Sets the mmdc output scale (minimum 1).
    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale.max(1));
        self
    }

    /// Sets the mmdc background color (e.g. `"transparent"`).
    #[must_use]
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }
}
