//! Composer settings loaded from a JSON file.

use crate::composer::{Capabilities, Composer};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A custom header added to every composed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Settings applied to every message a deployment composes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Domain used in generated Message-Ids instead of the local host name.
    pub hostname: Option<String>,
    /// Address added to every message as an automatic Bcc.
    pub auto_bcc: Option<String>,
    /// Value of the `X-Mailer` header.
    pub mailer: Option<String>,
    /// Extra headers, in output order.
    pub headers: Vec<CustomHeader>,
}

impl ComposerConfig {
    /// Default location: `<config dir>/mailcraft/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailcraft")
            .join("config.json")
    }

    /// Loads settings from `path`, falling back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Capabilities with the configured host name applied.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::default();
        if let Some(hostname) = self.hostname.as_deref().filter(|h| !h.trim().is_empty()) {
            capabilities.hostname = hostname.trim().to_string();
        }
        capabilities
    }

    /// Applies the per-message settings to a composer.
    #[must_use]
    pub fn apply(&self, mut composer: Composer) -> Composer {
        if let Some(mailer) = &self.mailer {
            composer = composer.header("X-Mailer", mailer);
        }
        for header in &self.headers {
            composer = composer.header(&header.name, &header.value);
        }
        if let Some(address) = &self.auto_bcc {
            composer = composer.auto_bcc(address);
        }
        composer
    }
}
