//! User configuration, persisted as TOML in `$XDG_CONFIG_HOME/switch-topo/`.
//!
//! Every field has a default, so a missing file or a partial file is fine.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anomaly::{AnomalyPolicy, DetectorConfig, rules::DEFAULT_UNSTABLE_THRESHOLD};
use crate::export::{DEFAULT_MAX_PHY_LINKS, ExportRequest};
use crate::import::ImportConfig;
use crate::model::Confidence;
use crate::transcript::DEFAULT_MAX_BYTES;

/// Errors from loading or saving the configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(topo::config::read),
        help("Ensure the config file is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(topo::config::parse),
        help("Check the TOML syntax. Print the effective configuration with `topo config`.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(topo::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Effective settings for import, detection and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopoConfig {
    /// Transcripts larger than this are refused.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,
    /// Relative expiry spread above which a neighbor counts as unstable.
    #[serde(default = "default_unstable_threshold")]
    pub unstable_threshold: f64,
    /// Physical link cap for single-device diagrams.
    #[serde(default = "default_max_phy_links")]
    pub max_phy_links: usize,
    /// Confidence tiers drawn by default.
    #[serde(default = "default_confidence")]
    pub confidence: Vec<Confidence>,
    #[serde(default)]
    pub anomaly_policy: AnomalyPolicy,
    /// Run the anomaly rules right after each import.
    #[serde(default = "default_detect_on_import")]
    pub detect_on_import: bool,
}

fn default_max_source_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}
fn default_unstable_threshold() -> f64 {
    DEFAULT_UNSTABLE_THRESHOLD
}
fn default_max_phy_links() -> usize {
    DEFAULT_MAX_PHY_LINKS
}
fn default_confidence() -> Vec<Confidence> {
    vec![Confidence::Trusted, Confidence::Suspect]
}
fn default_detect_on_import() -> bool {
    true
}

impl Default for TopoConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: default_max_source_bytes(),
            unstable_threshold: default_unstable_threshold(),
            max_phy_links: default_max_phy_links(),
            confidence: default_confidence(),
            anomaly_policy: AnomalyPolicy::default(),
            detect_on_import: default_detect_on_import(),
        }
    }
}

impl TopoConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml().map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Pretty TOML, as `save` writes it.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            unstable_threshold: self.unstable_threshold,
            policy: self.anomaly_policy,
        }
    }

    /// Import settings; detection is enabled per `detect_on_import`.
    pub fn import(&self) -> ImportConfig {
        let config = ImportConfig::default().with_max_source_bytes(self.max_source_bytes);
        if self.detect_on_import {
            config.with_detection(self.detector())
        } else {
            config
        }
    }

    /// Export request for `devices` with the configured cap and whitelist.
    pub fn export(&self, devices: impl IntoIterator<Item = String>) -> ExportRequest {
        ExportRequest::devices(devices)
            .with_max_phy_links(self.max_phy_links)
            .with_confidence(self.confidence.iter().copied())
    }
}
