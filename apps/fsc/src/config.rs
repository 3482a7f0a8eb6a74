//! Application configuration.
//!
//! Loaded from an optional JSON file and overridden by command-line flags.
//!
//! ```json
//! {
//!   "system_name": "Brake-by-wire",
//!   "backend": "redb",
//!   "asil_d_threshold": "99%",
//!   "asil_c_threshold": "90%"
//! }
//! ```

use crate::error::CliResult;
use crate::storage::Backend;
use fsc_core::{Coverage, SessionConfig, VerifierConfig};
use serde::Deserialize;
use std::path::Path;

/// Contents of a `--config` file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub system_name: Option<String>,
    pub backend: Option<String>,
    pub asil_d_threshold: Option<String>,
    pub asil_c_threshold: Option<String>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub system_name: Option<String>,
    pub backend: Backend,
    pub verifier: VerifierConfig,
    /// Whether a threshold was configured explicitly. Stored sessions keep
    /// their own thresholds otherwise.
    pub thresholds_set: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            system_name: None,
            backend: Backend::File,
            verifier: VerifierConfig::default(),
            thresholds_set: false,
        }
    }
}

/// Command-line overrides.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<Backend>,
    pub asil_d_threshold: Option<Coverage>,
    pub asil_c_threshold: Option<Coverage>,
}

impl AppConfig {
    /// Read `path` (if given) and apply `overrides` on top.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> CliResult<Self> {
        let file = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                let parsed: FileConfig = serde_json::from_str(&text)?;
                tracing::debug!(path = %path.display(), "loaded configuration");
                parsed
            }
            None => FileConfig::default(),
        };
        Self::resolve(file, overrides)
    }

    pub fn resolve(file: FileConfig, overrides: &Overrides) -> CliResult<Self> {
        let mut config = Self {
            system_name: file.system_name,
            ..Self::default()
        };
        if let Some(backend) = file.backend {
            config.backend = backend.parse()?;
        }
        if let Some(d) = file.asil_d_threshold {
            config.verifier.asil_d_threshold = d.parse::<Coverage>()?;
            config.thresholds_set = true;
        }
        if let Some(c) = file.asil_c_threshold {
            config.verifier.asil_c_threshold = c.parse::<Coverage>()?;
            config.thresholds_set = true;
        }

        if let Some(backend) = overrides.backend {
            config.backend = backend;
        }
        if let Some(d) = overrides.asil_d_threshold {
            config.verifier.asil_d_threshold = d;
            config.thresholds_set = true;
        }
        if let Some(c) = overrides.asil_c_threshold {
            config.verifier.asil_c_threshold = c;
            config.thresholds_set = true;
        }
        Ok(config)
    }

    /// Session configuration for a new session.
    pub fn session_config(&self, fallback_name: &str) -> SessionConfig {
        SessionConfig {
            system_name: self
                .system_name
                .clone()
                .unwrap_or_else(|| fallback_name.to_string()),
            verifier: self.verifier,
        }
    }
}
