//! Configuration loader
//!
//! Loads `MdfConfig` from YAML. All keys are optional:
//!
//! ```yaml
//! extensions: [mdl, mdf]
//! import_paths: [shared/definitions]
//! suggestions: true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "MDF_CONFIG";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "mdf.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdfConfig {
    /// File extensions picked up by directory loads, without the leading dot
    pub extensions: Vec<String>,
    /// Extra roots searched by the filesystem importer
    pub import_paths: Vec<PathBuf>,
    /// Attach "did you mean" hints to unresolved-type errors
    pub suggestions: bool,
}

impl Default for MdfConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["mdl".to_string()],
            import_paths: Vec::new(),
            suggestions: true,
        }
    }
}

impl MdfConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: MdfConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        info!(
            "Loaded config from {} ({} extensions, {} import paths)",
            path.display(),
            config.extensions.len(),
            config.import_paths.len()
        );
        Ok(config)
    }

    /// Resolution order:
    /// 1. the file named by `MDF_CONFIG`
    /// 2. `mdf.yaml` in the working directory
    /// 3. defaults
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(path);
        }

        if Path::new(DEFAULT_CONFIG_FILE).is_file() {
            return Self::load(DEFAULT_CONFIG_FILE);
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Whether `path` carries one of the configured extensions
    pub fn matches_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|configured| configured.trim_start_matches('.') == ext)
    }
}
