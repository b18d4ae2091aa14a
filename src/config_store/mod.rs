//! ConfigStore - static fleet configuration
//!
//! ## Responsibilities
//!
//! - Load the JSON config file once at startup
//! - Validate every camera entry (a partially configured fleet never runs)
//! - Hand out immutable `CameraProfile`s and fleet-wide settings

mod types;

pub use types::*;

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default config path, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "etc/ptz-tracker.json";

/// ConfigStore instance
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    config: Arc<FleetConfig>,
}

impl ConfigStore {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut store = Self::from_json(&contents)?;
        store.path = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            cameras = store.config.cameras.len(),
            "Fleet configuration loaded"
        );

        Ok(store)
    }

    /// Parse and validate config text
    pub fn from_json(contents: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(contents)
            .map_err(|e| Error::Config(format!("invalid config file: {}", e)))?;
        let config = Self::validate(file)?;

        Ok(Self {
            path: None,
            config: Arc::new(config),
        })
    }

    fn validate(file: ConfigFile) -> Result<FleetConfig> {
        if file.cameras.is_empty() {
            return Err(Error::Config("no cameras configured".to_string()));
        }

        if let Some(zone) = file.utm_zone {
            if !(1..=60).contains(&zone) {
                return Err(Error::Config(format!("utm_zone out of range: {}", zone)));
            }
        }

        let mut seen = HashSet::new();
        let mut cameras = Vec::with_capacity(file.cameras.len());
        for entry in file.cameras {
            let profile = CameraProfile::try_from(entry)?;
            if !seen.insert(profile.sn.clone()) {
                return Err(Error::Config(format!("duplicate camera sn: {}", profile.sn)));
            }
            cameras.push(profile);
        }

        Ok(FleetConfig {
            cameras,
            pid: file.pid_config.unwrap_or_default(),
            connection: file.conn_config,
            group_id: file.group_id.filter(|g| !g.is_empty()),
            utm_zone: file.utm_zone,
            feed: file.feed,
        })
    }

    /// Path the config was loaded from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Fleet configuration
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Look a camera up by serial or by name
    pub fn camera(&self, id: &str) -> Option<&CameraProfile> {
        self.config
            .cameras
            .iter()
            .find(|c| c.sn == id)
            .or_else(|| self.config.cameras.iter().find(|c| c.name == id))
    }
}
