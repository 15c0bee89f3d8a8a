//! Configuration for the DAG subsystem

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::size::Schedule;

/// Runtime configuration, usually read from the `[dag]` section of a node
/// config file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DagConfig {
    /// Size growth schedule (default: canonical Ethash parameters)
    pub schedule: Schedule,

    /// Keep every n-th link of the seed hash chain in memory (default: 1)
    pub seed_checkpoint_interval: u64,

    /// Drop the previous dataset when regeneration starts rather than when
    /// the replacement is published (default: false)
    pub release_previous_early: bool,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            schedule: Schedule::default(),
            seed_checkpoint_interval: 1,
            release_previous_early: false,
        }
    }
}

impl DagConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.seed_checkpoint_interval == 0 {
            return Err(Error::InvalidConfig(
                "seed_checkpoint_interval must be positive".into(),
            ));
        }
        self.schedule.validate()
    }
}
