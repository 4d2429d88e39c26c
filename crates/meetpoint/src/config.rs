#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;

use camino::Utf8Path;
use eyre::{Result as EyreResult, WrapErr};
use meetpoint_network::config::{DiscoveryConfig, SwarmConfig};
use meetpoint_rendezvous::config::Timeouts;
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;

/// Optional settings file; every section falls back to its defaults when absent.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub swarm: SwarmConfig,
    pub discovery: DiscoveryConfig,
    pub bootstrap: BootstrapConfig,
    pub timeouts: Timeouts,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BootstrapConfig {
    /// Replaces the public IPFS bootstrap list when set.
    #[serde(default)]
    pub nodes: Option<Vec<String>>,
}

impl ConfigFile {
    pub async fn load(path: &Utf8Path) -> EyreResult<Self> {
        let content = read_to_string(path)
            .await
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        Self::parse(&content).wrap_err_with(|| format!("invalid configuration in {path:?}"))
    }

    pub fn parse(content: &str) -> EyreResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }
}
