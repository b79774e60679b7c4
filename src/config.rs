//! Process configuration, loaded from TOML and `CAMPUSMOD_`-prefixed
//! environment variables. Distinct from the moderation configuration
//! document, which lives in the store and is managed by `admin_config`.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub listen_address: Option<SocketAddr>,
    /// Public host name, used to mint media download URLs.
    pub host_name: String,
    /// SQLite connection string for the document store.
    pub db: String,
    pub blob: BlobConfig,
    pub metrics: Option<MetricConfig>,
    /// Suppresses the first-startup console banner in tests.
    #[serde(default)]
    pub test: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BlobConfig {
    /// Root directory for stored objects.
    pub path: PathBuf,
    /// Maximum accepted upload size, in bytes.
    pub limit: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricConfig {
    PrometheusPush(PrometheusPushConfig),
}

#[derive(Deserialize, Debug, Clone)]
pub struct PrometheusPushConfig {
    pub url: String,
}
