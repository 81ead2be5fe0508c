//! Settings layering: hardcoded defaults, then the config file, then
//! `VIRT_CLUSTER_*` environment variables.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::Selector;
use crate::core::transport::CredentialSource;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/virt-cluster/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub cluster: ClusterSettings,
    /// Per-host credential overrides, keyed by endpoint URI.
    #[serde(default)]
    pub auth: HashMap<String, AuthSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Whitespace-separated host entries. An entry containing `://` is used
    /// as-is; anything else is substituted into the `uri` template.
    pub hosts: String,
    /// URI template applied to bare hostnames, with a `{host}` placeholder.
    pub uri: String,
    /// Print a header row above tabular output.
    pub headers: bool,
    /// Default placement scoring rule.
    pub selector: Selector,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Settings {
    /// Loads from the default path (or `VIRT_CLUSTER_CONFIG_PATH`); a
    /// missing file just means defaults plus environment.
    pub fn new() -> Result<Self, ConfigError> {
        let path = std::env::var("VIRT_CLUSTER_CONFIG_PATH")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path), false)
    }

    /// Loads from an explicitly requested file, which must exist.
    pub fn new_from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(path, true)
    }

    fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        debug!("loading configuration from {}", path.display());

        let config = Config::builder()
            .set_default("cluster.hosts", "localhost")?
            .set_default("cluster.uri", "qemu+ssh://{host}/system")?
            .set_default("cluster.headers", false)?
            .set_default("cluster.selector", "mem")?
            .add_source(File::from(path.to_path_buf()).required(required))
            .add_source(Environment::with_prefix("VIRT_CLUSTER").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Endpoint URIs in configured order.
    pub fn host_uris(&self) -> Vec<String> {
        self.cluster
            .hosts
            .split_whitespace()
            .map(|entry| {
                if entry.contains("://") {
                    entry.to_string()
                } else {
                    self.cluster.uri.replace("{host}", entry)
                }
            })
            .collect()
    }
}

impl CredentialSource for Settings {
    fn username(&self, uri: &str) -> Option<String> {
        self.auth.get(uri).and_then(|a| a.username.clone())
    }

    fn password(&self, uri: &str) -> Option<String> {
        self.auth.get(uri).and_then(|a| a.password.clone())
    }
}

pub fn generate_default_config() -> Settings {
    Settings {
        cluster: ClusterSettings {
            hosts: "localhost".to_string(),
            uri: "qemu+ssh://{host}/system".to_string(),
            headers: false,
            selector: Selector::Mem,
        },
        auth: HashMap::new(),
    }
}
