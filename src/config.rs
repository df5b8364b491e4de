//! Key manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings handed to [`KeyManager::new`](crate::KeyManager::new).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Skip the eager bulk load; keys are read from the backend on first use.
    #[serde(default)]
    pub on_demand_key_load: bool,
    /// Key material in the backend is base64-wrapped armor.
    #[serde(default)]
    pub keys_base64_encoded: bool,
    /// Default signing key (any accepted fingerprint form).
    /// When unset, the first key unlocked becomes the default.
    #[serde(default)]
    pub default_fingerprint: Option<String>,
    /// Deadline for each key backend call, in seconds.
    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,
    /// Deadline for each external resolver lookup, in seconds.
    #[serde(default = "default_resolver_timeout_secs")]
    pub resolver_timeout_secs: u64,
    /// `Version` armor header on produced artifacts (empty to omit).
    #[serde(default = "default_armor_version")]
    pub armor_version: String,
    /// `Comment` armor header on produced artifacts (empty to omit).
    #[serde(default = "default_armor_comment")]
    pub armor_comment: String,
    /// HKP keyserver base URL for remote lookups (e.g. "https://keys.openpgp.org").
    #[serde(default)]
    pub keyserver: Option<String>,
}

fn default_backend_timeout_secs() -> u64 {
    10
}

fn default_resolver_timeout_secs() -> u64 {
    30
}

fn default_armor_version() -> String {
    "GnuPG v2".to_string()
}

fn default_armor_comment() -> String {
    "Generated by keysmith".to_string()
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            on_demand_key_load: false,
            keys_base64_encoded: false,
            default_fingerprint: None,
            backend_timeout_secs: default_backend_timeout_secs(),
            resolver_timeout_secs: default_resolver_timeout_secs(),
            armor_version: default_armor_version(),
            armor_comment: default_armor_comment(),
            keyserver: None,
        }
    }
}

impl ManagerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver_timeout_secs)
    }
}
