//! External key resolution.
//!
//! The manager asks a [`KeyResolver`] for keys its own index does not know.
//! [`StickyKeyRing`] is the stock implementation: an in-memory ring that can
//! fall back to an HKP keyserver (feature `network`). Keys added as sticky
//! stay for the life of the ring.

#[cfg(feature = "network")]
mod keyserver;

#[cfg(feature = "network")]
pub use keyserver::KeyServer;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::ManagerConfig;
use crate::entity::Entity;
use crate::error::Result;
use crate::types::{Deadline, KeyInfo};

/// Source of public keys outside the manager's index.
pub trait KeyResolver: Send + Sync {
    /// Offer a key to the resolver's cache.
    fn add_key(&self, entity: Arc<Entity>, sticky: bool);

    /// Look up a 16-char primary or subkey fingerprint. `Ok(None)` is a miss.
    fn get_key(&self, fp: &str, deadline: Deadline) -> Result<Option<Arc<Entity>>>;

    /// Summaries of every cached key.
    fn cached_keys(&self) -> Vec<KeyInfo>;
}

struct CachedEntry {
    entity: Arc<Entity>,
    sticky: bool,
}

#[derive(Default)]
struct RingState {
    keys: HashMap<String, CachedEntry>,
    by_subkey: HashMap<String, String>,
}

/// In-memory key ring with an optional remote keyserver behind it.
#[derive(Default)]
pub struct StickyKeyRing {
    state: RwLock<RingState>,
    #[cfg(feature = "network")]
    keyserver: Option<KeyServer>,
}

impl StickyKeyRing {
    /// An empty ring without remote lookups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ring for a manager config: with the `network` feature, a configured
    /// `keyserver` URL enables remote lookups.
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        #[cfg(feature = "network")]
        {
            if let Some(url) = &config.keyserver {
                return Ok(Self::with_keyserver(KeyServer::new(url)?));
            }
        }

        #[cfg(not(feature = "network"))]
        {
            if let Some(url) = &config.keyserver {
                tracing::warn!(keyserver = %url, "Keyserver configured but network support is disabled");
            }
        }

        Ok(Self::new())
    }

    /// A ring that falls back to `keyserver` on a miss.
    #[cfg(feature = "network")]
    pub fn with_keyserver(keyserver: KeyServer) -> Self {
        Self {
            state: RwLock::default(),
            keyserver: Some(keyserver),
        }
    }

    fn lookup_cached(&self, fp: &str) -> Option<Arc<Entity>> {
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        let primary = state.by_subkey.get(fp).map(String::as_str).unwrap_or(fp);
        state.keys.get(primary).map(|entry| entry.entity.clone())
    }

    #[cfg(feature = "network")]
    fn lookup_remote(&self, fp: &str, deadline: Deadline) -> Result<Option<Arc<Entity>>> {
        let Some(keyserver) = &self.keyserver else {
            return Ok(None);
        };

        let Some(entity) = keyserver.fetch_by_keyid(fp, deadline)? else {
            return Ok(None);
        };

        let entity = Arc::new(entity);
        tracing::info!(
            fingerprint = %entity.fingerprint(),
            keyserver = %keyserver.base_url(),
            "Fetched key from keyserver"
        );
        self.add_key(entity.clone(), true);
        Ok(Some(entity))
    }

    #[cfg(not(feature = "network"))]
    fn lookup_remote(&self, _fp: &str, _deadline: Deadline) -> Result<Option<Arc<Entity>>> {
        Ok(None)
    }
}

impl KeyResolver for StickyKeyRing {
    fn add_key(&self, entity: Arc<Entity>, sticky: bool) {
        let fp = entity.fingerprint().to_string();
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());

        if let Some(existing) = state.keys.get(&fp) {
            if existing.sticky && !sticky {
                return;
            }
        }

        for subkey in entity.subkeys() {
            state
                .by_subkey
                .insert(subkey.fingerprint().to_string(), fp.clone());
        }
        state.keys.insert(fp, CachedEntry { entity, sticky });
    }

    fn get_key(&self, fp: &str, deadline: Deadline) -> Result<Option<Arc<Entity>>> {
        if let Some(entity) = self.lookup_cached(fp) {
            return Ok(Some(entity));
        }
        deadline.check("key resolver")?;
        self.lookup_remote(fp, deadline)
    }

    fn cached_keys(&self) -> Vec<KeyInfo> {
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        let mut keys: Vec<KeyInfo> = state
            .keys
            .values()
            .map(|entry| entry.entity.info(false))
            .collect();
        keys.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        keys
    }
}
