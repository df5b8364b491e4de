//! The key manager and its shared state.
//!
//! One `RwLock` guards the index, the unlocked-key cache and the default
//! fingerprint. Operations hold it only while touching that state; parsing,
//! crypto and collaborator I/O run with the lock released.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::KeyBackend;
use crate::config::ManagerConfig;
use crate::entity::{Entity, UnlockedKey};
use crate::error::{Error, Result};
use crate::index::KeyIndex;
use crate::internal::{public_key_to_armored, ArmorHeaders};
use crate::resolver::{KeyResolver, StickyKeyRing};
use crate::types::{Deadline, KeyInfo};

pub(crate) struct ManagerState {
    pub(crate) index: KeyIndex,
    /// Master and subkey fingerprints mapped to the unlocked master key
    pub(crate) unlocked: HashMap<String, Arc<UnlockedKey>>,
    pub(crate) default_fingerprint: Option<String>,
}

/// Loads, indexes and unlocks OpenPGP keys and runs sign, verify, encrypt and
/// decrypt on their behalf.
///
/// A manager cannot exist without a [`KeyBackend`]. The external
/// [`KeyResolver`] defaults to a [`StickyKeyRing`] built from the config.
pub struct KeyManager {
    pub(crate) config: ManagerConfig,
    pub(crate) backend: Arc<dyn KeyBackend>,
    pub(crate) resolver: Arc<dyn KeyResolver>,
    pub(crate) headers: ArmorHeaders,
    state: RwLock<ManagerState>,
}

impl KeyManager {
    /// Create a manager over `backend`, with the default resolver.
    pub fn new(config: ManagerConfig, backend: Arc<dyn KeyBackend>) -> Result<Self> {
        let resolver: Arc<dyn KeyResolver> = Arc::new(StickyKeyRing::from_config(&config)?);
        Ok(Self::with_resolver(config, backend, resolver))
    }

    /// Create a manager with an explicit external resolver.
    pub fn with_resolver(
        config: ManagerConfig,
        backend: Arc<dyn KeyBackend>,
        resolver: Arc<dyn KeyResolver>,
    ) -> Self {
        let headers = ArmorHeaders::new(&config.armor_version, &config.armor_comment);
        let state = ManagerState {
            index: KeyIndex::new(),
            unlocked: HashMap::new(),
            default_fingerprint: config.default_fingerprint.clone(),
        };

        tracing::debug!(
            backend = backend.name(),
            path = %backend.path(),
            on_demand = config.on_demand_key_load,
            "Key manager created"
        );

        Self {
            config,
            backend,
            resolver,
            headers,
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, ManagerState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, ManagerState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn backend_deadline(&self) -> Deadline {
        Deadline::after(self.config.backend_timeout())
    }

    pub(crate) fn resolver_deadline(&self) -> Deadline {
        Deadline::after(self.config.resolver_timeout())
    }

    /// Canonical 16-char fingerprint for `fp`, or `None` if it cannot be
    /// resolved. Idempotent.
    pub fn fix_fingerprint(&self, fp: &str) -> Option<String> {
        self.read_state().index.sanitize(fp)
    }

    pub(crate) fn require_fingerprint(&self, fp: &str) -> Result<String> {
        self.fix_fingerprint(fp)
            .ok_or_else(|| Error::KeyNotFound(fp.to_string()))
    }

    /// Minimum RSA modulus accepted for key generation.
    pub fn min_key_bits(&self) -> u32 {
        crate::MIN_KEY_BITS
    }

    /// The default signing key, configured or adopted on first unlock.
    pub fn default_fingerprint(&self) -> Option<String> {
        let state = self.read_state();
        state
            .default_fingerprint
            .as_deref()
            .and_then(|fp| state.index.sanitize(fp))
    }

    /// Entity from the local index (tiers one and two only).
    pub(crate) fn local_entity(&self, fp: &str) -> Result<Option<Arc<Entity>>> {
        let state = self.read_state();
        Ok(state.index.lookup(fp)?.map(|hit| hit.entity().clone()))
    }

    /// Three-tier public key resolution: the local index, one hop through
    /// the subkey map, then the external resolver. Remote hits are kept in
    /// the index for the life of the manager.
    pub(crate) fn resolve_public(&self, fp: &str) -> Result<Arc<Entity>> {
        let local_miss = match self.local_entity(fp) {
            Ok(Some(entity)) => return Ok(entity),
            Ok(None) => Error::KeyNotFound(fp.to_string()),
            Err(e) if e.is_not_found() => e,
            Err(e) => return Err(e),
        };

        let entity = match self.resolver.get_key(fp, self.resolver_deadline())? {
            Some(entity) => entity,
            None => return Err(local_miss),
        };

        let mut state = self.write_state();
        if state.index.insert(entity.clone()) {
            tracing::debug!(fingerprint = %entity.fingerprint(), "Cached resolver key");
        }
        state.index.map_subkey(fp, entity.fingerprint());

        Ok(state
            .index
            .get(entity.fingerprint())
            .cloned()
            .unwrap_or(entity))
    }

    /// Public key for `fp`, resolved through every tier.
    pub fn public_key(&self, fp: &str) -> Result<Arc<Entity>> {
        let fp = self.require_fingerprint(fp)?;
        self.resolve_public(&fp)
    }

    /// ASCII-armored public key for `fp`.
    pub fn public_key_armored(&self, fp: &str) -> Result<String> {
        let entity = self.public_key(fp)?;
        public_key_to_armored(entity.public_key(), &self.headers)
    }

    /// Every key in the local index, sorted by fingerprint.
    pub fn loaded_keys(&self) -> Vec<KeyInfo> {
        let state = self.read_state();
        let mut keys: Vec<KeyInfo> = Vec::with_capacity(state.index.len());
        keys.extend(
            state
                .index
                .entities()
                .map(|e| e.info(state.unlocked.contains_key(e.fingerprint()))),
        );
        keys.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        keys
    }

    /// Keys in the local index that carry private material.
    pub fn loaded_private_keys(&self) -> Vec<KeyInfo> {
        self.loaded_keys()
            .into_iter()
            .filter(|k| k.contains_private_key)
            .collect()
    }

    /// Summary of a locally loaded private key.
    pub fn private_key_info(&self, fp: &str) -> Option<KeyInfo> {
        let fp = self.fix_fingerprint(fp)?;
        let state = self.read_state();
        let hit = state.index.lookup(&fp).ok().flatten()?;
        let entity = hit.entity();
        if !entity.has_private_key() {
            return None;
        }
        Some(entity.info(state.unlocked.contains_key(entity.fingerprint())))
    }

    /// Keys held by the external resolver's cache.
    pub fn cached_keys(&self) -> Vec<KeyInfo> {
        self.resolver.cached_keys()
    }
}
