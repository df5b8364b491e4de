//! In-memory key index.
//!
//! Entities are keyed by their 16-char fingerprint. Two side maps make other
//! forms resolvable: 8-char short ids, and subkey fingerprints pointing at
//! their master. Subkeys only enter the subkey map for entities that carry
//! private material.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::fingerprint::{normalize, short_form, Normalized};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShortId {
    Unique(String),
    Ambiguous,
}

/// Local lookup hit.
#[derive(Debug, Clone)]
pub(crate) enum LocalHit {
    /// The fingerprint is a primary key in the index
    Direct(Arc<Entity>),
    /// The fingerprint is a subkey of this master
    ViaSubkey(Arc<Entity>),
}

impl LocalHit {
    pub(crate) fn entity(&self) -> &Arc<Entity> {
        match self {
            LocalHit::Direct(e) | LocalHit::ViaSubkey(e) => e,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct KeyIndex {
    entities: HashMap<String, Arc<Entity>>,
    short_ids: HashMap<String, ShortId>,
    subkey_to_master: HashMap<String, String>,
}

impl KeyIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Canonical 16-char form of `raw`, or `None` when it cannot be resolved.
    ///
    /// 8-char forms resolve only when exactly one loaded key ends with them.
    pub(crate) fn sanitize(&self, raw: &str) -> Option<String> {
        match normalize(raw)? {
            Normalized::Long(fp) => Some(fp),
            Normalized::Short(short) => match self.short_ids.get(&short) {
                Some(ShortId::Unique(fp)) => Some(fp.clone()),
                Some(ShortId::Ambiguous) => {
                    tracing::warn!(short_id = %short, "Ambiguous short fingerprint");
                    None
                }
                None => None,
            },
        }
    }

    /// Register an entity. A public-only entity never replaces one that
    /// already carries private material. Returns whether the index changed.
    pub(crate) fn insert(&mut self, entity: Arc<Entity>) -> bool {
        let fp = entity.fingerprint().to_string();

        if let Some(existing) = self.entities.get(&fp) {
            if existing.has_private_key() && !entity.has_private_key() {
                return false;
            }
        }

        self.register_short_id(&fp);

        if entity.has_private_key() {
            for subkey in entity.subkeys().iter().filter(|sk| sk.has_private_key()) {
                self.subkey_to_master
                    .insert(subkey.fingerprint().to_string(), fp.clone());
                self.register_short_id(subkey.fingerprint());
            }
        }

        self.entities.insert(fp, entity);
        true
    }

    /// Point a subkey fingerprint at a master already in the index.
    pub(crate) fn map_subkey(&mut self, subkey: &str, master: &str) {
        if subkey != master && self.entities.contains_key(master) {
            self.subkey_to_master
                .insert(subkey.to_string(), master.to_string());
            self.register_short_id(subkey);
        }
    }

    fn register_short_id(&mut self, fp: &str) {
        let short = short_form(fp);
        match self.short_ids.get(&short) {
            Some(ShortId::Unique(existing)) if existing != fp => {
                tracing::debug!(short_id = %short, "Short fingerprint collision");
                self.short_ids.insert(short, ShortId::Ambiguous);
            }
            Some(_) => {}
            None => {
                self.short_ids.insert(short, ShortId::Unique(fp.to_string()));
            }
        }
    }

    /// Tiers one and two of resolution: direct hit, then one hop through the
    /// subkey map. `Ok(None)` means neither tier knows the fingerprint.
    pub(crate) fn lookup(&self, fp: &str) -> Result<Option<LocalHit>> {
        if let Some(entity) = self.entities.get(fp) {
            return Ok(Some(LocalHit::Direct(entity.clone())));
        }

        if let Some(master) = self.subkey_to_master.get(fp) {
            return match self.entities.get(master) {
                Some(entity) => Ok(Some(LocalHit::ViaSubkey(entity.clone()))),
                None => Err(Error::SubkeyUnresolved {
                    subkey: fp.to_string(),
                    master: master.clone(),
                }),
            };
        }

        Ok(None)
    }

    pub(crate) fn get(&self, fp: &str) -> Option<&Arc<Entity>> {
        self.entities.get(fp)
    }

    pub(crate) fn master_of(&self, subkey: &str) -> Option<&str> {
        self.subkey_to_master.get(subkey).map(String::as_str)
    }

    pub(crate) fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.entities.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_secret_key;
    use crate::types::{CipherSuite, Identity};

    fn secret_entity(name: &str) -> Arc<Entity> {
        let identity = Identity {
            name: name.to_string(),
            ..Default::default()
        };
        let key = generate_secret_key(&identity, "pw", CipherSuite::Cv25519).unwrap();
        Arc::new(Entity::from_secret_key(key))
    }

    #[test]
    fn test_sanitize_forms() {
        let mut index = KeyIndex::new();
        let entity = secret_entity("Alice");
        let fp = entity.fingerprint().to_string();
        index.insert(entity.clone());

        assert_eq!(index.sanitize(entity.full_fingerprint()), Some(fp.clone()));
        assert_eq!(index.sanitize(&fp.to_lowercase()), Some(fp.clone()));
        assert_eq!(index.sanitize(&fp[8..]), Some(fp.clone()));
        assert_eq!(index.sanitize("DEADBEEF"), None);
        assert_eq!(index.sanitize("not a fingerprint"), None);

        // Idempotent
        let once = index.sanitize(entity.full_fingerprint()).unwrap();
        assert_eq!(index.sanitize(&once), Some(once.clone()));
    }

    #[test]
    fn test_ambiguous_short_id() {
        let mut index = KeyIndex::new();
        index.register_short_id("1111111187654321");
        index.register_short_id("2222222287654321");
        index.register_short_id("33333333ABCDEF01");

        assert_eq!(index.sanitize("87654321"), None);
        assert_eq!(index.sanitize("ABCDEF01"), Some("33333333ABCDEF01".to_string()));
        // Re-registering the same fingerprint is not a collision
        index.register_short_id("33333333ABCDEF01");
        assert_eq!(index.sanitize("abcdef01"), Some("33333333ABCDEF01".to_string()));
    }

    #[test]
    fn test_subkey_indirection() {
        let mut index = KeyIndex::new();
        let entity = secret_entity("Bob");
        index.insert(entity.clone());

        let subkey_fp = entity.subkeys()[0].fingerprint().to_string();
        assert_eq!(index.master_of(&subkey_fp), Some(entity.fingerprint()));

        match index.lookup(&subkey_fp).unwrap() {
            Some(LocalHit::ViaSubkey(master)) => {
                assert_eq!(master.fingerprint(), entity.fingerprint())
            }
            other => panic!("expected subkey hit, got {:?}", other.map(|h| h.entity().fingerprint().to_string())),
        }
        assert!(matches!(
            index.lookup(entity.fingerprint()).unwrap(),
            Some(LocalHit::Direct(_))
        ));
        assert!(index.lookup("0123456789ABCDEF").unwrap().is_none());
    }

    #[test]
    fn test_public_subkeys_not_mapped() {
        let mut index = KeyIndex::new();
        let entity = secret_entity("Carol");
        let public = Arc::new(entity.to_public());
        index.insert(public);

        let subkey_fp = entity.subkeys()[0].fingerprint();
        assert!(index.master_of(subkey_fp).is_none());
        assert!(index.lookup(subkey_fp).unwrap().is_none());
        assert!(index.lookup(entity.fingerprint()).unwrap().is_some());
    }

    #[test]
    fn test_public_does_not_replace_private() {
        let mut index = KeyIndex::new();
        let entity = secret_entity("Dave");
        assert!(index.insert(entity.clone()));
        assert!(!index.insert(Arc::new(entity.to_public())));
        assert!(index.get(entity.fingerprint()).unwrap().has_private_key());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_dangling_subkey_mapping() {
        let mut index = KeyIndex::new();
        index
            .subkey_to_master
            .insert("AAAAAAAAAAAAAAAA".to_string(), "BBBBBBBBBBBBBBBB".to_string());

        let err = index.lookup("AAAAAAAAAAAAAAAA").unwrap_err();
        assert!(matches!(err, Error::SubkeyUnresolved { .. }));
        assert!(err.is_not_found());
    }
}
