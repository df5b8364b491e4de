//! Loading keys into the index, and saving them to the backend.
//!
//! Batch loads never abort on a bad entry: the failure is logged and
//! recorded in the returned [`LoadReport`].

use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::internal::parse_key_bundle;
use crate::manager::KeyManager;
use crate::types::LoadReport;

/// JSON sidecar stored next to a key.
#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl KeyManager {
    /// Load every key the backend lists.
    ///
    /// In on-demand mode this does nothing; keys are then read from the
    /// backend the first time they are needed.
    ///
    /// # Errors
    /// Only a failure to list the backend is returned. Entries that cannot
    /// be read, decoded or parsed are skipped and reported.
    pub fn load_keys(&self) -> Result<LoadReport> {
        if self.config.on_demand_key_load {
            tracing::warn!("On-demand key loading enabled, skipping bulk load");
            return Ok(LoadReport::default());
        }

        let ids = self
            .backend
            .list(self.backend_deadline())
            .map_err(|e| Error::Backend(format!("listing {}: {}", self.backend.name(), e)))?;

        tracing::info!(count = ids.len(), backend = self.backend.name(), "Loading keys");

        let mut report = LoadReport::default();
        for id in ids {
            match self.load_stored(&id) {
                Ok(loaded) => report.merge(loaded),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Skipping key");
                    report.failures.push((id, e.to_string()));
                }
            }
        }

        tracing::info!(
            public_keys = report.public_keys,
            private_keys = report.private_keys,
            failures = report.failures.len(),
            "Keys loaded"
        );
        Ok(report)
    }

    /// Read one key from the backend and load it. Used for lazy loads.
    pub fn load_key_from_backend(&self, fp: &str) -> Result<LoadReport> {
        let fp = self.require_fingerprint(fp)?;
        tracing::debug!(fingerprint = %fp, "Loading key from backend");
        self.load_stored(&fp)
    }

    fn load_stored(&self, id: &str) -> Result<LoadReport> {
        let stored = self.backend.read(id, self.backend_deadline())?;
        let armored = self.decode_stored(&stored.key_data)?;
        self.load_key_with_metadata(&armored, stored.metadata.as_deref())
    }

    fn decode_stored(&self, data: &str) -> Result<String> {
        if !self.config.keys_base64_encoded {
            return Ok(data.to_string());
        }
        let compact: String = data.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
        String::from_utf8(bytes).map_err(|e| Error::Parse(format!("key is not UTF-8: {}", e)))
    }

    /// Parse an armored bundle (one or more transferable keys) into the index.
    ///
    /// The bundle is a single armor block; several keys travel as
    /// concatenated packets inside it. Text after the first block is not
    /// read. Keys in the bundle that fail to parse are skipped and reported.
    ///
    /// # Errors
    /// * [`Error::Parse`] - nothing in the bundle could be parsed
    pub fn load_key(&self, armored: &str) -> Result<LoadReport> {
        self.load_entities(armored).map(|(report, _)| report)
    }

    fn load_entities(&self, armored: &str) -> Result<(LoadReport, Vec<Arc<Entity>>)> {
        let parsed = parse_key_bundle(armored.as_bytes())?;

        let mut report = LoadReport::default();
        let mut loaded = Vec::new();

        for (position, key) in parsed.into_iter().enumerate() {
            match key {
                Ok(key) => loaded.push(Arc::new(Entity::from_parsed(key))),
                Err(e) => {
                    tracing::warn!(position, error = %e, "Skipping unparsable key in bundle");
                    report.failures.push((format!("#{}", position), e.to_string()));
                }
            }
        }

        {
            let mut state = self.write_state();
            for entity in &loaded {
                if !state.index.insert(entity.clone()) {
                    tracing::debug!(
                        fingerprint = %entity.fingerprint(),
                        "Keeping loaded private key over public copy"
                    );
                    continue;
                }
                report.public_keys += 1;
                if entity.has_private_key() {
                    report.private_keys += 1;
                }
            }
        }

        for entity in &loaded {
            tracing::debug!(
                fingerprint = %entity.fingerprint(),
                private = entity.has_private_key(),
                "Key loaded"
            );
            self.resolver.add_key(Arc::new(entity.to_public()), true);
        }

        Ok((report, loaded))
    }

    /// Load a bundle with its JSON sidecar. A `password` in the sidecar
    /// unlocks every private key of the bundle right away; if that fails the
    /// keys stay loaded but locked.
    pub fn load_key_with_metadata(&self, armored: &str, metadata: Option<&str>) -> Result<LoadReport> {
        let metadata: KeyMetadata = match metadata.map(str::trim) {
            Some(text) if !text.is_empty() => serde_json::from_str(text)?,
            _ => KeyMetadata::default(),
        };

        let (report, loaded) = self.load_entities(armored)?;

        let Some(password) = metadata.password.filter(|p| !p.is_empty()) else {
            return Ok(report);
        };

        for entity in loaded.iter().filter(|e| e.has_private_key()) {
            if let Err(e) = self.unlock(entity.fingerprint(), &password) {
                tracing::warn!(
                    fingerprint = %entity.fingerprint(),
                    error = %e,
                    "Auto-unlock from metadata failed"
                );
            }
        }

        Ok(report)
    }

    /// Write a key to the backend, base64-wrapped when configured, with a
    /// `{"password": ..}` sidecar when a password is given. Nothing is
    /// written if the backend already holds the same content.
    pub fn save_key(&self, fp: &str, armored: &str, password: Option<&str>) -> Result<()> {
        let fp = self.require_fingerprint(fp)?;

        let key_data = if self.config.keys_base64_encoded {
            base64::engine::general_purpose::STANDARD.encode(armored)
        } else {
            armored.to_string()
        };
        let metadata = password
            .map(|p| {
                serde_json::to_string(&KeyMetadata {
                    password: Some(p.to_string()),
                })
            })
            .transpose()?;

        match self.backend.read(&fp, self.backend_deadline()) {
            Ok(existing) if existing.key_data == key_data && existing.metadata == metadata => {
                tracing::debug!(fingerprint = %fp, "Key already stored, skipping write");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.backend
            .save_with_metadata(&fp, &key_data, metadata.as_deref(), self.backend_deadline())?;
        tracing::info!(fingerprint = %fp, backend = self.backend.name(), "Key saved");
        Ok(())
    }
}
