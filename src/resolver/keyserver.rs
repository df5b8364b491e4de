//! HKP keyserver lookups (VKS interface, as served by keys.openpgp.org).

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::internal::parse_key_bundle;
use crate::types::Deadline;

/// Blocking client for one keyserver.
#[derive(Debug, Clone)]
pub struct KeyServer {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl KeyServer {
    /// Client for `base_url`, e.g. `https://keys.openpgp.org`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the certificate for a 16-char key id. A 404 is a miss.
    pub fn fetch_by_keyid(&self, key_id: &str, deadline: Deadline) -> Result<Option<Entity>> {
        let url = format!("{}/vks/v1/by-keyid/{}", self.base_url, key_id.to_uppercase());

        let response = self
            .client
            .get(&url)
            .timeout(deadline.remaining())
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("keyserver lookup for {}", key_id))
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(key_id = %key_id, "Key not on keyserver");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "keyserver returned {} for {}",
                response.status(),
                key_id
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::Network(e.to_string()))?;

        let parsed = parse_key_bundle(&bytes)?
            .into_iter()
            .find_map(|k| k.ok())
            .ok_or_else(|| Error::Parse(format!("keyserver returned no usable key for {}", key_id)))?;

        Ok(Some(Entity::from_parsed(parsed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let ks = KeyServer::new("https://keys.openpgp.org/").unwrap();
        assert_eq!(ks.base_url(), "https://keys.openpgp.org");
    }
}
