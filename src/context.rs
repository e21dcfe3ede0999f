//! Registry of hashing contexts.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::{ContextConfig, StoreConfig};
use crate::crypto::{CryptoContext, KEY_LEN};
use crate::error::{Result, StoreError};

/// The set of configured contexts plus the one used for new hashes.
///
/// A registry is built once and never changes afterwards, so it can be
/// shared between threads without locking.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: HashMap<u32, CryptoContext>,
    default_id: u32,
}

impl ContextRegistry {
    /// Builds a registry from already constructed contexts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if an ID is 0 or used twice, or
    /// if `default_id` does not name one of the contexts (or is not 0 for an
    /// empty set).
    pub fn new(
        contexts: impl IntoIterator<Item = (u32, CryptoContext)>,
        default_id: u32,
    ) -> Result<Self> {
        let mut map = HashMap::new();
        for (id, ctx) in contexts {
            if id == 0 {
                return Err(StoreError::InvalidConfig(
                    "context ID 0 is not allowed".into(),
                ));
            }
            if map.insert(id, ctx).is_some() {
                return Err(StoreError::InvalidConfig(format!(
                    "context ID {id} is defined more than once"
                )));
            }
        }

        if default_id == 0 {
            if !map.is_empty() {
                return Err(StoreError::InvalidConfig("no default context".into()));
            }
        } else if !map.contains_key(&default_id) {
            return Err(StoreError::InvalidConfig(format!(
                "invalid default context {default_id}"
            )));
        }

        Ok(Self {
            contexts: map,
            default_id,
        })
    }

    /// Builds a registry from the `contexts` and `defaultctx` of a
    /// configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let contexts = config
            .contexts
            .iter()
            .map(|c| Ok((c.id, context_from_config(c)?)))
            .collect::<Result<Vec<_>>>()?;

        let registry = Self::new(contexts, config.defaultctx)?;
        debug!(
            contexts = registry.len(),
            default = registry.default_id,
            "context registry loaded"
        );
        Ok(registry)
    }

    pub fn get(&self, id: u32) -> Option<&CryptoContext> {
        self.contexts.get(&id)
    }

    pub fn default_id(&self) -> u32 {
        self.default_id
    }

    /// Returns the default context and its ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoDefaultContext`] for an empty registry.
    pub fn default_context(&self) -> Result<(u32, &CryptoContext)> {
        self.contexts
            .get(&self.default_id)
            .map(|ctx| (self.default_id, ctx))
            .ok_or(StoreError::NoDefaultContext)
    }

    /// Configured context IDs in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.contexts.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

fn context_from_config(c: &ContextConfig) -> Result<CryptoContext> {
    if c.id == 0 {
        return Err(StoreError::InvalidConfig(
            "context ID 0 is not allowed".into(),
        ));
    }

    let key = Zeroizing::new(URL_SAFE.decode(&c.hmackey).map_err(|e| {
        StoreError::InvalidConfig(format!(
            "can't decode HMAC key for context ID {}: {e}",
            c.id
        ))
    })?);
    if key.len() != KEY_LEN {
        return Err(StoreError::InvalidConfig(format!(
            "HMAC key for context ID {} has invalid length {} != {KEY_LEN}",
            c.id,
            key.len()
        )));
    }

    let r = (c.r > 0).then_some(c.r);
    let p = (c.p > 0).then_some(c.p);

    CryptoContext::new(c.pwcost, r, p, &key).map_err(|e| match e {
        StoreError::InvalidConfig(msg) => {
            StoreError::InvalidConfig(format!("context ID {}: {msg}", c.id))
        }
        other => other,
    })
}
