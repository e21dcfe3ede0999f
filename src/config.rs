//! Store configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, StoreError};

/// One hashing context as it appears in the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    pub id: u32,
    /// URL-safe base64 encoded pepper.
    pub hmackey: String,
    pub pwcost: u32,
    /// scrypt block size; `0` selects the default.
    #[serde(default)]
    pub r: u32,
    /// scrypt parallelism; `0` selects the default.
    #[serde(default)]
    pub p: u32,
}

/// Top level configuration of a credential store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub basedir: PathBuf,
    /// Context used for new hashes; `0` means the store has none.
    #[serde(default)]
    pub defaultctx: u32,
    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
}

impl StoreConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)
            .map_err(|e| StoreError::InvalidConfig(format!("error parsing config: {e}")))?;

        if config.basedir.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig(
                "config does not contain a base directory".into(),
            ));
        }

        Ok(config)
    }

    /// Loads and parses the configuration file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfig(format!("can't read {}: {e}", path.display()))
        })?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn full_config_parses() {
        let config = StoreConfig::from_json(
            r#"{
                "basedir": "/var/lib/store",
                "defaultctx": 2,
                "contexts": [
                    { "id": 1, "hmackey": "abc", "pwcost": 14 },
                    { "id": 2, "hmackey": "def", "pwcost": 16, "r": 4, "p": 2 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.basedir, PathBuf::from("/var/lib/store"));
        assert_eq!(config.defaultctx, 2);
        assert_eq!(config.contexts.len(), 2);
        assert_eq!(config.contexts[0].r, 0);
        assert_eq!(config.contexts[0].p, 0);
        assert_eq!(config.contexts[1].r, 4);
        assert_eq!(config.contexts[1].p, 2);
    }

    #[test]
    fn minimal_config_parses() {
        let config = StoreConfig::from_json(r#"{ "basedir": "store" }"#).unwrap();
        assert_eq!(config.defaultctx, 0);
        assert!(config.contexts.is_empty());
    }

    #[test]
    fn missing_or_empty_basedir_fails() {
        assert!(matches!(
            StoreConfig::from_json(r#"{ "defaultctx": 0 }"#),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            StoreConfig::from_json(r#"{ "basedir": "" }"#),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn negative_values_fail() {
        let res = StoreConfig::from_json(
            r#"{ "basedir": "s", "contexts": [ { "id": 1, "hmackey": "a", "pwcost": 4, "r": -1 } ] }"#,
        );
        assert!(matches!(res, Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn unknown_fields_fail() {
        let res = StoreConfig::from_json(r#"{ "basedir": "s", "basdir": "typo" }"#);
        assert!(matches!(res, Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "basedir": "store", "defaultctx": 0 }"#).unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.basedir, PathBuf::from("store"));

        assert!(StoreConfig::from_file(&dir.path().join("missing.json")).is_err());
    }
}
