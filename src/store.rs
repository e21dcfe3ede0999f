//! Store directory and its context registry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::context::ContextRegistry;
use crate::error::{Result, StoreError};
use crate::format;
use crate::user::{ADMIN_EXT, USER_EXT, UserRecord};

/// A directory of user hash files plus the contexts used to create and
/// verify them.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    basedir: PathBuf,
    registry: Arc<ContextRegistry>,
}

/// A user found by [`CredentialStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    username: String,
    is_admin: bool,
    is_supported: bool,
}

impl UserEntry {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Whether the stored record can be verified and updated by this store.
    pub fn is_supported(&self) -> bool {
        self.is_supported
    }
}

/// Result of a successful [`CredentialStore::check`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub users: usize,
    pub admins: usize,
    pub unsupported: usize,
}

impl CredentialStore {
    pub fn new(basedir: PathBuf, registry: Arc<ContextRegistry>) -> Self {
        Self { basedir, registry }
    }

    /// Builds a store from a parsed configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let registry = ContextRegistry::from_config(config)?;
        Ok(Self::new(config.basedir.clone(), Arc::new(registry)))
    }

    /// Loads the configuration file at `path` and builds a store from it.
    pub fn open(path: &Path) -> Result<Self> {
        let config = StoreConfig::from_file(path)?;
        Self::from_config(&config)
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Returns a handle for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidUsername`] if the name could address a
    /// file outside of the base directory.
    pub fn user(&self, username: &str) -> Result<UserRecord<'_>> {
        validate_username(username)?;
        Ok(UserRecord::new(self, username.to_string()))
    }

    /// Creates the base directory and its first administrator.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidStore`] if the directory already has
    /// entries.
    pub fn init(&self, admin: &str, password: &str) -> Result<()> {
        let user = self.user(admin)?;

        fs::create_dir_all(&self.basedir)?;
        if fs::read_dir(&self.basedir)?.next().is_some() {
            return Err(StoreError::InvalidStore(format!(
                "base directory {} is not empty",
                self.basedir.display()
            )));
        }

        user.add(password, true)?;
        info!(basedir = %self.basedir.display(), admin, "store initialized");
        Ok(())
    }

    /// Verifies the layout of the base directory.
    ///
    /// Fails if the base directory is missing, if a user exists both as a
    /// regular user and an administrator, or if there is no administrator.
    /// Records in unsupported formats are only reported.
    pub fn check(&self) -> Result<CheckReport> {
        let meta = fs::metadata(&self.basedir).map_err(|e| {
            StoreError::InvalidStore(format!("{}: {e}", self.basedir.display()))
        })?;
        if !meta.is_dir() {
            return Err(StoreError::InvalidStore(format!(
                "{} is not a directory",
                self.basedir.display()
            )));
        }

        let mut report = CheckReport::default();
        for (username, roles) in self.scan()? {
            if roles.user && roles.admin {
                return Err(StoreError::InvalidStore(format!(
                    "user '{username}' exists as user and as admin"
                )));
            }

            let entry = self.entry(username, roles.admin)?;
            report.users += 1;
            if entry.is_admin {
                report.admins += 1;
            }
            if !entry.is_supported {
                warn!(user = %entry.username, "hash format is not supported");
                report.unsupported += 1;
            }
        }

        if report.admins == 0 {
            return Err(StoreError::InvalidStore(
                "store contains no admin user".into(),
            ));
        }

        debug!(?report, "store check passed");
        Ok(report)
    }

    /// Lists all users sorted by name.
    pub fn list(&self) -> Result<Vec<UserEntry>> {
        self.scan()?
            .into_iter()
            .map(|(username, roles)| self.entry(username, roles.admin))
            .collect()
    }

    fn entry(&self, username: String, is_admin: bool) -> Result<UserEntry> {
        let ext = if is_admin { ADMIN_EXT } else { USER_EXT };
        let path = self.basedir.join(format!("{username}{ext}"));
        let is_supported = format::is_file_supported(&path)?;

        Ok(UserEntry {
            username,
            is_admin,
            is_supported,
        })
    }

    fn scan(&self) -> Result<BTreeMap<String, Roles>> {
        let mut users: BTreeMap<String, Roles> = BTreeMap::new();

        for entry in fs::read_dir(&self.basedir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };

            if let Some(user) = name.strip_suffix(ADMIN_EXT) {
                if validate_username(user).is_ok() {
                    users.entry(user.to_string()).or_default().admin = true;
                }
            } else if let Some(user) = name.strip_suffix(USER_EXT) {
                if validate_username(user).is_ok() {
                    users.entry(user.to_string()).or_default().user = true;
                }
            }
        }

        Ok(users)
    }
}

#[derive(Debug, Default)]
struct Roles {
    user: bool,
    admin: bool,
}

/// Rejects names that are empty, hidden, or contain path separators or
/// control characters.
fn validate_username(username: &str) -> Result<()> {
    let invalid = username.is_empty()
        || username.starts_with('.')
        || username
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());

    if invalid {
        return Err(StoreError::InvalidUsername(username.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CryptoContext, KEY_LEN};
    use base64::{Engine as _, engine::general_purpose::URL_SAFE};
    use tempfile::{TempDir, tempdir};

    fn store() -> (TempDir, CredentialStore) {
        let dir = tempdir().unwrap();
        let ctx = CryptoContext::new(4, None, None, &[1u8; KEY_LEN]).unwrap();
        let registry = ContextRegistry::new([(1, ctx)], 1).unwrap();
        let store = CredentialStore::new(dir.path().join("store"), Arc::new(registry));
        (dir, store)
    }

    #[test]
    fn open_from_config_file_works() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config.json");
        let basedir = dir.path().join("store");
        fs::write(
            &config,
            serde_json::json!({
                "basedir": basedir,
                "defaultctx": 1,
                "contexts": [{ "id": 1, "hmackey": URL_SAFE.encode([9u8; KEY_LEN]), "pwcost": 4 }]
            })
            .to_string(),
        )
        .unwrap();

        let store = CredentialStore::open(&config).unwrap();
        assert_eq!(store.basedir(), basedir);
        assert_eq!(store.registry().default_id(), 1);
    }

    #[test]
    fn invalid_usernames_are_rejected() {
        let (_dir, store) = store();

        for name in ["", ".", "..", ".hidden", "../etc/passwd", "a/b", "a\\b", "a\nb", "a\0b"] {
            match store.user(name) {
                Err(StoreError::InvalidUsername(n)) => assert_eq!(n, name),
                Err(other) => panic!("expected InvalidUsername for {name:?}, got: {other:?}"),
                Ok(_) => panic!("expected InvalidUsername for {name:?}"),
            }
        }

        assert!(store.user("alice").is_ok());
        assert!(store.user("john.doe@example.com").is_ok());
    }

    #[test]
    fn init_creates_admin() {
        let (_dir, store) = store();

        store.init("root", "secret").unwrap();

        let root = store.user("root").unwrap();
        assert_eq!(root.exists().unwrap(), (true, true));
        assert_eq!(root.authenticate("secret").unwrap(), (true, true));
    }

    #[test]
    fn init_fails_if_directory_not_empty() {
        let (_dir, store) = store();
        store.init("root", "secret").unwrap();

        assert!(matches!(
            store.init("other", "secret"),
            Err(StoreError::InvalidStore(_))
        ));
        assert_eq!(store.user("other").unwrap().exists().unwrap(), (false, false));
    }

    #[test]
    fn list_returns_sorted_users() {
        let (_dir, store) = store();
        store.init("root", "secret").unwrap();
        store.user("bob").unwrap().add("pw", false).unwrap();
        store.user("alice").unwrap().add("pw", false).unwrap();
        fs::write(store.basedir().join("legacy.user"), "md5:abc").unwrap();
        fs::write(store.basedir().join("notes.txt"), "ignored").unwrap();

        let users = store.list().unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username()).collect();
        assert_eq!(names, ["alice", "bob", "legacy", "root"]);

        assert!(users[3].is_admin());
        assert!(!users[0].is_admin());
        assert!(users[0].is_supported());
        assert!(!users[2].is_supported());
    }

    #[test]
    fn check_passes_for_valid_store() {
        let (_dir, store) = store();
        store.init("root", "secret").unwrap();
        store.user("alice").unwrap().add("pw", false).unwrap();
        fs::write(store.basedir().join("legacy.user"), "md5:abc").unwrap();

        let report = store.check().unwrap();
        assert_eq!(
            report,
            CheckReport {
                users: 3,
                admins: 1,
                unsupported: 1
            }
        );
    }

    #[test]
    fn check_fails_without_admin() {
        let (_dir, store) = store();
        fs::create_dir_all(store.basedir()).unwrap();
        store.user("alice").unwrap().add("pw", false).unwrap();

        assert!(matches!(store.check(), Err(StoreError::InvalidStore(_))));
    }

    #[test]
    fn check_fails_for_user_with_both_roles() {
        let (_dir, store) = store();
        store.init("root", "secret").unwrap();
        fs::copy(
            store.basedir().join("root.admin"),
            store.basedir().join("root.user"),
        )
        .unwrap();

        assert!(matches!(store.check(), Err(StoreError::InvalidStore(_))));
    }

    #[test]
    fn check_fails_for_missing_directory() {
        let (_dir, store) = store();
        assert!(matches!(store.check(), Err(StoreError::InvalidStore(_))));
    }
}
