//! Per-user operations.

use std::io::ErrorKind;

use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::format::{self, ALGORITHM_ID};
use crate::storage::HashFile;
use crate::store::CredentialStore;

/// File extension of regular users.
pub const USER_EXT: &str = ".user";
/// File extension of administrators.
pub const ADMIN_EXT: &str = ".admin";

/// Whether a user exists and with which role.
///
/// The role is encoded by which of the two possible files exists, so it is
/// always read from disk and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Absent,
    User,
    Admin,
}

impl Status {
    pub fn exists(self) -> bool {
        self != Status::Absent
    }

    pub fn is_admin(self) -> bool {
        self == Status::Admin
    }
}

/// Handle to a single user inside a [`CredentialStore`].
///
/// Only [`UserRecord::add`] is safe against concurrent callers for the same
/// username. `update`, `set_admin` and `remove` check the current state and
/// then act on it, so callers must serialize operations per username.
#[derive(Debug, Clone)]
pub struct UserRecord<'a> {
    store: &'a CredentialStore,
    username: String,
}

impl<'a> UserRecord<'a> {
    pub(crate) fn new(store: &'a CredentialStore, username: String) -> Self {
        Self { store, username }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn file(&self, is_admin: bool) -> HashFile {
        let ext = if is_admin { ADMIN_EXT } else { USER_EXT };
        HashFile::new(
            self.store
                .basedir()
                .join(format!("{}{ext}", self.username)),
        )
    }

    /// Reads the current status from disk. The admin file is checked first.
    pub fn status(&self) -> Result<Status> {
        if self.file(true).exists()? {
            return Ok(Status::Admin);
        }
        if self.file(false).exists()? {
            return Ok(Status::User);
        }
        Ok(Status::Absent)
    }

    /// Returns `(exists, is_admin)`.
    pub fn exists(&self) -> Result<(bool, bool)> {
        let status = self.status()?;
        Ok((status.exists(), status.is_admin()))
    }

    fn write_hash(&self, file: &HashFile, password: &str, create: bool) -> Result<()> {
        let (ctx_id, ctx) = self.store.registry().default_context()?;
        let (hash, salt) = ctx.derive(password.as_bytes())?;
        let line = format::encode(ctx_id, &hash, &salt);

        if create {
            file.create_new(&line)
        } else {
            file.overwrite(&line)
        }
    }

    /// Creates the user. Fails if the user already exists in either role.
    pub fn add(&self, password: &str, is_admin: bool) -> Result<()> {
        if self.status()?.exists() {
            return Err(StoreError::AlreadyExists(self.username.clone()));
        }

        let file = self.file(is_admin);
        match self.write_hash(&file, password, true) {
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(self.username.clone()));
            }
            Err(e) => return Err(e),
            Ok(()) => {}
        }

        // A concurrent add in the other role only guards its own filename.
        // Whoever sees the other file backs off, so at most one remains.
        let other = self.file(!is_admin);
        if other.exists()? {
            file.remove()?;
            return Err(StoreError::AlreadyExists(self.username.clone()));
        }

        info!(user = %self.username, is_admin, "user added");
        Ok(())
    }

    /// Replaces the password, hashing it under the current default context.
    ///
    /// Records in a format this store cannot parse are never overwritten.
    pub fn update(&self, password: &str) -> Result<()> {
        let status = self.status()?;
        if !status.exists() {
            return Err(StoreError::NotFound(self.username.clone()));
        }

        let file = self.file(status.is_admin());
        if !format::is_file_supported(file.path())? {
            warn!(user = %self.username, "refusing to overwrite unsupported hash format");
            return Err(StoreError::UnsupportedFormat(self.username.clone()));
        }

        self.write_hash(&file, password, false)?;
        info!(user = %self.username, "password updated");
        Ok(())
    }

    /// Promotes or demotes the user. Already being in the requested role is
    /// not an error.
    pub fn set_admin(&self, is_admin: bool) -> Result<()> {
        let status = self.status()?;
        if !status.exists() {
            return Err(StoreError::NotFound(self.username.clone()));
        }
        if status.is_admin() == is_admin {
            return Ok(());
        }

        self.file(status.is_admin()).rename(&self.file(is_admin))?;
        info!(user = %self.username, is_admin, "admin flag changed");
        Ok(())
    }

    /// Deletes both possible files of the user. Never fails.
    pub fn remove(&self) {
        for is_admin in [true, false] {
            let file = self.file(is_admin);
            if let Err(e) = file.remove() {
                warn!(path = %file.path().display(), error = %e, "failed to remove hash file");
            }
        }
        info!(user = %self.username, "user removed");
    }

    /// Checks `password`. Returns `(matched, is_admin)`.
    ///
    /// The admin flag is reported even if the password does not match.
    pub fn authenticate(&self, password: &str) -> Result<(bool, bool)> {
        let status = self.status()?;
        if !status.exists() {
            return Err(StoreError::NotFound(self.username.clone()));
        }
        let is_admin = status.is_admin();

        let data = self.file(is_admin).load()?;
        let text = String::from_utf8(data)
            .map_err(|_| StoreError::UnsupportedFormat(self.username.clone()))?;
        let (algorithm, _) = format::split_algorithm(&text)?;
        if algorithm != ALGORITHM_ID {
            return Err(StoreError::UnsupportedFormat(self.username.clone()));
        }

        let record = format::decode(&text)?;
        let ctx = self.store.registry().get(record.context_id()).ok_or_else(|| {
            warn!(user = %self.username, ctx = record.context_id(), "hash uses unknown context");
            StoreError::UnknownContext(record.context_id())
        })?;

        let ok = ctx.verify(record.hash(), password.as_bytes(), record.salt())?;
        debug!(user = %self.username, ok, "authentication attempt");
        Ok((ok, is_admin))
    }
}
