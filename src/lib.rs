//! File based credential store.
//!
//! Every user is a file `<basedir>/<name>.user` or `<basedir>/<name>.admin`
//! holding a single hash record. Hashes are created under the default
//! context of a [`ContextRegistry`] and verified under whichever context
//! they name, which allows cost and pepper rotation without invalidating
//! existing passwords.
//!
//! ```no_run
//! use credstore::CredentialStore;
//!
//! # fn main() -> credstore::Result<()> {
//! let store = CredentialStore::open("config.json".as_ref())?;
//! let alice = store.user("alice")?;
//! alice.add("correct horse", false)?;
//! assert_eq!(alice.authenticate("correct horse")?, (true, false));
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod crypto;
mod error;
mod format;
mod storage;
mod store;
mod user;

pub use crate::config::{ContextConfig, StoreConfig};
pub use crate::context::ContextRegistry;
pub use crate::crypto::{CryptoContext, KEY_LEN};
pub use crate::error::{Result, StoreError};
pub use crate::format::{ALGORITHM_ID, HashRecord, decode, encode, is_file_supported, is_supported};
pub use crate::store::{CheckReport, CredentialStore, UserEntry};
pub use crate::user::{Status, UserRecord};
