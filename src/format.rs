//! Hash record format.
//!
//! Each user file holds a single line:
//! ```text
//! ALGORITHM_ID:CONTEXT_ID:BASE64(HASH):BASE64(SALT)
//! ```
//! Base64 uses the URL-safe alphabet with padding.

use std::fs;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::URL_SAFE};

use crate::error::{Result, StoreError};

/// Tag identifying the hashing scheme of a record.
pub const ALGORITHM_ID: &str = "hmac_sha256_scrypt";

/// A decoded hash record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    algorithm: String,
    context_id: u32,
    hash: Vec<u8>,
    salt: Vec<u8>,
}

impl HashRecord {
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn context_id(&self) -> u32 {
        self.context_id
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Returns `true` if this record can be verified and safely replaced.
    pub fn is_supported(&self) -> bool {
        self.algorithm == ALGORITHM_ID
            && self.context_id != 0
            && !self.hash.is_empty()
            && !self.salt.is_empty()
    }
}

/// Encodes a record for `context_id` without the trailing newline.
pub fn encode(context_id: u32, hash: &[u8], salt: &[u8]) -> String {
    format!(
        "{ALGORITHM_ID}:{context_id}:{}:{}",
        URL_SAFE.encode(hash),
        URL_SAFE.encode(salt)
    )
}

/// Splits a record into its algorithm tag and the remaining payload.
pub(crate) fn split_algorithm(text: &str) -> Result<(&str, &str)> {
    let text = text.trim_end_matches(['\r', '\n']);
    text.split_once(':')
        .ok_or_else(|| StoreError::Format("missing algorithm separator".into()))
}

/// Decodes a full record.
///
/// # Errors
///
/// Returns [`StoreError::Format`] if the text does not consist of exactly
/// four `:` separated fields, the context ID is not a number, or hash or
/// salt are not valid base64.
pub fn decode(text: &str) -> Result<HashRecord> {
    let (algorithm, payload) = split_algorithm(text)?;

    let fields: Vec<&str> = payload.split(':').collect();
    let [ctx, hash, salt] = fields.as_slice() else {
        return Err(StoreError::Format(format!(
            "expected 3 payload fields, found {}",
            fields.len()
        )));
    };

    let context_id = ctx
        .parse::<u32>()
        .map_err(|e| StoreError::Format(format!("invalid context ID '{ctx}': {e}")))?;
    let hash = URL_SAFE
        .decode(hash)
        .map_err(|e| StoreError::Format(format!("invalid hash encoding: {e}")))?;
    let salt = URL_SAFE
        .decode(salt)
        .map_err(|e| StoreError::Format(format!("invalid salt encoding: {e}")))?;

    Ok(HashRecord {
        algorithm: algorithm.to_string(),
        context_id,
        hash,
        salt,
    })
}

/// Returns `true` if `text` decodes to a supported record.
pub fn is_supported(text: &str) -> bool {
    decode(text).is_ok_and(|record| record.is_supported())
}

/// Reads `path` and checks whether it holds a supported record.
///
/// # Errors
///
/// Returns an error only if the file cannot be read.
pub fn is_file_supported(path: &Path) -> Result<bool> {
    let data = fs::read(path)?;
    Ok(std::str::from_utf8(&data).is_ok_and(is_supported))
}
