//! Password hashing primitive.
//!
//! A stored hash is `HMAC-SHA256(pepper, scrypt(password, salt))`. The scrypt
//! cost makes brute force expensive while the pepper keeps a leaked store
//! useless without the server configuration.

use std::fmt;

use getrandom::fill;
use hmac::{Hmac, Mac};
use scrypt::Params;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, StoreError};

type HmacSha256 = Hmac<Sha256>;

/// Required length of the pepper (HMAC key) in bytes.
pub const KEY_LEN: usize = 32;
/// Length of a freshly generated salt.
pub const SALT_LEN: usize = 32;
/// Length of the scrypt output fed into the HMAC.
pub const SCRYPT_LEN: usize = 32;
/// Largest accepted `pwcost` (scrypt N = 2^pwcost).
pub const MAX_PW_COST: u32 = 32;
/// scrypt block size used when a context does not override it.
pub const DEFAULT_R: u32 = 8;
/// scrypt parallelism used when a context does not override it.
pub const DEFAULT_P: u32 = 1;

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| StoreError::Crypto("OS random generator unavailable".into()))
}

/// Generate salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// One set of hashing parameters together with its secret pepper.
///
/// Contexts are immutable. Rotating parameters means adding a new context
/// and making it the default, so hashes created under older contexts keep
/// verifying as long as those contexts stay configured.
#[derive(Clone)]
pub struct CryptoContext {
    pw_cost: u32,
    r: u32,
    p: u32,
    hmac_key: Zeroizing<[u8; KEY_LEN]>,
}

impl fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoContext")
            .field("pw_cost", &self.pw_cost)
            .field("r", &self.r)
            .field("p", &self.p)
            .field("hmac_key", &"<redacted>")
            .finish()
    }
}

impl CryptoContext {
    /// Creates a context. `r` and `p` fall back to the scrypt defaults when
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the cost parameters are not
    /// accepted by scrypt or the key is not [`KEY_LEN`] bytes long.
    pub fn new(pw_cost: u32, r: Option<u32>, p: Option<u32>, hmac_key: &[u8]) -> Result<Self> {
        if hmac_key.len() != KEY_LEN {
            return Err(StoreError::InvalidConfig(format!(
                "HMAC key has invalid length {} != {KEY_LEN}",
                hmac_key.len()
            )));
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(hmac_key);

        let ctx = Self {
            pw_cost,
            r: r.unwrap_or(DEFAULT_R),
            p: p.unwrap_or(DEFAULT_P),
            hmac_key: key,
        };
        ctx.params()?;
        Ok(ctx)
    }

    pub fn pw_cost(&self) -> u32 {
        self.pw_cost
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    fn params(&self) -> Result<Params> {
        if self.pw_cost == 0 || self.pw_cost > MAX_PW_COST {
            return Err(StoreError::InvalidConfig(format!(
                "invalid pwcost {} (must be 1..={MAX_PW_COST})",
                self.pw_cost
            )));
        }

        Params::new(self.pw_cost as u8, self.r, self.p, SCRYPT_LEN).map_err(|e| {
            StoreError::InvalidConfig(format!(
                "invalid scrypt parameters (pwcost={}, r={}, p={}): {e}",
                self.pw_cost, self.r, self.p
            ))
        })
    }

    fn mac(&self, password: &[u8], salt: &[u8]) -> Result<HmacSha256> {
        let params = self.params()?;

        let mut dk = Zeroizing::new([0u8; SCRYPT_LEN]);
        scrypt::scrypt(password, salt, &params, &mut dk[..])
            .map_err(|e| StoreError::Crypto(format!("scrypt failed: {e}")))?;

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hmac_key[..])
            .map_err(|_| StoreError::Crypto("invalid HMAC key".into()))?;
        mac.update(&dk[..]);
        Ok(mac)
    }

    /// Hashes `password` under a fresh random salt. Returns `(hash, salt)`.
    pub fn derive(&self, password: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let salt = generate_salt()?;
        let hash = self.mac(password, &salt)?.finalize().into_bytes();
        Ok((hash.to_vec(), salt.to_vec()))
    }

    /// Checks `password` against a stored `hash` and `salt`.
    ///
    /// The final comparison runs in constant time.
    pub fn verify(&self, hash: &[u8], password: &[u8], salt: &[u8]) -> Result<bool> {
        Ok(self.mac(password, salt)?.verify_slice(hash).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(key: u8) -> CryptoContext {
        CryptoContext::new(4, None, None, &[key; KEY_LEN]).unwrap()
    }

    #[test]
    fn derive_then_verify_works() {
        let ctx = ctx(1);
        let (hash, salt) = ctx.derive(b"secret").unwrap();

        assert_eq!(salt.len(), SALT_LEN);
        assert!(ctx.verify(&hash, b"secret", &salt).unwrap());
        assert!(!ctx.verify(&hash, b"wrong", &salt).unwrap());
    }

    #[test]
    fn salts_are_unique() {
        let ctx = ctx(1);
        let (h1, s1) = ctx.derive(b"secret").unwrap();
        let (h2, s2) = ctx.derive(b"secret").unwrap();

        assert_ne!(s1, s2);
        assert_ne!(h1, h2);
    }

    #[test]
    fn pepper_affects_output() {
        let a = ctx(1);
        let b = ctx(2);
        let (hash, salt) = a.derive(b"secret").unwrap();

        assert!(!b.verify(&hash, b"secret", &salt).unwrap());
    }

    #[test]
    fn truncated_hash_does_not_verify() {
        let ctx = ctx(1);
        let (hash, salt) = ctx.derive(b"secret").unwrap();

        assert!(!ctx.verify(&hash[..16], b"secret", &salt).unwrap());
    }

    #[test]
    fn overrides_are_applied() {
        let ctx = CryptoContext::new(4, Some(2), Some(3), &[0u8; KEY_LEN]).unwrap();
        assert_eq!(ctx.r(), 2);
        assert_eq!(ctx.p(), 3);

        let ctx = CryptoContext::new(4, None, None, &[0u8; KEY_LEN]).unwrap();
        assert_eq!(ctx.r(), DEFAULT_R);
        assert_eq!(ctx.p(), DEFAULT_P);
    }

    #[test]
    fn invalid_params_fail_gracefully() {
        assert!(CryptoContext::new(0, None, None, &[0u8; KEY_LEN]).is_err());
        assert!(CryptoContext::new(33, None, None, &[0u8; KEY_LEN]).is_err());
        assert!(CryptoContext::new(4, None, None, &[0u8; 16]).is_err());
        assert!(CryptoContext::new(4, None, None, &[0u8; KEY_LEN + 1]).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let out = format!("{:?}", ctx(0xab));
        assert!(out.contains("redacted"));
        assert!(!out.contains("171"));
    }
}
