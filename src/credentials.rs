//! Password digests.
//!
//! Passwords are stored as the lowercase hex SHA-256 of their UTF-8 bytes.
//! The digest is deterministic and unsalted, so equal passwords share a
//! digest across accounts and are exposed to precomputed-table attacks.
//! Migrating to a salted KDF needs a stored-format change and a rehash on
//! next login; until then this module is the single place to change.

use sha2::{Digest, Sha256};

/// One-way digest of a plaintext password.
///
/// ```rust
/// use storefront::credentials::hash_password;
///
/// let digest = hash_password("secret");
/// assert_eq!(digest.len(), 64);
/// assert_ne!(digest, "secret");
/// ```
#[must_use]
pub fn hash_password(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `plain` hashes to the stored `digest`.
#[must_use]
pub fn verify_password(plain: &str, digest: &str) -> bool {
    hash_password(plain) == digest
}
