//! Database entity models for the storefront.
//!
//! These are the Sea-ORM entity definitions behind the user store and the
//! session store. The schema itself is created by [`crate::migration`].

/// Registered users.
pub mod user;

/// Persisted `tower-sessions` records.
pub mod session;
