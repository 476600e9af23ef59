//! Authentication module for the directory session and its credentials.
//!
//! This module provides:
//! - `SessionManager`: login, token renewal and the `verify` gate in front of every call
//! - `CredentialSource`: where login parameters come from (`StoredCredentials`, `StaticCredentials`)
//! - `CredentialStore`: OS-level password storage via keyring
//!
//! The session token lives in memory only and is renewed every 20 hours.

pub mod credentials;
pub mod session;

pub use credentials::{
    CredentialKey, CredentialSource, CredentialStore, Credentials, StaticCredentials,
    StoredCredentials,
};
pub use session::{ActiveSession, ConnectionState, SessionManager, SessionSettings};
