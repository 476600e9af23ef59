//! Client library for a hosted group directory.
//!
//! A [`SessionManager`] logs in once and keeps the token fresh; a
//! [`DirectoryClient`] lists groups and adds or removes members, verifying the
//! session before each call and classifying every response.
//!
//! ```no_run
//! use std::sync::Arc;
//! use groupdir_core::{Config, DirectoryClient, HttpTransport, SessionManager, StoredCredentials};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
//! let session = SessionManager::new(
//!     transport.clone(),
//!     Arc::new(StoredCredentials::from_config(&config)),
//!     config.session_settings(),
//! );
//! let client = DirectoryClient::new(session, transport, &config.api_base_url)?;
//! for group in client.list_groups().await? {
//!     println!("{}", group.address);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{
    classify, ApiError, ClassifiedError, DirectoryClient, HttpTransport, LoginFailure, Outcome,
    ParseFailure, SessionError, Transport, TransportError,
};
pub use auth::{
    ConnectionState, CredentialKey, CredentialSource, CredentialStore, SessionManager,
    SessionSettings, StaticCredentials, StoredCredentials,
};
pub use config::Config;
pub use models::{Group, Member};
