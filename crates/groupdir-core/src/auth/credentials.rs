use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use crate::api::SessionError;
use crate::config::Config;

const SERVICE_NAME: &str = "groupdir";

/// Environment overrides, checked before the config file and keychain
const USERNAME_ENV: &str = "GROUPDIR_USERNAME";
const PASSWORD_ENV: &str = "GROUPDIR_PASSWORD";
const DOMAIN_ENV: &str = "GROUPDIR_DOMAIN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    Username,
    Password,
    Domain,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [
        CredentialKey::Username,
        CredentialKey::Password,
        CredentialKey::Domain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::Username => "username",
            CredentialKey::Password => "password",
            CredentialKey::Domain => "domain",
        }
    }
}

/// Where login parameters come from.
///
/// Returning fewer entries than requested means "not configured"; an `Err`
/// means the source itself could not be read.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn lookup(&self, keys: &[CredentialKey]) -> Result<HashMap<CredentialKey, String>>;
}

/// Login parameters for one connect attempt.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub domain: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

impl Credentials {
    /// Assemble credentials from a lookup result. Empty values count as missing.
    pub fn from_lookup(mut found: HashMap<CredentialKey, String>) -> Result<Self, SessionError> {
        found.retain(|_, value| !value.trim().is_empty());

        let missing: Vec<&str> = CredentialKey::ALL
            .iter()
            .filter(|key| !found.contains_key(key))
            .map(|key| key.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::Configuration(missing.join(", ")));
        }

        let mut take = |key: CredentialKey| found.remove(&key).unwrap_or_default();
        Ok(Self {
            username: take(CredentialKey::Username),
            password: take(CredentialKey::Password),
            domain: take(CredentialKey::Domain),
        })
    }

    /// Form body for the token endpoint.
    pub fn login_form(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("Email", &self.username)
            .append_pair("Passwd", &self.password)
            .append_pair("accountType", "HOSTED")
            .append_pair("service", "apps")
            .finish()
    }
}

/// Fixed in-memory credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    values: HashMap<CredentialKey, String>,
}

impl StaticCredentials {
    pub fn new(username: &str, password: &str, domain: &str) -> Self {
        Self::default()
            .with(CredentialKey::Username, username)
            .with(CredentialKey::Password, password)
            .with(CredentialKey::Domain, domain)
    }

    pub fn with(mut self, key: CredentialKey, value: &str) -> Self {
        self.values.insert(key, value.to_string());
        self
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn lookup(&self, keys: &[CredentialKey]) -> Result<HashMap<CredentialKey, String>> {
        Ok(keys
            .iter()
            .filter_map(|key| self.values.get(key).map(|value| (*key, value.clone())))
            .collect())
    }
}

/// Credentials from the config file and the OS keychain, with environment overrides.
#[derive(Debug, Clone, Default)]
pub struct StoredCredentials {
    username: Option<String>,
    domain: Option<String>,
}

impl StoredCredentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            username: config.username.clone(),
            domain: config.domain.clone(),
        }
    }

    fn username(&self) -> Option<String> {
        std::env::var(USERNAME_ENV).ok().or_else(|| self.username.clone())
    }

    fn domain(&self) -> Option<String> {
        std::env::var(DOMAIN_ENV).ok().or_else(|| self.domain.clone())
    }

    /// Keychain access blocks (D-Bus, Security framework), so it runs off the runtime threads.
    async fn password(&self) -> Result<Option<String>> {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            return Ok(Some(password));
        }
        let Some(username) = self.username() else {
            return Ok(None);
        };
        tokio::task::spawn_blocking(move || CredentialStore::find_password(&username))
            .await
            .context("Keychain lookup task failed")?
    }
}

#[async_trait]
impl CredentialSource for StoredCredentials {
    async fn lookup(&self, keys: &[CredentialKey]) -> Result<HashMap<CredentialKey, String>> {
        let mut found = HashMap::new();
        for key in keys {
            let value = match key {
                CredentialKey::Username => self.username(),
                CredentialKey::Password => self.password().await?,
                CredentialKey::Domain => self.domain(),
            };
            if let Some(value) = value {
                found.insert(*key, value);
            }
        }
        debug!(found = found.len(), requested = keys.len(), "Credential lookup finished");
        Ok(found)
    }
}

pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for a username in the OS keychain
    pub fn store(username: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for a username; a missing entry is `None`
    pub fn find_password(username: &str) -> Result<Option<String>> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve password from keychain"),
        }
    }

    /// Delete stored credentials for a username
    pub fn delete(username: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    /// Check if credentials exist for a username
    pub fn has_credentials(username: &str) -> bool {
        matches!(Self::find_password(username), Ok(Some(_)))
    }
}
