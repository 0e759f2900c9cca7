//! Account, session and account-creation types.
//!
//! The server is the only place secrets live after creation. `Account`
//! therefore carries display fields only; anything else the server sends
//! back (secret, digits, period) is dropped during deserialization.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Deserializer, Serialize};

/// Label used when neither the URI nor the form supplies one.
pub const DEFAULT_LABEL: &str = "Account";

/// An account as known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque server-assigned identifier.
    pub id: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default = "default_label", deserialize_with = "label_or_default")]
    pub label: String,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

fn label_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    Ok(label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(default_label))
}

impl Account {
    /// Returns "Issuer: label" or just the label.
    pub fn display_name(&self) -> String {
        match self.issuer.as_deref() {
            Some(issuer) if !issuer.is_empty() => format!("{issuer}: {}", self.label),
            _ => self.label.clone(),
        }
    }
}

/// HMAC algorithm for code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA512")]
    Sha512,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SHA1" => Ok(Algorithm::Sha1),
            "SHA256" => Ok(Algorithm::Sha256),
            "SHA512" => Ok(Algorithm::Sha512),
            other => Err(format!("Unsupported algorithm: {other}")),
        }
    }
}

/// Parameters for creating an account on the server.
///
/// This is the only client-side type that ever holds a secret, and only for
/// the duration of the add request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AccountSpec {
    pub issuer: Option<String>,
    pub label: Option<String>,
    pub secret: String,
    pub digits: u32,
    pub period: u32,
    pub algorithm: Algorithm,
}

impl AccountSpec {
    pub const DEFAULT_DIGITS: u32 = 6;
    pub const DEFAULT_PERIOD: u32 = 30;

    /// Creates a spec with default digits, period and algorithm.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            issuer: None,
            label: None,
            secret: secret.into(),
            digits: Self::DEFAULT_DIGITS,
            period: Self::DEFAULT_PERIOD,
            algorithm: Algorithm::default(),
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Applies the same cleanup the server applies on insert.
    ///
    /// Spaces are stripped from the secret and it is upper-cased; blank
    /// issuer/label become `None`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.secret = self.secret.replace(' ', "").to_ascii_uppercase();
        self.issuer = self
            .issuer
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.label = self
            .label
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }
}

impl fmt::Debug for AccountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSpec")
            .field("issuer", &self.issuer)
            .field("label", &self.label)
            .field("secret", &"<redacted>")
            .field("digits", &self.digits)
            .field("period", &self.period)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// The unlocked master credential.
///
/// Cheap to clone; every clone shares the same allocation.
#[derive(Clone)]
pub struct Session {
    password: Arc<str>,
}

impl Session {
    pub fn new(password: impl Into<Arc<str>>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Account list shared between the orchestrator (writer) and the ticker
/// (snapshot reader).
#[derive(Debug, Clone, Default)]
pub struct SharedAccounts {
    inner: Arc<RwLock<Vec<Account>>>,
}

impl SharedAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the current list. Later mutations do not affect the copy.
    pub fn snapshot(&self) -> Vec<Account> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|a| a.id == id)
    }

    /// Replaces the whole set, dropping duplicate ids (first one wins).
    pub fn replace(&self, accounts: Vec<Account>) {
        let mut deduped: Vec<Account> = Vec::with_capacity(accounts.len());
        for account in accounts {
            if !deduped.iter().any(|a| a.id == account.id) {
                deduped.push(account);
            }
        }
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = deduped;
    }

    /// Appends an account, replacing any existing entry with the same id.
    pub fn push(&self, account: Account) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = guard.iter_mut().find(|a| a.id == account.id) {
            *existing = account;
        } else {
            guard.push(account);
        }
    }

    /// Removes an account by id. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|a| a.id != id);
        guard.len() != before
    }

    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
