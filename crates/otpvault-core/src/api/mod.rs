//! Vault server API: the request/response surface the controller drives.
//!
//! Every call is one JSON exchange that independently succeeds or fails.
//! The trait is object-safe so the orchestrator and ticker can be tested
//! against in-memory fakes.

mod http;

use std::fmt;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use http::HttpVaultClient;

use crate::account::{Account, AccountSpec, Session};

/// Categories of vault errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultErrorKind {
    /// The server answered `ok: false`; the message is the server's own.
    Server,
    /// Non-success HTTP status without a usable `error` body.
    HttpStatus,
    /// Connection failed or timed out.
    Request,
    /// The response body was not the expected JSON.
    Parse,
    /// A vault-scoped call was made without an unlocked session.
    Locked,
}

impl fmt::Display for VaultErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultErrorKind::Server => write!(f, "server"),
            VaultErrorKind::HttpStatus => write!(f, "http_status"),
            VaultErrorKind::Request => write!(f, "request"),
            VaultErrorKind::Parse => write!(f, "parse"),
            VaultErrorKind::Locked => write!(f, "locked"),
        }
    }
}

/// Structured error from a vault operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultError {
    pub kind: VaultErrorKind,
    /// One-line summary suitable for display.
    pub message: String,
    /// Optional raw details (e.g. response body).
    pub details: Option<String>,
}

impl VaultError {
    pub fn new(kind: VaultErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Server-reported failure, message passed through verbatim.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::Server, message)
    }

    pub fn locked() -> Self {
        Self::new(VaultErrorKind::Locked, "Vault is locked")
    }

    pub fn http_status(status: u16, body: &str) -> Self {
        Self {
            kind: VaultErrorKind::HttpStatus,
            message: format!("HTTP {status}"),
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for VaultError {}

pub type VaultResult<T> = Result<T, VaultError>;

/// Whether a vault has been created on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VaultStatus {
    pub vault_exists: bool,
}

/// A freshly generated code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodeReading {
    pub code: String,
    /// Seconds until the code rolls over, when the server reports it.
    #[serde(default)]
    pub remaining: Option<u32>,
}

/// Vault server operations.
pub trait VaultApi: Send + Sync {
    fn status(&self) -> BoxFuture<'_, VaultResult<VaultStatus>>;

    fn init<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, VaultResult<()>>;

    fn unlock<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, VaultResult<Vec<Account>>>;

    fn add_account<'a>(
        &'a self,
        session: &'a Session,
        spec: &'a AccountSpec,
    ) -> BoxFuture<'a, VaultResult<Account>>;

    /// Returns how many accounts the server removed.
    fn remove_account<'a>(
        &'a self,
        session: &'a Session,
        account_id: &'a str,
    ) -> BoxFuture<'a, VaultResult<u32>>;

    fn get_code<'a>(
        &'a self,
        session: &'a Session,
        account_id: &'a str,
    ) -> BoxFuture<'a, VaultResult<CodeReading>>;
}
