//! HTTP implementation of `VaultApi`.

use std::time::Duration;

use anyhow::Context;
use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{CodeReading, VaultApi, VaultError, VaultErrorKind, VaultResult, VaultStatus};
use crate::account::{Account, AccountSpec, Session};

/// Standard User-Agent header for vault requests.
pub const USER_AGENT: &str = concat!("otpvault/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct PasswordRequest<'a> {
    password: &'a str,
}

#[derive(Serialize)]
struct AccountIdRequest<'a> {
    password: &'a str,
    id: &'a str,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    password: &'a str,
    account: &'a AccountSpec,
}

#[derive(Deserialize)]
struct UnlockResponse {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    account: Account,
}

#[derive(Deserialize)]
struct RemoveResponse {
    #[serde(default)]
    removed: u32,
}

#[derive(Debug, Deserialize)]
struct Acknowledged {}

/// Vault client speaking the server's `{ok, error, ...}` JSON protocol.
#[derive(Debug, Clone)]
pub struct HttpVaultClient {
    base_url: String,
    http: Client,
}

impl HttpVaultClient {
    /// Creates a client for `base_url` (e.g. `http://127.0.0.1:5000`).
    ///
    /// A zero `timeout` disables the per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        Url::parse(trimmed).with_context(|| format!("Invalid server URL: {base_url}"))?;

        let mut builder = Client::builder().user_agent(USER_AGENT);
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: trimmed.to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> VaultResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(%url, "vault request");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(request_error)?;
        parse_envelope(status.as_u16(), status.is_success(), &body)
    }
}

fn request_error(e: reqwest::Error) -> VaultError {
    let message = if e.is_timeout() {
        "Vault server timed out"
    } else {
        "Failed to reach vault server"
    };
    VaultError::new(VaultErrorKind::Request, message).with_details(e.to_string())
}

/// Interprets an `{ok, error, ...data}` body.
///
/// The server sends `ok: false` with a 4xx status on failure, so the body
/// is consulted before the status code.
fn parse_envelope<T: DeserializeOwned>(status: u16, success: bool, body: &str) -> VaultResult<T> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        if success {
            return Err(VaultError::new(VaultErrorKind::Parse, "Invalid JSON from vault server")
                .with_details(body.to_string()));
        }
        return Err(VaultError::http_status(status, body));
    };

    match value.get("ok").and_then(Value::as_bool) {
        Some(true) => serde_json::from_value(value).map_err(|e| {
            VaultError::new(VaultErrorKind::Parse, "Unexpected response from vault server")
                .with_details(e.to_string())
        }),
        Some(false) => {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or("request failed");
            Err(VaultError::server(message))
        }
        None if !success => Err(VaultError::http_status(status, body)),
        None => Err(
            VaultError::new(VaultErrorKind::Parse, "Response is missing the ok flag")
                .with_details(body.to_string()),
        ),
    }
}

impl VaultApi for HttpVaultClient {
    fn status(&self) -> BoxFuture<'_, VaultResult<VaultStatus>> {
        Box::pin(async move {
            let response = self
                .http
                .get(self.endpoint("status"))
                .send()
                .await
                .map_err(request_error)?;
            let status = response.status();
            let body = response.text().await.map_err(request_error)?;
            if !status.is_success() {
                return Err(VaultError::http_status(status.as_u16(), &body));
            }
            serde_json::from_str(&body).map_err(|e| {
                VaultError::new(VaultErrorKind::Parse, "Unexpected status response")
                    .with_details(e.to_string())
            })
        })
    }

    fn init<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, VaultResult<()>> {
        Box::pin(async move {
            let body = PasswordRequest {
                password: session.password(),
            };
            let _: Acknowledged = self.post("init", &body).await?;
            Ok(())
        })
    }

    fn unlock<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, VaultResult<Vec<Account>>> {
        Box::pin(async move {
            let body = PasswordRequest {
                password: session.password(),
            };
            let response: UnlockResponse = self.post("unlock", &body).await?;
            Ok(response.accounts)
        })
    }

    fn add_account<'a>(
        &'a self,
        session: &'a Session,
        spec: &'a AccountSpec,
    ) -> BoxFuture<'a, VaultResult<Account>> {
        Box::pin(async move {
            let body = AddRequest {
                password: session.password(),
                account: spec,
            };
            let response: AddResponse = self.post("add", &body).await?;
            Ok(response.account)
        })
    }

    fn remove_account<'a>(
        &'a self,
        session: &'a Session,
        account_id: &'a str,
    ) -> BoxFuture<'a, VaultResult<u32>> {
        Box::pin(async move {
            let body = AccountIdRequest {
                password: session.password(),
                id: account_id,
            };
            let response: RemoveResponse = self.post("remove", &body).await?;
            Ok(response.removed)
        })
    }

    fn get_code<'a>(
        &'a self,
        session: &'a Session,
        account_id: &'a str,
    ) -> BoxFuture<'a, VaultResult<CodeReading>> {
        Box::pin(async move {
            let body = AccountIdRequest {
                password: session.password(),
                id: account_id,
            };
            self.post("code", &body).await
        })
    }
}
