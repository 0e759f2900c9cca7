//! CLI command handlers.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use otpvault_core::config::Config;
use otpvault_core::events::{EventSender, UiEventRx, create_event_channel};
use otpvault_core::scan::{NoCamera, QrScanner};
use otpvault_core::ticker::{CodeTicker, CodeUpdateRx, create_update_channel};
use otpvault_core::{Account, DisplayedCode, HttpVaultClient, Orchestrator, VaultApi};

use crate::decoder::RqrrDecoder;

pub mod accounts;
pub mod codes;
pub mod config;
pub mod vault;

/// Resolved settings shared by vault commands.
pub struct Context {
    pub config: Config,
    pub server_url: String,
    pub password: Option<String>,
}

/// A wired orchestrator plus the channels it reports on.
pub struct App {
    pub orch: Orchestrator,
    pub updates: CodeUpdateRx,
    pub events: UiEventRx,
}

impl Context {
    pub fn client(&self) -> Result<HttpVaultClient> {
        let timeout = self.config.request_timeout().unwrap_or_default();
        HttpVaultClient::new(&self.server_url, timeout)
    }

    pub fn password(&self) -> Result<&str> {
        match self.password.as_deref() {
            Some(pw) if !pw.is_empty() => Ok(pw),
            _ => bail!("Password required: pass --password or set OTPVAULT_PASSWORD"),
        }
    }

    /// Builds a locked orchestrator talking to the configured server.
    pub fn connect(&self) -> Result<App> {
        let api: Arc<dyn VaultApi> = Arc::new(self.client()?);
        let (updates_tx, updates) = create_update_channel();
        let (events_tx, events) = create_event_channel();

        let scanner = QrScanner::new(Arc::new(NoCamera), Arc::new(RqrrDecoder))
            .with_facing(self.config.scanner.facing);
        let ticker = CodeTicker::new(self.config.ticker_config(), updates_tx);
        let orch = Orchestrator::new(api, ticker, scanner, EventSender::new(events_tx));

        Ok(App {
            orch,
            updates,
            events,
        })
    }

    /// Connects and unlocks.
    pub async fn unlock(&self) -> Result<App> {
        let password = self.password()?;
        let mut app = self.connect()?;
        app.orch
            .unlock(password)
            .await
            .with_context(|| format!("unlock vault at {}", self.server_url))?;
        Ok(app)
    }
}

pub fn account_line(account: &Account) -> String {
    format!("{:<24} {}", account.id, account.display_name())
}

pub fn code_line(account: &Account, code: Option<&DisplayedCode>) -> String {
    match code {
        Some(DisplayedCode {
            code,
            remaining: Some(secs),
        }) => format!("{code:>8}  {secs:>2}s  {}", account.display_name()),
        Some(DisplayedCode {
            code,
            remaining: None,
        }) => format!("{code:>8}       {}", account.display_name()),
        None => format!("{:>8}       {}", "------", account.display_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Account {
        Account {
            id: "a1".into(),
            issuer: Some("Acme".into()),
            label: "bob".into(),
        }
    }

    #[test]
    fn test_code_line_variants() {
        let account = acme();
        let name = account.display_name();

        let line = code_line(
            &account,
            Some(&DisplayedCode {
                code: "123456".into(),
                remaining: Some(7),
            }),
        );
        assert_eq!(line, format!("  123456   7s  {name}"));

        let line = code_line(&account, None);
        assert!(line.contains("------"));
        assert!(line.ends_with(&name));
    }

    #[test]
    fn test_missing_password_is_reported() {
        let ctx = Context {
            config: Config::default(),
            server_url: Config::DEFAULT_SERVER_URL.into(),
            password: Some(String::new()),
        };
        let err = ctx.password().unwrap_err();
        assert!(err.to_string().contains("OTPVAULT_PASSWORD"));
    }
}
