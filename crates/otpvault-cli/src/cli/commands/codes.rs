//! `codes`: one-shot listing or a live view that refreshes until Ctrl+C.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use otpvault_core::account::Session;
use otpvault_core::events::UiEvent;
use otpvault_core::interrupt::{self, InterruptedError};
use otpvault_core::ticker::{ApiCodeFetcher, refresh_pass};
use otpvault_core::{DisplayedCode, VaultApi};
use tokio::sync::mpsc;

use super::{Context, code_line};

pub async fn run(ctx: &Context, once: bool) -> Result<()> {
    if once { print_once(ctx).await } else { watch(ctx).await }
}

async fn print_once(ctx: &Context) -> Result<()> {
    let api: Arc<dyn VaultApi> = Arc::new(ctx.client()?);
    let session = Session::new(ctx.password()?);
    let accounts = api
        .unlock(&session)
        .await
        .with_context(|| format!("unlock vault at {}", ctx.server_url))?;

    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(accounts.len());
    let fetcher = ApiCodeFetcher::new(api);
    let summary = refresh_pass(&session, &accounts, &fetcher, &tx).await;
    drop(tx);

    let mut codes = HashMap::new();
    while let Some(update) = rx.recv().await {
        codes.insert(
            update.account_id,
            DisplayedCode {
                code: update.code,
                remaining: update.remaining,
            },
        );
    }

    for account in &accounts {
        println!("{}", code_line(account, codes.get(&account.id)));
    }
    if summary.failed > 0 {
        eprintln!("{} account(s) could not be refreshed", summary.failed);
    }
    Ok(())
}

async fn watch(ctx: &Context) -> Result<()> {
    let mut app = ctx.unlock().await?;
    let accounts = app.orch.accounts();
    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }
    eprintln!("Showing codes for {} account(s). Ctrl+C to quit.", accounts.len());

    loop {
        tokio::select! {
            biased;
            () = interrupt::wait_for_interrupt() => {
                app.orch.lock();
                return Err(InterruptedError.into());
            }
            Some(event) = app.events.recv() => {
                if let UiEvent::Notice { message } = event.as_ref() {
                    eprintln!("{message}");
                }
            }
            Some(update) = app.updates.recv() => {
                let changed = app
                    .orch
                    .displayed_code(&update.account_id)
                    .is_none_or(|shown| shown.code != update.code);
                let account_id = update.account_id.clone();
                if !app.orch.apply_code_update(update) || !changed {
                    continue;
                }
                if let Some(account) = accounts.iter().find(|a| a.id == account_id) {
                    println!("{}", code_line(account, app.orch.displayed_code(&account_id)));
                }
            }
            else => return Ok(()),
        }
    }
}
