//! Account commands: list, add, add-image, remove.

use std::path::Path;

use anyhow::{Context as _, Result};
use otpvault_core::EntryForm;

use super::{Context, account_line};

pub async fn list(ctx: &Context) -> Result<()> {
    let mut app = ctx.unlock().await?;
    let accounts = app.orch.accounts();
    app.orch.lock();

    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }
    for account in &accounts {
        println!("{}", account_line(account));
    }
    Ok(())
}

pub async fn add(ctx: &Context, form: &EntryForm) -> Result<()> {
    let mut app = ctx.unlock().await?;
    let account = app.orch.add_account(form).await.context("add account")?;
    app.orch.lock();
    println!("Added {} ({})", account.display_name(), account.id);
    Ok(())
}

/// Decodes a QR image into the entry form and submits it.
pub async fn add_image(ctx: &Context, path: &Path) -> Result<()> {
    let mut app = ctx.unlock().await?;
    app.orch
        .scan_image_file(path)
        .with_context(|| format!("scan {}", path.display()))?;
    let account = app.orch.submit_entry().await.context("add account")?;
    app.orch.lock();
    println!("Added {} ({})", account.display_name(), account.id);
    Ok(())
}

pub async fn remove(ctx: &Context, id: &str) -> Result<()> {
    let mut app = ctx.unlock().await?;
    let removed = app
        .orch
        .remove_account(id)
        .await
        .with_context(|| format!("remove account {id}"))?;
    app.orch.lock();

    if removed == 0 {
        println!("No account with id {id}");
    } else {
        println!("Removed {id}");
    }
    Ok(())
}
