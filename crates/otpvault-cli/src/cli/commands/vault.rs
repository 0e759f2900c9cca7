//! Vault-level commands: status and creation.

use anyhow::{Context as _, Result};

use super::Context;

pub async fn status(ctx: &Context) -> Result<()> {
    let app = ctx.connect()?;
    let status = app
        .orch
        .status()
        .await
        .with_context(|| format!("query {}", ctx.server_url))?;

    if status.vault_exists {
        println!("Vault exists at {}", ctx.server_url);
    } else {
        println!(
            "No vault at {}. Create one with `otpvault init`.",
            ctx.server_url
        );
    }
    Ok(())
}

pub async fn init(ctx: &Context) -> Result<()> {
    let password = ctx.password()?;
    let mut app = ctx.connect()?;
    app.orch
        .create_vault(password)
        .await
        .with_context(|| format!("create vault at {}", ctx.server_url))?;
    app.orch.lock();
    println!("Created vault at {}", ctx.server_url);
    Ok(())
}
