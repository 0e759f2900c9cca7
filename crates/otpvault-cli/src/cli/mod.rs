//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use otpvault_core::EntryForm;
use otpvault_core::account::Algorithm;
use otpvault_core::config::Config;
use otpvault_core::interrupt;

use crate::logging;

mod commands;

#[derive(Parser)]
#[command(name = "otpvault")]
#[command(version)]
#[command(about = "Terminal client for an OTP vault server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Vault server URL (OTPVAULT_SERVER_URL takes precedence)
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    /// Master password
    #[arg(
        long,
        global = true,
        env = "OTPVAULT_PASSWORD",
        hide_env_values = true
    )]
    password: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show whether the server has a vault
    Status,
    /// Create a new, empty vault
    Init,
    /// List accounts
    List,
    /// Show current codes (refreshes until Ctrl+C)
    Codes {
        /// Print one set of codes and exit
        #[arg(long)]
        once: bool,
    },
    /// Add an account from an otpauth:// URI or explicit fields
    Add(AddArgs),
    /// Add an account from an image of its QR code
    AddImage {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Remove an account
    Remove {
        #[arg(value_name = "ACCOUNT_ID")]
        id: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["uri", "secret"])
))]
struct AddArgs {
    /// Enrollment URI (otpauth://totp/...)
    #[arg(long)]
    uri: Option<String>,

    /// Base32 secret
    #[arg(long)]
    secret: Option<String>,

    #[arg(long, requires = "secret")]
    issuer: Option<String>,

    #[arg(long, requires = "secret")]
    label: Option<String>,

    #[arg(long, requires = "secret")]
    digits: Option<u32>,

    /// Period in seconds
    #[arg(long, requires = "secret")]
    period: Option<u32>,

    /// SHA1, SHA256 or SHA512
    #[arg(long, requires = "secret")]
    algorithm: Option<Algorithm>,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Write a default config file
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);
    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        server,
        password,
        verbose: _,
    } = cli;

    let command = match command {
        Commands::Config { command } => {
            return match command {
                ConfigCommands::Path => {
                    commands::config::path();
                    Ok(())
                }
                ConfigCommands::Init => commands::config::init(),
            };
        }
        other => other,
    };

    let config = Config::load().context("load config")?;
    let server_url = config.resolve_server_url(server.as_deref())?;
    let ctx = commands::Context {
        config,
        server_url,
        password,
    };

    match command {
        Commands::Status => commands::vault::status(&ctx).await,
        Commands::Init => commands::vault::init(&ctx).await,
        Commands::List => commands::accounts::list(&ctx).await,
        Commands::Codes { once } => commands::codes::run(&ctx, once).await,
        Commands::Add(args) => commands::accounts::add(&ctx, &args.into()).await,
        Commands::AddImage { path } => commands::accounts::add_image(&ctx, &path).await,
        Commands::Remove { id } => commands::accounts::remove(&ctx, &id).await,
        Commands::Config { .. } => Ok(()),
    }
}

impl From<AddArgs> for EntryForm {
    fn from(args: AddArgs) -> Self {
        Self {
            uri: args.uri.unwrap_or_default(),
            secret: args.secret.unwrap_or_default(),
            issuer: args.issuer.unwrap_or_default(),
            label: args.label.unwrap_or_default(),
            digits: args.digits,
            period: args.period,
            algorithm: args.algorithm,
        }
    }
}
