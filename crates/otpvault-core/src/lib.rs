//! Client controller for an OTP vault server (accounts, codes, QR enrollment).

pub mod account;
pub mod api;
pub mod config;
pub mod entry;
pub mod events;
pub mod interrupt;
pub mod orchestrator;
pub mod otpauth;
pub mod scan;
pub mod ticker;

pub use account::{Account, AccountSpec, Algorithm, Session};
pub use api::{HttpVaultClient, VaultApi, VaultError, VaultErrorKind};
pub use config::Config;
pub use entry::{EntryError, EntryForm};
pub use orchestrator::{AddAccountError, DisplayedCode, Orchestrator};
