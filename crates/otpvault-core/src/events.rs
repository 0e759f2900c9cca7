//! Events emitted by the orchestrator for the render layer.
//!
//! Code updates travel on their own channel (see `ticker`); this one carries
//! everything else the front end needs to redraw.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::account::Account;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Vault unlocked; the account list was replaced wholesale.
    AccountsReplaced { accounts: Vec<Account> },
    AccountAdded { account: Account },
    AccountRemoved { account_id: String },
    /// Session cleared; the front end should drop all account state.
    Locked,
    /// A scanned or uploaded QR payload was placed in the entry form.
    UriPrefilled { uri: String },
    /// User-facing message (camera unavailable, no code found, ...).
    Notice { message: String },
}

pub type UiEventTx = mpsc::Sender<Arc<UiEvent>>;
pub type UiEventRx = mpsc::Receiver<Arc<UiEvent>>;

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

pub fn create_event_channel() -> (UiEventTx, UiEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Best-effort event sender.
///
/// The orchestrator runs inside user-action handlers and must never block on
/// a slow or absent renderer, so events are dropped when the channel is full
/// or closed.
#[derive(Clone)]
pub struct EventSender {
    tx: UiEventTx,
}

impl EventSender {
    pub fn new(tx: UiEventTx) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: UiEvent) {
        let _ = self.tx.try_send(Arc::new(event));
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.send(UiEvent::Notice {
            message: message.into(),
        });
    }
}
