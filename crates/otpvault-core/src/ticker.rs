//! Live-code ticker.
//!
//! `CodeTicker::start` spawns a schedule that runs a refresh pass right away
//! and then once per interval. A pass snapshots the account list, fetches
//! every account's code concurrently and publishes each success on the update
//! channel. Failures are logged and skipped; the last displayed code for that
//! account simply stays.
//!
//! Passes are not serialized against each other by default: a slow server can
//! make pass N+1 start before pass N finishes. Set
//! `TickerConfig::skip_overlapping_passes` to skip ticks while a pass is
//! still in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::{BoxFuture, join_all};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::account::{Account, Session, SharedAccounts};
use crate::api::{CodeReading, VaultApi, VaultResult};

/// A fresh code for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUpdate {
    pub account_id: String,
    pub code: String,
    pub remaining: Option<u32>,
}

/// Channel carrying code updates to the render layer.
pub type CodeUpdateTx = mpsc::Sender<CodeUpdate>;
pub type CodeUpdateRx = mpsc::Receiver<CodeUpdate>;

pub const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 128;

pub fn create_update_channel() -> (CodeUpdateTx, CodeUpdateRx) {
    mpsc::channel(DEFAULT_UPDATE_CHANNEL_CAPACITY)
}

/// Source of current codes.
pub trait CodeFetcher: Send + Sync {
    fn fetch_code<'a>(
        &'a self,
        session: &'a Session,
        account_id: &'a str,
    ) -> BoxFuture<'a, VaultResult<CodeReading>>;
}

/// Fetches codes through a `VaultApi`.
#[derive(Clone)]
pub struct ApiCodeFetcher {
    api: Arc<dyn VaultApi>,
}

impl ApiCodeFetcher {
    pub fn new(api: Arc<dyn VaultApi>) -> Self {
        Self { api }
    }
}

impl CodeFetcher for ApiCodeFetcher {
    fn fetch_code<'a>(
        &'a self,
        session: &'a Session,
        account_id: &'a str,
    ) -> BoxFuture<'a, VaultResult<CodeReading>> {
        self.api.get_code(session, account_id)
    }
}

/// Shortest period a schedule will run at; `tokio::time::interval` rejects zero.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerConfig {
    pub interval: Duration,
    pub skip_overlapping_passes: bool,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            skip_overlapping_passes: false,
        }
    }
}

/// Counts from one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub updated: usize,
    pub failed: usize,
}

/// Runs one refresh pass over `accounts`.
///
/// Every fetch is independent; one failure never aborts the others. Only
/// updates the receiver actually got count as `updated`.
pub async fn refresh_pass(
    session: &Session,
    accounts: &[Account],
    fetcher: &dyn CodeFetcher,
    updates: &CodeUpdateTx,
) -> PassSummary {
    let fetches = accounts.iter().map(|account| async move {
        match fetcher.fetch_code(session, &account.id).await {
            Ok(reading) => Some(
                updates
                    .send(CodeUpdate {
                        account_id: account.id.clone(),
                        code: reading.code,
                        remaining: reading.remaining,
                    })
                    .await
                    .is_ok(),
            ),
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "code refresh failed");
                None
            }
        }
    });

    let results = join_all(fetches).await;
    PassSummary {
        updated: results.iter().filter(|r| **r == Some(true)).count(),
        failed: results.iter().filter(|r| r.is_none()).count(),
    }
}

struct TickerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owner of the single live refresh schedule.
pub struct CodeTicker {
    config: TickerConfig,
    updates: CodeUpdateTx,
    handle: Option<TickerHandle>,
}

impl CodeTicker {
    /// Intervals shorter than [`MIN_TICK_INTERVAL`] are raised to it.
    pub fn new(mut config: TickerConfig, updates: CodeUpdateTx) -> Self {
        config.interval = config.interval.max(MIN_TICK_INTERVAL);
        Self {
            config,
            updates,
            handle: None,
        }
    }

    pub fn config(&self) -> TickerConfig {
        self.config
    }

    /// Replaces any running schedule with a new one.
    ///
    /// Returns `false` and leaves the ticker stopped when `session` is
    /// `None`.
    pub fn start(
        &mut self,
        session: Option<&Session>,
        accounts: SharedAccounts,
        fetcher: Arc<dyn CodeFetcher>,
    ) -> bool {
        self.stop();

        let Some(session) = session else {
            debug!("ticker not started: vault is locked");
            return false;
        };

        let cancel = CancellationToken::new();
        let schedule = Schedule {
            config: self.config,
            session: session.clone(),
            accounts,
            fetcher,
            updates: self.updates.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(schedule.run());
        self.handle = Some(TickerHandle { cancel, task });
        debug!(
            interval_ms = self.config.interval.as_millis() as u64,
            "ticker started"
        );
        true
    }

    /// Cancels the schedule and any in-flight pass. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel.cancel();
            debug!("ticker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| !h.cancel.is_cancelled() && !h.task.is_finished())
    }
}

impl Drop for CodeTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Schedule {
    config: TickerConfig,
    session: Session,
    accounts: SharedAccounts,
    fetcher: Arc<dyn CodeFetcher>,
    updates: CodeUpdateTx,
    cancel: CancellationToken,
}

/// Decrements the in-flight counter when a pass ends or is cancelled.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Schedule {
    async fn run(self) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut pass: u64 = 0;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if self.config.skip_overlapping_passes && in_flight.load(Ordering::Acquire) > 0 {
                debug!(pass, "previous pass still in flight, skipping tick");
                continue;
            }

            pass += 1;
            in_flight.fetch_add(1, Ordering::AcqRel);
            let guard = InFlight(Arc::clone(&in_flight));
            let snapshot = self.accounts.snapshot();
            let session = self.session.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let updates = self.updates.clone();
            let cancel = self.cancel.child_token();

            tokio::spawn(async move {
                let _guard = guard;
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {}
                    summary = refresh_pass(&session, &snapshot, fetcher.as_ref(), &updates) => {
                        debug!(pass, updated = summary.updated, failed = summary.failed, "pass complete");
                    }
                }
            });
        }
    }
}
