//! Session and account state, wired to the vault API, ticker and scanner.
//!
//! The orchestrator is the only owner of the session credential and of the
//! displayed account list. Front ends drive it with user actions and render
//! from [`UiEvent`]s plus the ticker's code updates.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::account::{Account, Session, SharedAccounts};
use crate::api::{VaultApi, VaultError, VaultResult, VaultStatus};
use crate::entry::{EntryError, EntryForm};
use crate::events::{EventSender, UiEvent};
use crate::scan::{QrScanner, ScanError, ScanOutcome, ScanState, ScanTask};
use crate::ticker::{ApiCodeFetcher, CodeFetcher, CodeTicker, CodeUpdate};

/// Last code received for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedCode {
    pub code: String,
    pub remaining: Option<u32>,
}

#[derive(Debug)]
pub enum AddAccountError {
    /// Rejected before any request was made.
    Input(EntryError),
    Vault(VaultError),
}

impl fmt::Display for AddAccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddAccountError::Input(e) => write!(f, "{e}"),
            AddAccountError::Vault(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AddAccountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AddAccountError::Input(e) => Some(e),
            AddAccountError::Vault(e) => Some(e),
        }
    }
}

impl From<EntryError> for AddAccountError {
    fn from(e: EntryError) -> Self {
        AddAccountError::Input(e)
    }
}

impl From<VaultError> for AddAccountError {
    fn from(e: VaultError) -> Self {
        AddAccountError::Vault(e)
    }
}

pub struct Orchestrator {
    api: Arc<dyn VaultApi>,
    fetcher: Arc<dyn CodeFetcher>,
    session: Option<Session>,
    accounts: SharedAccounts,
    codes: HashMap<String, DisplayedCode>,
    entry: EntryForm,
    ticker: CodeTicker,
    scanner: QrScanner,
    events: EventSender,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("unlocked", &self.session.is_some())
            .field("accounts", &self.accounts.len())
            .field("ticker_running", &self.ticker.is_running())
            .field("scan_state", &self.scanner.state())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn VaultApi>,
        ticker: CodeTicker,
        scanner: QrScanner,
        events: EventSender,
    ) -> Self {
        let fetcher: Arc<dyn CodeFetcher> = Arc::new(ApiCodeFetcher::new(Arc::clone(&api)));
        Self {
            api,
            fetcher,
            session: None,
            accounts: SharedAccounts::new(),
            codes: HashMap::new(),
            entry: EntryForm::default(),
            ticker,
            scanner,
            events,
        }
    }

    /// Replaces the code source used by the ticker.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn CodeFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.snapshot()
    }

    pub fn displayed_code(&self, account_id: &str) -> Option<&DisplayedCode> {
        self.codes.get(account_id)
    }

    pub fn entry(&self) -> &EntryForm {
        &self.entry
    }

    pub fn entry_mut(&mut self) -> &mut EntryForm {
        &mut self.entry
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    pub fn scan_state(&self) -> ScanState {
        self.scanner.state()
    }

    fn require_session(&self) -> VaultResult<Session> {
        self.session.clone().ok_or_else(VaultError::locked)
    }

    /// # Errors
    /// Returns the transport or server error.
    pub async fn status(&self) -> VaultResult<VaultStatus> {
        self.api.status().await
    }

    /// Creates an empty vault and enters the unlocked state with no accounts.
    ///
    /// # Errors
    /// Returns the server's error verbatim; state is left unchanged.
    pub async fn create_vault(&mut self, password: &str) -> VaultResult<()> {
        let session = Session::new(password);
        self.api.init(&session).await?;
        info!("vault created");
        self.enter_session(session, Vec::new());
        Ok(())
    }

    /// Unlocks the vault, replacing the account list and restarting the
    /// ticker. Returns the number of accounts loaded.
    ///
    /// # Errors
    /// Returns the server's error verbatim; the previous session (if any) is
    /// kept.
    pub async fn unlock(&mut self, password: &str) -> VaultResult<usize> {
        let session = Session::new(password);
        let accounts = self.api.unlock(&session).await?;
        let count = accounts.len();
        self.enter_session(session, accounts);
        Ok(count)
    }

    fn enter_session(&mut self, session: Session, accounts: Vec<Account>) {
        self.accounts.replace(accounts);
        self.codes.clear();
        self.session = Some(session);
        let started = self.ticker.start(
            self.session.as_ref(),
            self.accounts.clone(),
            Arc::clone(&self.fetcher),
        );
        debug!(accounts = self.accounts.len(), started, "session entered");
        self.events.send(UiEvent::AccountsReplaced {
            accounts: self.accounts.snapshot(),
        });
    }

    /// Stops background work and forgets the session and all account state.
    pub fn lock(&mut self) {
        self.ticker.stop();
        self.scanner.stop();
        let was_unlocked = self.session.take().is_some();
        self.accounts.clear();
        self.codes.clear();
        self.entry = EntryForm::default();
        if was_unlocked {
            info!("vault locked");
            self.events.send(UiEvent::Locked);
        }
    }

    /// Creates an account from `form`.
    ///
    /// # Errors
    /// `Input` for an empty or malformed form (no request is made, nothing
    /// changes); `Vault` for a locked vault or a server failure.
    pub async fn add_account(&mut self, form: &EntryForm) -> Result<Account, AddAccountError> {
        let spec = form.to_spec()?;
        let session = self.require_session()?;
        let account = self.api.add_account(&session, &spec).await?;
        debug!(account_id = %account.id, "account added");
        self.accounts.push(account.clone());
        self.events.send(UiEvent::AccountAdded {
            account: account.clone(),
        });
        Ok(account)
    }

    /// Submits the held entry form and clears it on success.
    ///
    /// # Errors
    /// See [`Orchestrator::add_account`].
    pub async fn submit_entry(&mut self) -> Result<Account, AddAccountError> {
        let form = self.entry.clone();
        let account = self.add_account(&form).await?;
        self.entry = EntryForm::default();
        Ok(account)
    }

    /// Removes an account on the server, then locally.
    ///
    /// # Errors
    /// Returns `Locked` without a session, or the server's error; the local
    /// list is untouched on failure.
    pub async fn remove_account(&mut self, account_id: &str) -> VaultResult<u32> {
        let session = self.require_session()?;
        let removed = self.api.remove_account(&session, account_id).await?;
        self.accounts.remove(account_id);
        self.codes.remove(account_id);
        debug!(account_id, removed, "account removed");
        self.events.send(UiEvent::AccountRemoved {
            account_id: account_id.to_string(),
        });
        Ok(removed)
    }

    /// Applies a ticker update. Returns `false` for accounts no longer shown.
    pub fn apply_code_update(&mut self, update: CodeUpdate) -> bool {
        if !self.accounts.contains(&update.account_id) {
            return false;
        }
        self.codes.insert(
            update.account_id,
            DisplayedCode {
                code: update.code,
                remaining: update.remaining,
            },
        );
        true
    }

    /// Starts a camera scan. Camera failure is reported as a notice pointing
    /// the user at image upload.
    ///
    /// # Errors
    /// See [`QrScanner::start_camera_scan`].
    pub async fn start_camera_scan(&self) -> Result<ScanTask, ScanError> {
        let result = self.scanner.start_camera_scan().await;
        if let Err(e @ ScanError::CameraUnavailable(_)) = &result {
            self.events.notice(e.to_string());
        }
        result
    }

    pub fn stop_camera_scan(&self) {
        self.scanner.stop();
    }

    /// Consumes a finished camera scan. A decoded payload pre-fills the entry
    /// form and is returned.
    pub fn accept_scan_outcome(&mut self, outcome: ScanOutcome) -> Option<String> {
        match outcome {
            ScanOutcome::Decoded(payload) => {
                self.prefill(payload.clone());
                Some(payload)
            }
            ScanOutcome::Cancelled => None,
            ScanOutcome::StreamFailed(reason) => {
                self.events.notice(format!("Camera stopped: {reason}"));
                None
            }
        }
    }

    /// Decodes an uploaded image. The camera is never touched.
    ///
    /// # Errors
    /// `NoCodeFound` or `InvalidImage`; both are also reported as notices.
    pub fn scan_image(&mut self, data: &[u8]) -> Result<String, ScanError> {
        let result = self.scanner.decode_image(data);
        self.finish_image_scan(result)
    }

    /// File variant of [`Orchestrator::scan_image`].
    ///
    /// # Errors
    /// See [`Orchestrator::scan_image`].
    pub fn scan_image_file(&mut self, path: &Path) -> Result<String, ScanError> {
        let result = self.scanner.decode_image_file(path);
        self.finish_image_scan(result)
    }

    fn finish_image_scan(
        &mut self,
        result: Result<String, ScanError>,
    ) -> Result<String, ScanError> {
        match result {
            Ok(payload) => {
                self.prefill(payload.clone());
                Ok(payload)
            }
            Err(e) => {
                self.events.notice(e.to_string());
                Err(e)
            }
        }
    }

    fn prefill(&mut self, uri: String) {
        self.entry.uri.clone_from(&uri);
        self.events.send(UiEvent::UriPrefilled { uri });
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.ticker.stop();
        self.scanner.stop();
    }
}
