//! Session Controller
//!
//! Drives the session through startup, account changes and periodic
//! refreshes, publishing every change as a new [`SessionSnapshot`].
//!
//! Gateway failures are logged and swallowed; the snapshot never carries
//! error text. Responses are applied only if they belong to the latest
//! request of their kind (account figures, chain id, coin details), so a
//! slow response cannot overwrite a newer one.

use super::snapshot::{Phase, SessionSnapshot};
use super::{PageOpener, SessionConfig, SessionError, SessionResult};
use crate::gateway::{
    AccountDetails, ChainGateway, ChainHandle, CoinBudgets, ContractBundle, GatewayError,
    GatewayResult,
};
use crate::interval::{task, Interval, Task};
use crate::prefs::PreferenceStore;
use alloy_primitives::Address;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Handle on a running session; cheap to clone
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn ChainGateway>,
    prefs: Arc<dyn PreferenceStore>,
    opener: Arc<dyn PageOpener>,
    config: SessionConfig,
    state: watch::Sender<SessionSnapshot>,
    account_generation: AtomicU64,
    chain_generation: AtomicU64,
    coin_generation: AtomicU64,
    polling: Mutex<PollingTasks>,
    started: AtomicBool,
    closed: AtomicBool,
}

struct PollingTasks {
    account: Interval,
    coins: Interval,
}

/// Everything an account refresh needs, captured when it is scheduled
#[derive(Debug, Clone)]
struct AccountTarget {
    handle: ChainHandle,
    bundle: ContractBundle,
    account: Address,
}

impl AccountTarget {
    fn from_snapshot(snapshot: &SessionSnapshot) -> Option<Self> {
        Some(Self {
            handle: snapshot.chain.clone()?,
            bundle: snapshot.contracts?,
            account: snapshot.active_account()?,
        })
    }
}

impl SessionController {
    /// Create a controller in the `Uninitialized` phase
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        prefs: Arc<dyn PreferenceStore>,
        opener: Arc<dyn PageOpener>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());

        Self {
            inner: Arc::new(Inner {
                gateway,
                prefs,
                opener,
                config,
                state,
                account_generation: AtomicU64::new(0),
                chain_generation: AtomicU64::new(0),
                coin_generation: AtomicU64::new(0),
                polling: Mutex::new(PollingTasks {
                    account: Interval::idle("account_details"),
                    coins: Interval::idle("coin_details"),
                }),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Receive every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Discover the contracts, restore a remembered wallet connection and
    /// leave the `Loading` phase
    ///
    /// Never fails: errors are logged and the controller still becomes
    /// `Ready` with whatever was discovered.
    pub async fn start(&self) {
        if self.inner.is_closed() {
            tracing::debug!("Ignoring start on closed session");
            return;
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session already started");
            return;
        }

        self.inner.set_phase(Phase::Loading);
        tracing::info!("Starting session");

        let restored = match self.inner.discover().await {
            Ok(()) => match self.inner.restore_accounts().await {
                Ok(restored) => restored,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to restore wallet connection");
                    None
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Contract discovery failed");
                None
            }
        };

        self.inner.set_phase(Phase::Ready);

        if let Some(accounts) = restored {
            if self.inner.replace_accounts(accounts) {
                self.inner.on_accounts_changed().await;
            }
        }
        tracing::info!("Session ready");
    }

    /// Ask the wallet for its accounts and adopt them
    ///
    /// On success the returned list becomes the live account list and is
    /// stored. On failure nothing changes.
    pub async fn connect(&self) -> SessionResult<Vec<Address>> {
        self.inner.ensure_open()?;

        let accounts = self.inner.gateway.request_accounts().await.map_err(|e| {
            tracing::error!(error = %e, "Wallet connection failed");
            SessionError::from(e)
        })?;

        tracing::info!(count = accounts.len(), "Wallet connected");

        let changed = self.inner.replace_accounts(accounts.clone());
        if let Err(e) = self.inner.prefs.write_accounts(&accounts).await {
            tracing::error!(error = %e, "Failed to store accounts");
        }
        if changed {
            self.inner.on_accounts_changed().await;
        }

        Ok(accounts)
    }

    /// Open the wallet install page
    pub fn redirect_to_install(&self) -> SessionResult<()> {
        let url = &self.inner.config.install_url;
        self.inner.opener.open(url).map_err(|e| {
            tracing::error!(error = %e, "Failed to open install page");
            SessionError::from(e)
        })
    }

    /// Wallet event: the account list changed outside of `connect`
    pub async fn accounts_changed(&self, accounts: Vec<Address>) {
        if self.inner.is_closed() {
            tracing::debug!("Ignoring account change on closed session");
            return;
        }
        if self.inner.replace_accounts(accounts) {
            self.inner.on_accounts_changed().await;
        }
    }

    /// Forget the connected accounts, both live and stored
    pub async fn disconnect(&self) -> SessionResult<()> {
        self.inner.ensure_open()?;

        let changed = self.inner.replace_accounts(Vec::new());
        let stored = self.inner.prefs.write_accounts(&[]).await;
        if changed {
            self.inner.on_accounts_changed().await;
        }
        tracing::info!("Wallet disconnected");

        stored.map_err(SessionError::from)
    }

    /// Run one account and one coin refresh right away
    pub async fn refresh_now(&self) {
        if self.inner.is_closed() {
            tracing::debug!("Ignoring refresh on closed session");
            return;
        }
        let snapshot = self.snapshot();
        let Some(target) = AccountTarget::from_snapshot(&snapshot) else {
            tracing::debug!("Refresh skipped, wallet not connected");
            return;
        };

        tokio::join!(
            self.inner.refresh_account(&target),
            self.inner.refresh_coins(target.bundle)
        );
    }

    /// Stop both polling tasks; later commands are rejected
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.sync_polling().await;
        tracing::info!("Session shut down");
    }

    /// Whether the account and coin polling tasks are armed
    pub async fn polling_armed(&self) -> (bool, bool) {
        let polling = self.inner.polling.lock().await;
        (polling.account.is_armed(), polling.coins.is_armed())
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.is_closed() {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.state.send_modify(|s| s.phase = phase);
    }

    async fn discover(&self) -> GatewayResult<()> {
        let handle = self.gateway.chain_handle().await?;
        tracing::debug!(endpoint = %handle.endpoint, client = %handle.client_version, "Chain client ready");

        let contracts = self.gateway.discover_contracts().await?;
        let decimals = self
            .gateway
            .decimals_of(contracts.stable_coin, contracts.reserve_coin)
            .await?;
        let coins = self
            .gateway
            .coin_details(
                contracts.stable_coin,
                contracts.reserve_coin,
                contracts.djed,
                decimals,
                None,
            )
            .await?;
        let params = self.gateway.system_params(contracts.djed).await?;

        tracing::info!(
            djed = %contracts.djed,
            sc_decimals = decimals.sc,
            rc_decimals = decimals.rc,
            "Contracts discovered"
        );

        self.state.send_modify(|s| {
            s.chain = Some(handle);
            s.contracts = Some(ContractBundle { contracts, decimals });
            s.coins_details = Some(coins);
            s.system_params = Some(params);
            s.coins_updated_at = Some(Utc::now());
        });
        Ok(())
    }

    /// Silent reconnect: re-request accounts if some were stored, preferring
    /// the wallet's fresh list when it differs from the stored one
    async fn restore_accounts(&self) -> SessionResult<Option<Vec<Address>>> {
        let stored = self.prefs.read_accounts().await;
        if stored.is_empty() {
            tracing::debug!("No stored accounts, skipping silent reconnect");
            return Ok(None);
        }

        let fresh = match self.gateway.request_accounts().await {
            Ok(fresh) => fresh,
            Err(GatewayError::NoAccounts) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if stored.len() != fresh.len() || stored.first() != fresh.first() {
            tracing::info!(
                stored = stored.len(),
                fresh = fresh.len(),
                "Stored accounts are outdated, adopting wallet accounts"
            );
            self.prefs.write_accounts(&fresh).await?;
            Ok(Some(fresh))
        } else {
            Ok(Some(stored))
        }
    }

    /// Replace the live account list; returns whether it changed
    fn replace_accounts(&self, accounts: Vec<Address>) -> bool {
        self.state.send_if_modified(|s| {
            if s.accounts == accounts {
                return false;
            }
            s.accounts = accounts;
            if s.accounts.is_empty() {
                s.clear_account_figures();
            }
            true
        })
    }

    async fn on_accounts_changed(self: &Arc<Self>) {
        // Invalidate anything still in flight for the previous accounts
        self.account_generation.fetch_add(1, Ordering::SeqCst);
        self.chain_generation.fetch_add(1, Ordering::SeqCst);

        self.sync_polling().await;

        let snapshot = self.state.borrow().clone();
        let Some(account) = snapshot.active_account() else {
            tracing::debug!("No active account");
            return;
        };
        tracing::info!(%account, "Active account changed");

        self.check_chain().await;

        match AccountTarget::from_snapshot(&snapshot) {
            Some(target) => self.refresh_account(&target).await,
            None => tracing::debug!("Contracts not discovered, skipping account details"),
        }
    }

    async fn check_chain(&self) {
        let generation = self.chain_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let chain_id = match self.gateway.chain_id().await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read wallet chain id");
                return;
            }
        };

        let expected = self.config.expected_chain_id;
        let wrong = chain_id != expected;
        if wrong {
            tracing::warn!(
                reported = chain_id,
                expected,
                "Wrong chain: {} rather than {}",
                chain_id,
                expected
            );
        } else {
            tracing::info!(chain_id, "Correct chain: {}", chain_id);
        }

        let applied = self.state.send_if_modified(|s| {
            if self.chain_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.chain_id = Some(chain_id);
            s.is_wrong_chain = wrong;
            true
        });
        if !applied {
            tracing::debug!(chain_id, "Dropping stale chain id");
        }
    }

    async fn refresh_account(&self, target: &AccountTarget) {
        let generation = self.account_generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Err(e) = self.load_account_figures(generation, target).await {
            tracing::error!(account = %target.account, error = %e, "Failed to refresh account details");
        }
    }

    /// Account details first, then the budgets derived from its balance
    async fn load_account_figures(&self, generation: u64, target: &AccountTarget) -> GatewayResult<()> {
        let bundle = &target.bundle;
        let details = self
            .gateway
            .account_details(
                &target.handle,
                target.account,
                bundle.stable_coin(),
                bundle.reserve_coin(),
                bundle.decimals,
            )
            .await?;
        let balance = details.unscaled_balance_bc;

        if !self.publish_account_details(generation, target.account, details) {
            tracing::debug!(account = %target.account, "Dropping stale account details");
            return Ok(());
        }

        let budgets = self
            .gateway
            .coin_budgets(bundle.djed(), balance, bundle.decimals)
            .await?;

        if !self.publish_coin_budgets(generation, target.account, budgets) {
            tracing::debug!(account = %target.account, "Dropping stale coin budgets");
        }
        Ok(())
    }

    /// Account figures apply only to the latest request for the active account
    fn is_current_account(&self, s: &SessionSnapshot, generation: u64, account: Address) -> bool {
        self.account_generation.load(Ordering::SeqCst) == generation
            && s.active_account() == Some(account)
    }

    fn publish_account_details(
        &self,
        generation: u64,
        account: Address,
        details: AccountDetails,
    ) -> bool {
        self.state.send_if_modified(|s| {
            if !self.is_current_account(s, generation, account) {
                return false;
            }
            s.account_details = Some(details);
            s.account_updated_at = Some(Utc::now());
            true
        })
    }

    fn publish_coin_budgets(&self, generation: u64, account: Address, budgets: CoinBudgets) -> bool {
        self.state.send_if_modified(|s| {
            if !self.is_current_account(s, generation, account) {
                return false;
            }
            s.coin_budgets = Some(budgets);
            true
        })
    }

    async fn refresh_coins(&self, bundle: ContractBundle) {
        let generation = self.coin_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let details = match self
            .gateway
            .coin_details(
                bundle.stable_coin(),
                bundle.reserve_coin(),
                bundle.djed(),
                bundle.decimals,
                Some(bundle.oracle()),
            )
            .await
        {
            Ok(details) => details,
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh coin details");
                return;
            }
        };

        let applied = self.state.send_if_modified(|s| {
            if self.coin_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.coins_details = Some(details);
            s.coins_updated_at = Some(Utc::now());
            true
        });
        if !applied {
            tracing::debug!("Dropping stale coin details");
        }
    }

    /// Arm both polling tasks while connected, disarm them otherwise
    async fn sync_polling(self: &Arc<Self>) {
        let snapshot = self.state.borrow().clone();
        let target = if self.is_closed() {
            None
        } else {
            AccountTarget::from_snapshot(&snapshot)
        };

        let mut polling = self.polling.lock().await;
        match target {
            Some(target) => {
                polling.coins.set_callback(self.coin_tick(target.bundle));
                polling.account.set_callback(self.account_tick(target));
                polling
                    .account
                    .set_period(Some(self.config.account_details_interval));
                polling
                    .coins
                    .set_period(Some(self.config.coin_details_interval));
            }
            None => {
                polling.account.disarm();
                polling.coins.disarm();
            }
        }
    }

    fn account_tick(self: &Arc<Self>, target: AccountTarget) -> Task {
        let inner = Arc::downgrade(self);
        task(move || {
            let inner = inner.clone();
            let target = target.clone();
            async move {
                if let Some(inner) = inner.upgrade() {
                    inner.refresh_account(&target).await;
                }
            }
        })
    }

    fn coin_tick(self: &Arc<Self>, bundle: ContractBundle) -> Task {
        let inner = Arc::downgrade(self);
        task(move || {
            let inner = inner.clone();
            async move {
                if let Some(inner) = inner.upgrade() {
                    inner.refresh_coins(bundle).await;
                }
            }
        })
    }
}
