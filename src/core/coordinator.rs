//! Refresh coordination: decides when wallet data is fetched and publishes
//! the results.
//!
//! Three things can request a fetch: mounting (foreground), a publish on the
//! [`RefreshBus`] (foreground) and the poll timer (background). Every fetch
//! issues the balance and transaction calls concurrently and settles only
//! once both have completed.
//!
//! In-flight policy:
//! - a foreground request while a foreground fetch is in flight is coalesced
//!   into the running one;
//! - a poll tick while any fetch is in flight is skipped;
//! - a foreground fetch supersedes a running background fetch, so `loading`
//!   and `background_fetching` are never both set.
//!
//! Each fetch takes an increasing token when it starts. A settlement older
//! than the last applied one leaves the balance and transactions untouched,
//! so the most recently started fetch wins rather than the slowest one.

use super::balance::BalanceStore;
use super::bus::{RefreshBus, RefreshHandler};
use super::format::{JUST_NOW, elapsed_label, format_quai};
use super::observer::Subscription;
use super::source::{ApiEnvelope, FetchError, Transaction, WalletSource};
use super::tracker::{RequestTracker, TrackerStats};
use chrono::{DateTime, Utc};
use futures::future::join;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const LABEL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_OFFSET: u32 = 10;

/// Balance shown when the API reports no balance.
pub const ZERO_BALANCE: &str = "0 QUAI";
pub const FETCH_FAILED_MESSAGE: &str =
    "Failed to fetch dashboard data. Check the request log for details.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub address: String,
    pub poll_interval: Duration,
    pub label_interval: Duration,
    pub page: u32,
    pub offset: u32,
}

impl CoordinatorConfig {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            poll_interval: POLL_INTERVAL,
            label_interval: LABEL_INTERVAL,
            page: DEFAULT_PAGE,
            offset: DEFAULT_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Visible fetch: mount or manual refresh.
    Foreground,
    /// Silent fetch driven by the poll timer.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ForegroundFetching,
    BackgroundFetching,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshState {
    pub transactions: Vec<Transaction>,
    pub loading: bool,
    pub background_fetching: bool,
    pub error: Option<String>,
    pub last_updated: DateTime<Utc>,
    /// "just now", "12s ago", ...; recomputed every label tick.
    pub updated_label: String,
    pub stats: TrackerStats,
    /// Number of fetches that have settled, successfully or not.
    pub settled: u64,
}

impl RefreshState {
    fn new(stats: TrackerStats) -> Self {
        Self {
            transactions: Vec::new(),
            loading: false,
            background_fetching: false,
            error: None,
            last_updated: Utc::now(),
            updated_label: JUST_NOW.to_string(),
            stats,
            settled: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::ForegroundFetching
        } else if self.background_fetching {
            Phase::BackgroundFetching
        } else {
            Phase::Idle
        }
    }
}

/// Result of one fetch, already interpreted for display.
#[derive(Debug)]
struct Fetched {
    balance: String,
    transactions: Vec<Transaction>,
}

impl Fetched {
    fn from_envelopes(balance: ApiEnvelope, transactions: ApiEnvelope) -> Result<Self, FetchError> {
        let balance = balance
            .balance_wei()
            .map_or_else(|| ZERO_BALANCE.to_string(), format_quai);
        Ok(Self {
            balance,
            transactions: transactions.transactions()?,
        })
    }
}

#[derive(Debug, Default)]
struct Flights {
    next_token: u64,
    foreground: Option<u64>,
    background: Option<u64>,
    applied: u64,
}

struct Shared {
    config: CoordinatorConfig,
    source: Arc<dyn WalletSource>,
    tracker: Arc<RequestTracker>,
    balance: Arc<BalanceStore>,
    flights: Mutex<Flights>,
    /// Token of the last result written to the balance store.
    written: Mutex<u64>,
    /// Runtime clock reading of the last fresh settlement; drives the label.
    fresh_at: Mutex<Instant>,
    state: watch::Sender<RefreshState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl Shared {
    fn flights(&self) -> MutexGuard<'_, Flights> {
        lock(&self.flights)
    }

    /// Claims an in-flight slot for `kind`, or `None` when the policy says
    /// the request should not start a new fetch.
    fn begin(&self, kind: FetchKind) -> Option<u64> {
        let mut flights = self.flights();
        match kind {
            FetchKind::Foreground if flights.foreground.is_some() => {
                debug!("Foreground fetch already in flight, coalescing");
                return None;
            }
            FetchKind::Background if flights.foreground.is_some() || flights.background.is_some() => {
                debug!("Fetch in flight, skipping poll");
                return None;
            }
            _ => {}
        }

        flights.next_token += 1;
        let token = flights.next_token;
        match kind {
            FetchKind::Foreground => {
                flights.foreground = Some(token);
                flights.background = None;
            }
            FetchKind::Background => flights.background = Some(token),
        }

        self.state.send_modify(|state| {
            state.error = None;
            state.loading = flights.foreground.is_some();
            state.background_fetching = flights.background.is_some();
        });
        Some(token)
    }

    fn settle(&self, kind: FetchKind, token: u64, outcome: Result<Fetched, FetchError>) {
        let mut flights = self.flights();
        match kind {
            FetchKind::Foreground if flights.foreground == Some(token) => flights.foreground = None,
            FetchKind::Background if flights.background == Some(token) => flights.background = None,
            _ => {}
        }

        let mut fresh = None;
        let mut failure = None;
        match outcome {
            Ok(fetched) if token > flights.applied => {
                flights.applied = token;
                fresh = Some(fetched);
            }
            Ok(_) => debug!(token, applied = flights.applied, "Discarding stale fetch result"),
            Err(e) => match kind {
                FetchKind::Foreground => {
                    warn!(error = %e, "Dashboard fetch failed");
                    failure = Some(FETCH_FAILED_MESSAGE.to_string());
                }
                FetchKind::Background => debug!(error = %e, "Background fetch failed"),
            },
        }

        drop(flights);

        // Balance handlers run outside the flights lock; `written` keeps the
        // store in token order when two settlements race.
        let transactions = fresh.and_then(|fetched| {
            let mut written = lock(&self.written);
            if token <= *written {
                return None;
            }
            *written = token;
            *lock(&self.fresh_at) = Instant::now();
            self.balance.set(Some(fetched.balance));
            Some(fetched.transactions)
        });

        let stats = self.tracker.snapshot();
        // Re-read so a fetch begun during the store write is not overwritten.
        let flights = self.flights();
        self.state.send_modify(|state| {
            if let Some(transactions) = transactions {
                state.transactions = transactions;
                state.last_updated = Utc::now();
                state.updated_label = JUST_NOW.to_string();
            }
            if failure.is_some() {
                state.error = failure;
            }
            state.loading = flights.foreground.is_some();
            state.background_fetching = flights.background.is_some();
            state.stats = stats;
            state.settled += 1;
        });
    }

    fn refresh_label(&self) {
        let elapsed = lock(&self.fresh_at).elapsed();
        self.state.send_if_modified(|state| {
            let label = elapsed_label(elapsed);
            if label == state.updated_label {
                return false;
            }
            state.updated_label = label;
            true
        });
    }
}

fn spawn_fetch(shared: &Arc<Shared>, kind: FetchKind) {
    if let Some(token) = shared.begin(kind) {
        tokio::spawn(fetch(Arc::clone(shared), kind, token));
    }
}

#[instrument(name = "RefreshFetch", skip(shared))]
async fn fetch(shared: Arc<Shared>, kind: FetchKind, token: u64) {
    let config = &shared.config;
    let (balance, transactions) = join(
        shared.source.fetch_balance(&config.address),
        shared
            .source
            .fetch_transactions(&config.address, config.page, config.offset),
    )
    .await;

    let outcome = balance.and_then(|b| Fetched::from_envelopes(b, transactions?));
    shared.settle(kind, token, outcome);
}

async fn run(shared: Arc<Shared>, mut triggers: mpsc::UnboundedReceiver<FetchKind>) {
    let poll_every = shared.config.poll_interval;
    let mut poll = time::interval_at(Instant::now() + poll_every, poll_every);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let label_every = shared.config.label_interval;
    let mut label = time::interval_at(Instant::now() + label_every, label_every);
    label.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = poll.tick() => spawn_fetch(&shared, FetchKind::Background),
            _ = label.tick() => shared.refresh_label(),
            trigger = triggers.recv() => match trigger {
                Some(kind) => spawn_fetch(&shared, kind),
                None => break,
            },
        }
    }
    debug!("Refresh loop stopped");
}

/// Wires a [`WalletSource`] to the shared stores.
pub struct RefreshCoordinator {
    config: CoordinatorConfig,
    source: Arc<dyn WalletSource>,
    tracker: Arc<RequestTracker>,
    balance: Arc<BalanceStore>,
}

impl RefreshCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        source: Arc<dyn WalletSource>,
        tracker: Arc<RequestTracker>,
        balance: Arc<BalanceStore>,
    ) -> Self {
        Self {
            config,
            source,
            tracker,
            balance,
        }
    }

    /// Starts the poll and label timers, subscribes to `bus` and kicks off
    /// the initial foreground fetch. Must be called inside a Tokio runtime.
    pub fn mount(self, bus: &RefreshBus) -> CoordinatorHandle {
        info!(address = %self.config.address, "Mounting refresh coordinator");
        let (state, _) = watch::channel(RefreshState::new(self.tracker.snapshot()));
        let shared = Arc::new(Shared {
            config: self.config,
            source: self.source,
            tracker: self.tracker,
            balance: self.balance,
            flights: Mutex::new(Flights::default()),
            written: Mutex::new(0),
            fresh_at: Mutex::new(Instant::now()),
            state,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let handler: Arc<RefreshHandler> = Arc::new(move || {
            // The loop may already be gone after unmount.
            let _ = tx.send(FetchKind::Foreground);
        });
        let subscription = bus.subscribe(handler);

        spawn_fetch(&shared, FetchKind::Foreground);
        let task = tokio::spawn(run(Arc::clone(&shared), rx));

        CoordinatorHandle {
            shared,
            task,
            _subscription: subscription,
        }
    }
}

/// A mounted coordinator. Dropping it (or calling [`unmount`]) releases the
/// bus subscription and stops both timers. Fetches already in flight run to
/// completion; their results land in state nobody observes.
///
/// [`unmount`]: CoordinatorHandle::unmount
pub struct CoordinatorHandle {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
    _subscription: Subscription,
}

impl CoordinatorHandle {
    pub fn state(&self) -> RefreshState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.shared.state.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.borrow().phase()
    }

    /// Same as dropping the handle.
    pub fn unmount(self) {}
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        debug!("Unmounting refresh coordinator");
        self.task.abort();
    }
}
