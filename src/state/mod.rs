pub mod countdown;
pub mod leaderboard;
pub mod player;
pub mod quiz;
pub mod run;
pub mod scoring;
pub mod state_machine;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, RwLock, mpsc, watch},
    time::Instant,
};

use crate::{
    config::AppConfig,
    dao::session_store::SessionStore,
    error::ServiceError,
    services::{
        identity::{AnonymousIdentityProvider, IdentityProvider},
        nickname_memory::{InMemoryNicknameMemory, NicknameMemory},
        question_source::{QuestionSource, StaticQuestionSource},
    },
    state::{player::PlayerId, run::PlayerRun, state_machine::RunPhase},
};

pub use self::run::QuestionExpired;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

/// Shared handle passed to every handler and background task.
pub type SharedState = Arc<AppState>;
/// Upper bound on the store work done inside one run transition.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state storing store handles, external boundaries and per-player runs.
pub struct AppState {
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    degraded: watch::Sender<bool>,
    runs: DashMap<PlayerId, Arc<Mutex<PlayerRun>>>,
    identity: Arc<dyn IdentityProvider>,
    questions: Arc<dyn QuestionSource>,
    nicknames: Arc<dyn NicknameMemory>,
    config: AppConfig,
    expiry_tx: mpsc::UnboundedSender<QuestionExpired>,
    expiry_rx: Mutex<Option<mpsc::UnboundedReceiver<QuestionExpired>>>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Uses the anonymous identity provider, the configured question pool and an
    /// in-memory nickname memory. The application starts in degraded mode until a
    /// storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let questions = Arc::new(StaticQuestionSource::new(config.questions.clone()));
        Self::with_components(
            config,
            Arc::new(AnonymousIdentityProvider::new()),
            questions,
            Arc::new(InMemoryNicknameMemory::new()),
        )
    }

    /// Construct a state around explicit external boundaries.
    pub fn with_components(
        config: AppConfig,
        identity: Arc<dyn IdentityProvider>,
        questions: Arc<dyn QuestionSource>,
        nicknames: Arc<dyn NicknameMemory>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            session_store: RwLock::new(None),
            degraded: degraded_tx,
            runs: DashMap::new(),
            identity,
            questions,
            nicknames,
            config,
            expiry_tx,
            expiry_rx: Mutex::new(Some(expiry_rx)),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current session store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn set_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let installed = self.session_store.read().await.is_some();
        !installed || *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Identity provider issuing anonymous identities.
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Source of the question pool.
    pub fn questions(&self) -> &Arc<dyn QuestionSource> {
        &self.questions
    }

    /// Per-identity remembered nicknames.
    pub fn nicknames(&self) -> &Arc<dyn NicknameMemory> {
        &self.nicknames
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Bound applied to transition work.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout
    }

    /// Run of `player`, created on the home screen if none exists yet.
    pub fn run_for(&self, player: &PlayerId) -> Arc<Mutex<PlayerRun>> {
        self.runs
            .entry(player.clone())
            .or_insert_with(|| Arc::new(Mutex::new(PlayerRun::new())))
            .value()
            .clone()
    }

    /// Number of players with a hosted run.
    pub fn hosted_runs(&self) -> usize {
        self.runs.len()
    }

    /// Run of `player` if one is hosted.
    pub fn existing_run(&self, player: &PlayerId) -> Option<Arc<Mutex<PlayerRun>>> {
        self.runs.get(player).map(|entry| entry.value().clone())
    }

    /// Stop hosting `handle` if it sits on the home screen and no other request holds it.
    ///
    /// The caller must have released its lock on `handle`.
    pub fn release_run(&self, player: &PlayerId, handle: &Arc<Mutex<PlayerRun>>) -> bool {
        self.runs
            .remove_if(player, |_, hosted| {
                Arc::ptr_eq(hosted, handle)
                    && Arc::strong_count(hosted) == 2
                    && hosted
                        .try_lock()
                        .is_ok_and(|run| run.phase() == RunPhase::Home)
            })
            .is_some()
    }

    /// Drop runs back on the home screen or untouched for `idle`, skipping any in use.
    ///
    /// Returns how many runs were dropped.
    pub fn evict_idle_runs(&self, now: Instant, idle: Duration) -> usize {
        let mut evicted = 0;
        self.runs.retain(|_, hosted| {
            if Arc::strong_count(hosted) > 1 {
                return true;
            }
            let keep = match hosted.try_lock() {
                Ok(run) => run.phase() != RunPhase::Home && run.idle_for(now) < idle,
                Err(_) => true,
            };
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Sender the countdown timers deliver question expiries on.
    pub fn expiry_sender(&self) -> mpsc::UnboundedSender<QuestionExpired> {
        self.expiry_tx.clone()
    }

    /// Hand out the expiry receiver; only the first caller gets it.
    pub async fn take_expiry_receiver(&self) -> Option<mpsc::UnboundedReceiver<QuestionExpired>> {
        self.expiry_rx.lock().await.take()
    }
}
