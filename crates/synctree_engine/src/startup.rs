//! Deferred/triggered startup scheduling for the sync backend.

use crate::thread_check::ThreadChecker;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use synctree_model::ModelType;

/// How long to wait before starting the backend when nothing has asked
/// for it.
const DEFERRED_INIT_FALLBACK: Duration = Duration::from_secs(10);

/// Whether a start attempt may be deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Start the backend now.
    Immediate,
    /// Defer the start; arm the fallback timer on the first attempt.
    Deferred,
}

/// Polled source of policy and setup-progress signals.
pub trait PolicySource: Send + Sync {
    /// True if sync is disabled by administrative policy.
    fn is_managed(&self) -> bool;
    /// True if the user has explicitly stopped sync.
    fn is_start_suppressed(&self) -> bool;
    /// True once the user has completed initial sync setup.
    fn setup_completed(&self) -> bool;
    /// The signed-in account, if any.
    fn authenticated_account(&self) -> Option<String>;
}

/// Polled auth-token availability.
pub trait TokenService: Send + Sync {
    /// True if a refresh token is available for the account.
    fn refresh_token_available(&self, account_id: &str) -> bool;
}

/// Schedules a single-shot delayed task.
///
/// The controller never cancels a scheduled task; firing is suppressed
/// at fire time by a state-generation check, so a scheduler only needs
/// to run what it was given.
pub trait TaskScheduler: Send + Sync {
    /// Runs `task` once after `delay`.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>);
}

/// A scheduler that spawns onto the ambient tokio runtime.
///
/// Must be used from within a runtime. Pair with a current-thread
/// runtime to keep the controller on its coordination thread.
#[derive(Debug, Default)]
pub struct TokioTaskScheduler;

impl TaskScheduler for TokioTaskScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

/// A scheduler that holds tasks until a test fires them. Intended for
/// tests.
#[derive(Default)]
pub struct ManualTaskScheduler {
    tasks: Mutex<Vec<(Duration, Box<dyn FnOnce() + Send>)>>,
}

impl ManualTaskScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// The delay each pending task was scheduled with.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.tasks.lock().iter().map(|(delay, _)| *delay).collect()
    }

    /// Fires the oldest pending task. Returns false if none waited.
    pub fn fire_next(&self) -> bool {
        let task = {
            let mut tasks = self.tasks.lock();
            if tasks.is_empty() {
                return false;
            }
            tasks.remove(0).1
        };
        task();
        true
    }
}

impl TaskScheduler for ManualTaskScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) {
        self.tasks.lock().push((delay, task));
    }
}

/// Static configuration for the controller.
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Start the backend without waiting for explicit setup.
    pub auto_start: bool,
    /// Allow deferred starts at all. When false, every start attempt
    /// is immediate and data-type triggers are ignored.
    pub deferred_startup_enabled: bool,
    /// Delay before a deferred start is forced.
    pub fallback_timeout: Duration,
}

impl StartupConfig {
    /// Creates a configuration with deferral enabled and the default
    /// fallback timeout.
    #[must_use]
    pub fn new(auto_start: bool) -> Self {
        Self {
            auto_start,
            deferred_startup_enabled: true,
            fallback_timeout: DEFERRED_INIT_FALLBACK,
        }
    }

    /// Disables deferred startup.
    #[must_use]
    pub fn without_deferred_startup(mut self) -> Self {
        self.deferred_startup_enabled = false;
        self
    }

    /// Overrides the fallback timeout.
    #[must_use]
    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Per-instance startup state. `start_backend_time` is the single
/// source of truth for "has the backend been started"; every trigger
/// checks it before acting.
#[derive(Debug, Default)]
struct StartupState {
    received_start_request: bool,
    setup_in_progress: bool,
    start_up_time: Option<Instant>,
    start_backend_time: Option<Instant>,
    /// Bumped by `reset()`; an armed timer carrying a stale generation
    /// is ignored when it fires.
    generation: u64,
}

struct ControllerInner {
    config: StartupConfig,
    policy: Arc<dyn PolicySource>,
    tokens: Arc<dyn TokenService>,
    scheduler: Arc<dyn TaskScheduler>,
    start_backend: Arc<dyn Fn() + Send + Sync>,
    state: Mutex<StartupState>,
}

impl ControllerInner {
    fn try_start(inner: &Arc<ControllerInner>) -> bool {
        if inner.policy.is_managed() {
            return false;
        }
        if inner.policy.is_start_suppressed() {
            return false;
        }
        let Some(account) = inner.policy.authenticated_account() else {
            return false;
        };
        if !inner.tokens.refresh_token_available(&account) {
            return false;
        }

        let (received_start_request, setup_in_progress) = {
            let state = inner.state.lock();
            (state.received_start_request, state.setup_in_progress)
        };

        // Completed setup always starts the backend, deferred unless an
        // explicit request came in. Before setup completes, only active
        // setup or auto-start policy justifies starting, and both need
        // the backend immediately.
        if inner.policy.setup_completed() {
            if received_start_request {
                Self::start_up(inner, StartMode::Immediate)
            } else {
                Self::start_up(inner, StartMode::Deferred)
            }
        } else if setup_in_progress || inner.config.auto_start {
            Self::start_up(inner, StartMode::Immediate)
        } else {
            false
        }
    }

    fn start_up(inner: &Arc<ControllerInner>, mode: StartMode) -> bool {
        enum Outcome {
            ArmTimer(u64),
            StayDeferred,
            Invoke,
            AlreadyStarted,
        }

        let outcome = {
            let mut state = inner.state.lock();
            let first_start = state.start_up_time.is_none();
            if first_start {
                state.start_up_time = Some(Instant::now());
            }
            if mode == StartMode::Deferred && inner.config.deferred_startup_enabled {
                if first_start {
                    Outcome::ArmTimer(state.generation)
                } else {
                    Outcome::StayDeferred
                }
            } else if state.start_backend_time.is_none() {
                state.start_backend_time = Some(Instant::now());
                Outcome::Invoke
            } else {
                Outcome::AlreadyStarted
            }
        };

        match outcome {
            Outcome::ArmTimer(generation) => {
                tracing::debug!(
                    timeout = ?inner.config.fallback_timeout,
                    "deferring backend startup; arming fallback timer"
                );
                let weak = Arc::downgrade(inner);
                inner.scheduler.schedule(
                    inner.config.fallback_timeout,
                    Box::new(move || Self::fallback_timer_expired(&weak, generation)),
                );
                false
            }
            Outcome::StayDeferred => false,
            Outcome::Invoke => {
                tracing::info!("starting sync backend");
                (inner.start_backend)();
                true
            }
            Outcome::AlreadyStarted => true,
        }
    }

    fn fallback_timer_expired(weak: &Weak<ControllerInner>, generation: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        {
            let mut state = inner.state.lock();
            if state.generation != generation {
                // Reset since the timer was armed.
                return;
            }
            if state.start_backend_time.is_some() {
                return;
            }
            if let Some(start_up_time) = state.start_up_time {
                tracing::debug!(
                    deferred_for = ?start_up_time.elapsed(),
                    "deferred startup fallback timer expired; forcing start"
                );
            }
            state.received_start_request = true;
        }
        Self::try_start(&inner);
    }

    fn data_type_requests_startup(inner: &Arc<ControllerInner>, model_type: ModelType) {
        if !inner.config.deferred_startup_enabled {
            tracing::debug!(%model_type, "ignoring data type request for sync startup");
            return;
        }
        {
            let mut state = inner.state.lock();
            if state.start_backend_time.is_some() {
                return;
            }
            match state.start_up_time {
                Some(start_up_time) => tracing::debug!(
                    %model_type,
                    deferred_for = ?start_up_time.elapsed(),
                    "data type requesting sync startup"
                ),
                None => tracing::debug!(%model_type, "data type requesting sync startup"),
            }
            state.received_start_request = true;
        }
        Self::try_start(inner);
    }
}

/// Decides when to invoke backend initialization, given asynchronous
/// triggers and an explicit setup-in-progress signal.
///
/// States are derived from [`StartupState`]: not started
/// (`start_up_time` unset), deferred (`start_up_time` set,
/// `start_backend_time` unset), started (`start_backend_time` set,
/// terminal until [`reset`](StartupController::reset)). The
/// backend-start callback fires at most once per state lifetime.
pub struct StartupController {
    inner: Arc<ControllerInner>,
    thread_checker: ThreadChecker,
}

impl StartupController {
    /// Creates a controller. The backend-start callback is invoked at
    /// most once until [`reset`](StartupController::reset).
    pub fn new(
        config: StartupConfig,
        policy: Arc<dyn PolicySource>,
        tokens: Arc<dyn TokenService>,
        scheduler: Arc<dyn TaskScheduler>,
        start_backend: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                config,
                policy,
                tokens,
                scheduler,
                start_backend,
                state: Mutex::new(StartupState::default()),
            }),
            thread_checker: ThreadChecker::new(),
        }
    }

    /// Attempts to start the backend if every precondition now holds.
    /// Returns true if a start (possibly deferred) was initiated.
    pub fn try_start(&self) -> bool {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        ControllerInner::try_start(&self.inner)
    }

    /// Starts the backend, or arms the fallback timer in deferred
    /// mode. Returns true if the backend is started (now or earlier).
    pub fn start_up(&self, mode: StartMode) -> bool {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        ControllerInner::start_up(&self.inner, mode)
    }

    /// Signals that a data type urgently needs sync running.
    pub fn on_data_type_requests_sync_startup(&self, model_type: ModelType) {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        ControllerInner::data_type_requests_startup(&self.inner, model_type);
    }

    /// Records whether UI-driven setup is currently in progress.
    pub fn set_setup_in_progress(&self, in_progress: bool) {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        self.inner.state.lock().setup_in_progress = in_progress;
    }

    /// True if UI-driven setup is currently in progress.
    #[must_use]
    pub fn setup_in_progress(&self) -> bool {
        self.inner.state.lock().setup_in_progress
    }

    /// True once the backend-start callback has been invoked.
    #[must_use]
    pub fn backend_started(&self) -> bool {
        self.inner.state.lock().start_backend_time.is_some()
    }

    /// Human-readable state, for diagnostics pages.
    #[must_use]
    pub fn backend_state_string(&self) -> &'static str {
        let state = self.inner.state.lock();
        if state.start_backend_time.is_some() {
            "Started"
        } else if state.start_up_time.is_some() {
            "Deferred"
        } else {
            "Not started"
        }
    }

    /// Clears all startup state and invalidates any armed fallback
    /// timer. Used when the engine instance is torn down (sign-out).
    pub fn reset(&self) {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        let mut state = self.inner.state.lock();
        let generation = state.generation.wrapping_add(1);
        *state = StartupState { generation, ..StartupState::default() };
    }
}
