//! Credential failover orchestrator.
//!
//! Every upstream call runs through [`Orchestrator::execute`]:
//!
//! ```text
//! SELECT_CREDENTIAL ──▶ INVOKE ──┬─▶ SUCCESS            return result, cursor stays
//!        ▲                       ├─▶ FATAL              return error untouched
//!        │                       └─▶ RECOVERABLE        mark unhealthy, advance cursor
//!        │                                │             (all unhealthy: clear + cooldown)
//!        └────────────────────────────────┘
//!                 budget = 2 × pool size, then OVERLOADED
//! ```
//!
//! Cursor, health marks and counters live in one [`RotationState`] behind a
//! single mutex. The lock is never held across an await, so a cooldown only
//! delays the call that triggered it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{GatewayError, UpstreamError};
use crate::pool::{CredentialPool, HealthTracker, DEFAULT_RESET_WINDOW};
use crate::tier::{ModelHandle, Tier, TierTable};

/// Default pause when every credential is exhausted at once.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Outcome of one upstream invocation.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    /// Quota/rate-limit: rotate and retry.
    Recoverable(UpstreamError),
    /// Anything else: stop and propagate.
    Fatal(UpstreamError),
}

impl<T> Attempt<T> {
    /// Classify a raw call result.
    pub fn classify(result: Result<T, UpstreamError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if err.is_quota() => Self::Recoverable(err),
            Err(err) => Self::Fatal(err),
        }
    }
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailoverStats {
    /// Calls to `execute`.
    pub calls: u64,
    /// Upstream invocations.
    pub attempts: u64,
    /// Quota failures recorded, whether or not this caller moved the cursor.
    pub rotations: u64,
    /// Full-exhaustion pauses.
    pub cooldowns: u64,
    /// Reset-window clears.
    pub self_heals: u64,
    /// Calls that ended in `Overloaded`.
    pub exhaustions: u64,
    /// Calls that ended in a fatal upstream error.
    pub fatal: u64,
}

/// Shared rotation state: the cursor plus the health tracker.
#[derive(Debug)]
pub struct RotationState {
    cursor: usize,
    pool_size: usize,
    health: HealthTracker,
    stats: FailoverStats,
}

/// Result of picking the next credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    /// Every credential was marked; the set was cleared and the caller must pause.
    pub forced_sweep: bool,
}

/// Handle to rotation state shared by every orchestrator over one pool.
pub type SharedRotation = Arc<Mutex<RotationState>>;

impl RotationState {
    #[must_use]
    pub fn new(pool_size: usize, reset_window: Duration) -> Self {
        Self {
            cursor: 0,
            pool_size,
            health: HealthTracker::new(pool_size, reset_window),
            stats: FailoverStats::default(),
        }
    }

    /// Start the cursor at `cursor` (wrapped to the pool).
    #[must_use]
    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor % self.pool_size.max(1);
        self
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Index the next call will try first.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Mark `index` exhausted without moving the cursor.
    pub fn mark_unhealthy(&mut self, index: usize) {
        self.health.mark_unhealthy(index);
    }

    fn self_heal(&mut self) -> bool {
        let healed = self.health.reset_if_stale();
        if healed {
            self.stats.self_heals += 1;
        }
        healed
    }

    /// Skip marked indices. When all are marked, stay put and clear instead.
    pub fn select(&mut self) -> Selection {
        if self.health.all_unhealthy() {
            self.health.clear();
            return Selection {
                index: self.cursor,
                forced_sweep: true,
            };
        }
        while !self.health.is_healthy(self.cursor) {
            self.cursor = (self.cursor + 1) % self.pool_size;
        }
        Selection {
            index: self.cursor,
            forced_sweep: false,
        }
    }

    /// Mark `index` exhausted and move past it.
    ///
    /// Returns true when this left the whole pool marked. The cursor only
    /// moves if no concurrent caller has already moved it.
    pub fn record_quota_failure(&mut self, index: usize) -> bool {
        self.health.mark_unhealthy(index);
        if self.cursor == index {
            self.cursor = (index + 1) % self.pool_size;
        }
        self.stats.rotations += 1;
        self.health.all_unhealthy()
    }
}

/// Picks a live credential for each call and rotates on quota errors.
///
/// Cloning shares the rotation state, so every clone sees the same pool health.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    pool: CredentialPool,
    tiers: Arc<TierTable>,
    state: SharedRotation,
    cooldown: Duration,
}

impl Orchestrator {
    /// Orchestrator with the default 5 minute reset window and 3 second cooldown.
    #[must_use]
    pub fn new(pool: CredentialPool, tiers: TierTable) -> Self {
        Self::with_timing(pool, tiers, DEFAULT_RESET_WINDOW, DEFAULT_COOLDOWN)
    }

    #[must_use]
    pub fn with_timing(
        pool: CredentialPool,
        tiers: TierTable,
        reset_window: Duration,
        cooldown: Duration,
    ) -> Self {
        let state = RotationState::new(pool.size(), reset_window);
        Self {
            pool,
            tiers: Arc::new(tiers),
            state: Arc::new(Mutex::new(state)),
            cooldown,
        }
    }

    /// Orchestrator over existing shared rotation state.
    ///
    /// # Errors
    /// Returns `GatewayError::Config` if the state was built for a different pool size.
    pub fn with_state(
        pool: CredentialPool,
        tiers: TierTable,
        state: SharedRotation,
        cooldown: Duration,
    ) -> Result<Self, GatewayError> {
        let tracked = state.lock().pool_size;
        if tracked != pool.size() {
            return Err(GatewayError::Config(format!(
                "rotation state tracks {tracked} credentials but the pool has {}",
                pool.size()
            )));
        }
        Ok(Self {
            pool,
            tiers: Arc::new(tiers),
            state,
            cooldown,
        })
    }

    /// The shared rotation state.
    #[must_use]
    pub fn state(&self) -> &SharedRotation {
        &self.state
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    #[must_use]
    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    /// Marked indices, ascending.
    #[must_use]
    pub fn unhealthy(&self) -> Vec<usize> {
        self.state.lock().health.unhealthy()
    }

    #[must_use]
    pub fn stats(&self) -> FailoverStats {
        self.state.lock().stats
    }

    /// Run `call` against the pool until it succeeds, fails fatally, or the
    /// retry budget (2 × pool size) is spent.
    ///
    /// `call` receives a handle bound to one credential and the tier's model,
    /// and must perform exactly one upstream request.
    ///
    /// # Errors
    /// - `GatewayError::Upstream` with the first non-quota error, unmodified.
    /// - `GatewayError::Overloaded` once every attempt hit a quota error.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        tier: Tier,
        mut call: F,
    ) -> Result<T, GatewayError>
    where
        F: FnMut(ModelHandle) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let budget = 2 * self.pool.size();
        {
            let mut state = self.state.lock();
            state.stats.calls += 1;
            if state.self_heal() {
                info!(operation, "reset window elapsed, all credentials eligible again");
            }
        }

        let mut last_error = None;
        for attempt in 1..=budget {
            let selection = self.state.lock().select();
            if selection.forced_sweep {
                warn!(
                    operation,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "all credentials exhausted, sweeping pool after cooldown"
                );
                self.pause().await;
            }

            let index = selection.index;
            let handle = self
                .tiers
                .bind(tier, index, self.pool.credential_at(index).clone());
            let model = handle.model().to_string();
            self.state.lock().stats.attempts += 1;

            match Attempt::classify(call(handle).await) {
                Attempt::Success(value) => {
                    debug!(operation, tier = tier.label(), credential = index + 1, %model, attempt, "upstream call succeeded");
                    return Ok(value);
                }
                Attempt::Fatal(err) => {
                    self.state.lock().stats.fatal += 1;
                    warn!(operation, credential = index + 1, %model, error = %err, "upstream call failed");
                    return Err(GatewayError::Upstream(err));
                }
                Attempt::Recoverable(err) => {
                    warn!(operation, tier = tier.label(), credential = index + 1, %model, attempt, error = %err, "quota exhausted, rotating credential");
                    last_error = Some(err);

                    // No sweep after the final attempt: nothing would follow it.
                    let sweep = {
                        let mut state = self.state.lock();
                        let pool_exhausted = state.record_quota_failure(index);
                        if pool_exhausted && attempt < budget {
                            state.health.clear();
                        }
                        pool_exhausted && attempt < budget
                    };
                    if sweep {
                        warn!(
                            operation,
                            cooldown_ms = self.cooldown.as_millis() as u64,
                            "all credentials exhausted, waiting before retry"
                        );
                        self.pause().await;
                    }
                }
            }
        }

        self.state.lock().stats.exhaustions += 1;
        error!(operation, attempts = budget, "credential pool exhausted");
        Err(GatewayError::Overloaded {
            attempts: u32::try_from(budget).unwrap_or(u32::MAX),
            last_error: last_error.unwrap_or_else(|| {
                UpstreamError::Transport("no attempt was made".into())
            }),
        })
    }

    async fn pause(&self) {
        self.state.lock().stats.cooldowns += 1;
        tokio::time::sleep(self.cooldown).await;
    }
}
