//! Credential pool and health tracking.
//!
//! The pool is immutable after startup and shared without locking. The
//! [`HealthTracker`] is plain data; the orchestrator owns it behind a mutex.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{GatewayError, Result};

/// Default window after which every credential is considered healthy again.
pub const DEFAULT_RESET_WINDOW: Duration = Duration::from_secs(5 * 60);

/// One opaque authorization token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    #[must_use]
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for the upstream client only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// N interchangeable credentials for the same provider.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Arc<[Credential]>,
}

impl CredentialPool {
    /// Build a pool.
    ///
    /// # Errors
    /// Returns `GatewayError::Config` if no credential is given.
    pub fn new(credentials: Vec<Credential>) -> Result<Self> {
        if credentials.is_empty() {
            return Err(GatewayError::Config(
                "no API credentials configured (set GEMINI_API_KEY)".into(),
            ));
        }
        Ok(Self {
            credentials: credentials.into(),
        })
    }

    /// Build a pool from raw secrets.
    ///
    /// # Errors
    /// Returns `GatewayError::Config` if `secrets` is empty.
    pub fn from_secrets<I, S>(secrets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::new(secrets.into_iter().map(Credential::new).collect())
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.credentials.len()
    }

    /// Credential at `index`. Callers keep `index < size()`.
    #[must_use]
    pub fn credential_at(&self, index: usize) -> &Credential {
        &self.credentials[index]
    }
}

/// Indices currently believed quota-exhausted, with a time-boxed reset.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    pool_size: usize,
    unhealthy: BTreeSet<usize>,
    last_reset: Instant,
    reset_window: Duration,
}

impl HealthTracker {
    #[must_use]
    pub fn new(pool_size: usize, reset_window: Duration) -> Self {
        Self {
            pool_size,
            unhealthy: BTreeSet::new(),
            last_reset: Instant::now(),
            reset_window,
        }
    }

    /// Mark `index` exhausted. Out-of-range indices are ignored.
    pub fn mark_unhealthy(&mut self, index: usize) {
        if index < self.pool_size {
            self.unhealthy.insert(index);
        }
    }

    #[must_use]
    pub fn is_healthy(&self, index: usize) -> bool {
        !self.unhealthy.contains(&index)
    }

    /// Every index in the pool is marked.
    #[must_use]
    pub fn all_unhealthy(&self) -> bool {
        self.unhealthy.len() == self.pool_size
    }

    #[must_use]
    pub fn unhealthy_count(&self) -> usize {
        self.unhealthy.len()
    }

    /// Snapshot of the marked indices, ascending.
    #[must_use]
    pub fn unhealthy(&self) -> Vec<usize> {
        self.unhealthy.iter().copied().collect()
    }

    /// Clear every mark and restart the reset window.
    pub fn clear(&mut self) {
        self.unhealthy.clear();
        self.last_reset = Instant::now();
    }

    /// Clear the set if the reset window has elapsed. Returns whether it cleared.
    pub fn reset_if_stale(&mut self) -> bool {
        if self.last_reset.elapsed() >= self.reset_window {
            self.clear();
            true
        } else {
            false
        }
    }
}
