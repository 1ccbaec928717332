//! Rolling per-user question quota.
//!
//! All users share one window. When a call arrives after the window's end,
//! every count is reset and the next window ends `window` after that call.
//! The check, the reset and the increment happen under one mutex so
//! concurrent calls for the same user cannot overshoot the limit.

use crate::store::QuotaStore;
use crate::types::QuotaStatus;
use chrono::{DateTime, Duration, Utc};
use coldcase_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default questions per user per window.
pub const DEFAULT_DAILY_LIMIT: u32 = 15;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Proof of one accepted charge, used to refund it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaTicket {
    pub username: String,
    pub used: u32,
    window: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed(QuotaTicket),
    Denied {
        used: u32,
        limit: u32,
        resets_at: DateTime<Utc>,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed(_))
    }

    /// Turn a denial into `DailyLimitReached`.
    pub fn into_result(self) -> AppResult<QuotaTicket> {
        match self {
            QuotaDecision::Allowed(ticket) => Ok(ticket),
            QuotaDecision::Denied {
                limit, resets_at, ..
            } => Err(AppError::DailyLimitReached { limit, resets_at }),
        }
    }
}

#[derive(Debug)]
struct QuotaLedger {
    reset_at: DateTime<Utc>,
    used: HashMap<String, u32>,
}

pub struct QuotaTracker {
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn QuotaStore>>,
    ledger: Mutex<QuotaLedger>,
}

impl std::fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaTracker")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl QuotaTracker {
    /// In-memory tracker; the first window ends `window` from now.
    pub fn new(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let reset_at = clock.now() + window;
        Self {
            limit,
            window,
            clock,
            store: None,
            ledger: Mutex::new(QuotaLedger {
                reset_at,
                used: HashMap::new(),
            }),
        }
    }

    /// Tracker that resumes from, and writes through to, `store`.
    pub fn with_store(
        limit: u32,
        window: Duration,
        clock: Arc<dyn Clock>,
        store: Arc<dyn QuotaStore>,
    ) -> AppResult<Self> {
        let ledger = match store.load_quota()? {
            Some(snapshot) => QuotaLedger {
                reset_at: snapshot.reset_at,
                used: snapshot.used,
            },
            None => {
                let reset_at = clock.now() + window;
                store.reset_window(reset_at)?;
                QuotaLedger {
                    reset_at,
                    used: HashMap::new(),
                }
            }
        };

        Ok(Self {
            limit,
            window,
            clock,
            store: Some(store),
            ledger: Mutex::new(ledger),
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, QuotaLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lazy reset: once past the boundary, clear everyone and start a new window.
    fn roll_window(&self, ledger: &mut QuotaLedger, now: DateTime<Utc>) -> AppResult<()> {
        if now <= ledger.reset_at {
            return Ok(());
        }

        let reset_at = now + self.window;
        if let Some(store) = &self.store {
            store.reset_window(reset_at)?;
        }
        tracing::info!("Quota window reset; next reset at {}", reset_at);

        ledger.used.clear();
        ledger.reset_at = reset_at;
        Ok(())
    }

    /// Charge one question to `username` if the limit allows it.
    pub fn check_and_increment(&self, username: &str) -> AppResult<QuotaDecision> {
        let now = self.clock.now();
        let mut ledger = self.lock();
        self.roll_window(&mut ledger, now)?;

        let used = ledger.used.get(username).copied().unwrap_or(0);
        if used >= self.limit {
            tracing::info!("Quota denied for {} ({}/{})", username, used, self.limit);
            return Ok(QuotaDecision::Denied {
                used,
                limit: self.limit,
                resets_at: ledger.reset_at,
            });
        }

        let used = used + 1;
        if let Some(store) = &self.store {
            store.save_usage(username, used)?;
        }
        ledger.used.insert(username.to_string(), used);

        tracing::debug!("Quota charged for {} ({}/{})", username, used, self.limit);
        Ok(QuotaDecision::Allowed(QuotaTicket {
            username: username.to_string(),
            used,
            window: ledger.reset_at,
        }))
    }

    /// Undo a charge. A ticket from an earlier window is ignored.
    ///
    /// Returns whether anything was refunded.
    pub fn refund(&self, ticket: &QuotaTicket) -> AppResult<bool> {
        let mut ledger = self.lock();
        if ledger.reset_at != ticket.window {
            return Ok(false);
        }

        let Some(used) = ledger.used.get(&ticket.username).copied() else {
            return Ok(false);
        };
        if used == 0 {
            return Ok(false);
        }

        let used = used - 1;
        if let Some(store) = &self.store {
            store.save_usage(&ticket.username, used)?;
        }
        ledger.used.insert(ticket.username.clone(), used);

        tracing::warn!("Refunded quota charge for {}", ticket.username);
        Ok(true)
    }

    /// Usage for `username` in the current window.
    pub fn status(&self, username: &str) -> AppResult<QuotaStatus> {
        let now = self.clock.now();
        let mut ledger = self.lock();
        self.roll_window(&mut ledger, now)?;

        let used = ledger.used.get(username).copied().unwrap_or(0);
        Ok(QuotaStatus {
            used,
            remaining: self.limit.saturating_sub(used),
            limit: self.limit,
            resets_at: ledger.reset_at,
        })
    }
}
