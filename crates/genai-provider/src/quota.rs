//! Shared daily request quota.
//!
//! One `QuotaState` is created per process and handed to every component
//! that calls a provider, usually behind an `Arc`. The counter is only
//! advanced through a compare-exchange loop, so concurrent callers can never
//! push `used` past `daily_limit`. Day boundaries are explicit: nothing
//! resets on its own.
//!
//! Usage survives process restarts through a small JSON ledger
//! (`{"day": "2025-03-01", "used": 42}`) written with [`QuotaState::save`]
//! and read back with [`QuotaState::load`].

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::Result;

/// Default daily request allowance.
pub const DEFAULT_DAILY_QUOTA: u64 = 100;

#[derive(Debug)]
pub struct QuotaState {
    daily_limit: u64,
    used: AtomicU64,
    day: Mutex<NaiveDate>,
}

impl QuotaState {
    /// Fresh quota for today (UTC).
    pub fn new(daily_limit: u64) -> Self {
        Self::for_day(daily_limit, Utc::now().date_naive())
    }

    pub fn for_day(daily_limit: u64, day: NaiveDate) -> Self {
        Self {
            daily_limit,
            used: AtomicU64::new(0),
            day: Mutex::new(day),
        }
    }

    /// Claim one request. Returns the number of requests left afterwards.
    pub fn try_acquire(&self) -> Result<u64> {
        let mut current = self.used.load(Ordering::Acquire);
        loop {
            if current >= self.daily_limit {
                return Err(ProviderError::QuotaExceeded {
                    used: current,
                    limit: self.daily_limit,
                });
            }
            match self.used.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let remaining = self.daily_limit - (current + 1);
                    if (current + 1) % 10 == 0 {
                        info!(used = current + 1, remaining, "daily quota usage");
                    }
                    return Ok(remaining);
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Start a new quota day, zeroing the counter.
    pub fn reset_for_day(&self, day: NaiveDate) {
        let mut current_day = self.day.lock().unwrap_or_else(|e| e.into_inner());
        *current_day = day;
        self.used.store(0, Ordering::Release);
        debug!(%day, "quota reset");
    }

    /// Reset only if `today` differs from the tracked day. Returns whether a
    /// reset happened.
    pub fn roll_over(&self, today: NaiveDate) -> bool {
        let mut current_day = self.day.lock().unwrap_or_else(|e| e.into_inner());
        if *current_day == today {
            return false;
        }
        let previous = *current_day;
        *current_day = today;
        self.used.store(0, Ordering::Release);
        info!(%previous, %today, "quota day rolled over");
        true
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    pub fn remaining(&self) -> u64 {
        self.daily_limit.saturating_sub(self.used())
    }

    pub fn daily_limit(&self) -> u64 {
        self.daily_limit
    }

    pub fn day(&self) -> NaiveDate {
        *self.day.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_exhausted(&self) -> bool {
        self.used() >= self.daily_limit
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// On-disk record of one day's usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLedger {
    pub day: NaiveDate,
    pub used: u64,
}

impl QuotaState {
    /// Rebuild from a ledger. A ledger for any day other than `today` is
    /// stale and yields a fresh quota.
    pub fn from_ledger(daily_limit: u64, ledger: QuotaLedger, today: NaiveDate) -> Self {
        let quota = Self::for_day(daily_limit, today);
        if ledger.day == today {
            quota.used.store(ledger.used, Ordering::Release);
        } else {
            debug!(ledger_day = %ledger.day, %today, "stale quota ledger ignored");
        }
        quota
    }

    pub fn ledger(&self) -> QuotaLedger {
        QuotaLedger {
            day: self.day(),
            used: self.used(),
        }
    }

    /// Load today's usage from `path`. A missing file means nothing has
    /// been used yet.
    pub fn load(path: &Path, daily_limit: u64) -> Result<Self> {
        Self::load_for_day(path, daily_limit, Utc::now().date_naive())
    }

    pub fn load_for_day(path: &Path, daily_limit: u64, today: NaiveDate) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::for_day(daily_limit, today));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Ledger(format!("{}: {e}", path.display())))?;
        let ledger: QuotaLedger = serde_json::from_str(&content)
            .map_err(|e| ProviderError::Ledger(format!("{}: {e}", path.display())))?;
        let quota = Self::from_ledger(daily_limit, ledger, today);
        info!(
            path = %path.display(),
            used = quota.used(),
            remaining = quota.remaining(),
            "quota ledger loaded"
        );
        Ok(quota)
    }

    /// Write the current usage to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let ledger_err = |e: std::io::Error| ProviderError::Ledger(format!("{}: {e}", path.display()));
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(ledger_err)?;

        let body = serde_json::to_vec_pretty(&self.ledger())
            .map_err(|e| ProviderError::Ledger(e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(ledger_err)?;
        tmp.write_all(&body).map_err(ledger_err)?;
        tmp.persist(path).map_err(|e| ledger_err(e.error))?;
        debug!(path = %path.display(), used = self.used(), "quota ledger saved");
        Ok(())
    }
}

impl Default for QuotaState {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_QUOTA)
    }
}
