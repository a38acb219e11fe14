//! Token validity window.

use std::time::{SystemTime, UNIX_EPOCH};

/// Lifetime of every issued token, in seconds.
pub const TOKEN_TTL_SECS: u64 = 3600;

/// Source of wall-clock time, in whole seconds since the unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        // A clock set before 1970 is treated as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// The `[issued_at, expires_at)` interval a token is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub issued_at: u64,
    pub expires_at: u64,
}

impl ValidityWindow {
    pub fn starting_at(issued_at: u64) -> Self {
        Self {
            issued_at,
            expires_at: issued_at.saturating_add(TOKEN_TTL_SECS),
        }
    }

    /// Computes a fresh window from the clock's current reading.
    pub fn now(clock: &dyn Clock) -> Self {
        Self::starting_at(clock.now())
    }
}
