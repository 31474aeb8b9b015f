//! Tenant-token cache with time-based expiry.
//!
//! The auth handshake yields a bearer token with a declared lifetime (about
//! two hours). Re-exchanging credentials on every API call would triple the
//! request count, so the token is cached for the process lifetime and
//! refreshed when within sixty seconds of expiry. The cache is an explicitly
//! owned object with an injectable [`Clock`] rather than hidden module
//! state, so tests can drive expiry with a fake clock instead of sleeping.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Refresh the token once it is this close to expiring.
const REFRESH_MARGIN_MS: u64 = 60_000;

/// Millisecond wall-clock source.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Production clock backed by the system time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at_ms: u64,
}

/// One cache instance per client; concurrent server instances each keep
/// their own (acceptable staleness, not a correctness hazard).
pub struct TokenCache<C: Clock> {
    clock: C,
    slot: Mutex<Option<CachedToken>>,
}

impl<C: Clock> TokenCache<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            slot: Mutex::new(None),
        }
    }

    /// The cached token, unless it is absent or within the refresh margin.
    pub fn valid(&self) -> Option<String> {
        let now = self.clock.now_ms();
        let slot = self.slot.lock().ok()?;
        slot.as_ref()
            .filter(|t| t.expires_at_ms > now + REFRESH_MARGIN_MS)
            .map(|t| t.token.clone())
    }

    /// Store a freshly exchanged token with its declared lifetime.
    pub fn store(&self, token: String, expire_secs: u64) {
        let expires_at_ms = self.clock.now_ms() + expire_secs * 1000;
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(CachedToken {
                token,
                expires_at_ms,
            });
        }
    }
}
