//! Clock and caller-identity seams.
//!
//! Both are trivial, but hiding them behind traits keeps every timestamp
//! and author stamp controllable in tests.

use chrono::Utc;
use parking_lot::Mutex;
use waymark_protocol::Timestamp;

/// Supplies wall-clock timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time in UTC.
    fn now(&self) -> Timestamp;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A manually advanced clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Moves the clock to a new instant.
    pub fn set(&self, now: Timestamp) {
        *self.now.lock() = now;
    }

    /// Advances the clock by the given number of seconds.
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock();
        *now += chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Supplies the current caller identity for stamping new entities.
///
/// The engine treats the id as opaque and never validates it.
pub trait AuthProvider: Send + Sync {
    /// Returns the current user id, or `None` when signed out.
    fn current_user_id(&self) -> Option<String>;
}

/// An auth provider with a fixed identity.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user_id: Option<String>,
}

impl StaticAuth {
    /// Creates a provider that reports the given user.
    #[must_use]
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// Creates a provider with no signed-in user.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { user_id: None }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
