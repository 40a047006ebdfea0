//! Rolling daily quota for outbound discovery calls.

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;

/// Tracks outbound discovery calls against a per-day ceiling.
///
/// The window rolls over at UTC midnight. Exhausting the quota makes
/// [`try_acquire`](DailyQuota::try_acquire) fail until the next day;
/// callers are expected to skip the network call entirely in that case.
#[derive(Debug)]
pub struct DailyQuota {
    limit: u32,
    inner: Mutex<QuotaWindow>,
}

#[derive(Debug)]
struct QuotaWindow {
    day: NaiveDate,
    used: u32,
}

impl DailyQuota {
    /// Creates a quota with the given daily limit.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            inner: Mutex::new(QuotaWindow {
                day: Utc::now().date_naive(),
                used: 0,
            }),
        }
    }

    /// Attempts to consume one unit of today's quota.
    ///
    /// Returns `true` and counts the call if quota remains, `false`
    /// otherwise. The day check and the increment happen under one lock
    /// so concurrent callers never overshoot the limit.
    pub fn try_acquire(&self) -> bool {
        let mut window = self.inner.lock();
        let today = Utc::now().date_naive();
        if window.day != today {
            window.day = today;
            window.used = 0;
        }
        if window.used >= self.limit {
            return false;
        }
        window.used += 1;
        true
    }

    /// The configured daily limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Units consumed so far today.
    pub fn used_today(&self) -> u32 {
        let window = self.inner.lock();
        if window.day == Utc::now().date_naive() {
            window.used
        } else {
            0
        }
    }

    /// Units remaining today.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used_today())
    }
}
