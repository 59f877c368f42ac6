//! Renewal readiness

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whether a certificate expiring at `not_after` should be renewed at `now`
///
/// True once `now` reaches `not_after - early_renewal`, including the exact
/// boundary instant. An early renewal period reaching before the minimum
/// representable time is always ready.
pub fn ready_for_renewal(
    not_after: DateTime<Utc>,
    early_renewal: Duration,
    now: DateTime<Utc>,
) -> bool {
    match TimeDelta::from_std(early_renewal)
        .ok()
        .and_then(|d| not_after.checked_sub_signed(d))
    {
        Some(threshold) => now >= threshold,
        None => true,
    }
}
