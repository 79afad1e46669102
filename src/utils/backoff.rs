//! Exponential backoff utilities for retry operations.

use crate::constants::{BACKUP_REMOVE_BASE_DELAY_MS, BACKUP_REMOVE_MAX_DELAY_MS};
use std::time::Duration;

/// Delay before retry `attempt` (0-based): 100ms, 200ms, 400ms, capped at 400ms.
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay = BACKUP_REMOVE_BASE_DELAY_MS.saturating_mul(factor).min(BACKUP_REMOVE_MAX_DELAY_MS);
    Duration::from_millis(delay)
}

/// Sleeps for [`backoff_delay`] of `attempt` and returns the next attempt number.
///
/// Blocking, since the finalizer runs before the async runtime starts.
pub fn blocking_backoff_with_delay(attempt: u32) -> u32 {
    std::thread::sleep(backoff_delay(attempt));
    attempt.saturating_add(1)
}
