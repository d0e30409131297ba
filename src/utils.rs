//! Shared TTL arithmetic for the helper layer.

use std::time::{Duration, SystemTime};

/// Resolve an absolute deadline into a relative TTL measured from now.
///
/// Returns `None` when the deadline is at or before the current time; callers
/// treat that as "do not write" rather than creating an already-expired key.
pub fn ttl_until(deadline: SystemTime) -> Option<Duration> {
    match deadline.duration_since(SystemTime::now()) {
        Ok(d) if !d.is_zero() => Some(d),
        _ => None,
    }
}

/// Convert a positive TTL to whole seconds for the store, rounding up.
///
/// Sub-second TTLs round to 1 so a positive duration never degrades to an
/// immediate expiry.
pub fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}
