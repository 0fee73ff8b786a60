use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// State the exchange tracks per IP/account rather than per client object.
///
/// Every client built without an explicit context shares [`SharedContext::global`],
/// so a clock-skew correction or a rate-limit reading made by one client is seen
/// by all others in the process. Inject a private context with
/// `RestClientBuilder::with_context` to opt out.
#[derive(Debug, Default)]
pub struct SharedContext {
    clock_shift: AtomicI64,
    used_weight: AtomicU64,
}

static GLOBAL: OnceLock<Arc<SharedContext>> = OnceLock::new();

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance.
    pub fn global() -> Arc<Self> {
        GLOBAL.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// Correction in seconds applied to signed timestamps.
    pub fn clock_shift(&self) -> i64 {
        self.clock_shift.load(Ordering::Acquire)
    }

    /// Apply a relative correction; returns the new shift.
    pub fn adjust_clock_shift(&self, delta: i64) -> i64 {
        self.clock_shift.fetch_add(delta, Ordering::AcqRel) + delta
    }

    pub fn set_clock_shift(&self, seconds: i64) {
        self.clock_shift.store(seconds, Ordering::Release);
    }

    /// Last weight (or order count) reported for the current one-minute window.
    pub fn used_weight(&self) -> u64 {
        self.used_weight.load(Ordering::Acquire)
    }

    pub fn record_used_weight(&self, weight: u64) {
        self.used_weight.store(weight, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_shift_adjusts_incrementally() {
        let ctx = SharedContext::new();
        assert_eq!(ctx.clock_shift(), 0);
        assert_eq!(ctx.adjust_clock_shift(-1), -1);
        assert_eq!(ctx.adjust_clock_shift(-1), -2);
        ctx.set_clock_shift(0);
        assert_eq!(ctx.clock_shift(), 0);
    }

    #[test]
    fn test_global_is_shared() {
        let a = SharedContext::global();
        let b = SharedContext::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
