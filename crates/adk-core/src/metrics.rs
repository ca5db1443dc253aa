//! Global atomic counters for kernel observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI invocation).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    trials_executed: AtomicU64,
    trial_failures: AtomicU64,
    slo_breaches: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            trials_executed: AtomicU64::new(0),
            trial_failures: AtomicU64::new(0),
            slo_breaches: AtomicU64::new(0),
        }
    }

    pub fn inc_runs(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_completed", "counter incremented");
    }

    pub fn inc_failures(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_failed", "counter incremented");
    }

    pub fn inc_trials(&self) {
        self.trials_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "trials_executed", "counter incremented");
    }

    pub fn inc_trial_failures(&self) {
        self.trial_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "trial_failures", "counter incremented");
    }

    pub fn inc_slo_breaches(&self) {
        self.slo_breaches.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "slo_breaches", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_completed = self.runs_completed(),
            runs_failed = self.runs_failed(),
            trials_executed = self.trials_executed(),
            trial_failures = self.trial_failures(),
            slo_breaches = self.slo_breaches(),
        );
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    pub fn trials_executed(&self) -> u64 {
        self.trials_executed.load(Ordering::Relaxed)
    }

    pub fn trial_failures(&self) -> u64 {
        self.trial_failures.load(Ordering::Relaxed)
    }

    pub fn slo_breaches(&self) -> u64 {
        self.slo_breaches.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.runs_completed.store(0, Ordering::Relaxed);
        self.runs_failed.store(0, Ordering::Relaxed);
        self.trials_executed.store(0, Ordering::Relaxed);
        self.trial_failures.store(0, Ordering::Relaxed);
        self.slo_breaches.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_runs();
        m.inc_runs();
        assert_eq!(m.runs_completed(), 2);

        m.inc_trials();
        m.inc_trial_failures();
        assert_eq!(m.trials_executed(), 1);
        assert_eq!(m.trial_failures(), 1);

        m.inc_failures();
        m.inc_slo_breaches();
        assert_eq!(m.runs_failed(), 1);
        assert_eq!(m.slo_breaches(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_runs();
        m.inc_failures();
        m.inc_trials();
        m.inc_trial_failures();
        m.inc_slo_breaches();
        m.reset();
        assert_eq!(m.runs_completed(), 0);
        assert_eq!(m.runs_failed(), 0);
        assert_eq!(m.trials_executed(), 0);
        assert_eq!(m.trial_failures(), 0);
        assert_eq!(m.slo_breaches(), 0);
    }
}
