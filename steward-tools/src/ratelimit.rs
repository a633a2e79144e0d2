//! Per-tool sliding-window rate limiter.
//!
//! Each tool keeps an ordered list of call timestamps; entries older than
//! the tool's window are pruned lazily on every check. A sliding window, not
//! a fixed bucket, so bursts across a bucket boundary cannot double the
//! effective budget.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use steward_core::config::RateLimitConfig;
use tracing::debug;

/// The limiter's verdict for one prospective call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Calls left in the current window (excluding the prospective one).
    pub remaining: usize,
    /// When the oldest in-window call expires.
    pub reset_at: Instant,
    /// How long to wait before the next call can be admitted.
    pub retry_after: Option<Duration>,
}

/// Sliding-window call budgets, one window per tool.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    fn limits_for(&self, tool: &str) -> (usize, Duration) {
        match self.config.overrides.get(tool) {
            Some(limit) => (limit.max_calls, Duration::from_millis(limit.window_ms)),
            None => (
                self.config.default_max_calls,
                Duration::from_millis(self.config.default_window_ms),
            ),
        }
    }

    /// Check whether a call to `tool` is currently admitted.
    pub fn check(&mut self, tool: &str) -> RateDecision {
        let (max_calls, window) = self.limits_for(tool);
        let now = Instant::now();
        let entries = self.windows.entry(tool.to_string()).or_default();
        Self::prune(entries, now, window);

        let in_window = entries.len();
        let reset_at = entries
            .front()
            .map(|&oldest| oldest + window)
            .unwrap_or(now);

        if in_window < max_calls {
            RateDecision {
                allowed: true,
                remaining: max_calls - in_window,
                reset_at,
                retry_after: None,
            }
        } else {
            let retry_after = reset_at.saturating_duration_since(now);
            debug!(tool = tool, retry_after_ms = retry_after.as_millis() as u64, "Rate limited");
            RateDecision {
                allowed: false,
                remaining: 0,
                reset_at,
                retry_after: Some(retry_after),
            }
        }
    }

    /// Record a call against `tool`'s window.
    pub fn record(&mut self, tool: &str) {
        self.windows
            .entry(tool.to_string())
            .or_default()
            .push_back(Instant::now());
    }

    /// Remove entries older than the sliding window.
    fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while entries
            .front()
            .is_some_and(|&t| now.duration_since(t) > window)
        {
            entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::config::ToolRateLimit;

    fn limiter(max_calls: usize, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            default_max_calls: max_calls,
            default_window_ms: window_ms,
            overrides: HashMap::new(),
        })
    }

    #[test]
    fn test_allows_until_budget_exhausted() {
        let mut limiter = limiter(3, 60_000);
        for expected_remaining in [3, 2, 1] {
            let decision = limiter.check("file_read");
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            limiter.record("file_read");
        }
        let decision = limiter.check("file_read");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after.is_some());
    }

    #[test]
    fn test_per_tool_isolation() {
        let mut limiter = limiter(1, 60_000);
        limiter.record("file_read");
        assert!(!limiter.check("file_read").allowed);
        assert!(limiter.check("file_write").allowed);
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = limiter(1, 40);
        limiter.record("shell_execute");
        assert!(!limiter.check("shell_execute").allowed);

        std::thread::sleep(Duration::from_millis(50));
        let decision = limiter.check("shell_execute");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[test]
    fn test_two_rapid_checks_after_one_record() {
        let mut limiter = limiter(1, 1_000);
        limiter.record("web_fetch");
        assert!(!limiter.check("web_fetch").allowed);
        assert!(!limiter.check("web_fetch").allowed);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "shell_execute".to_string(),
            ToolRateLimit {
                max_calls: 1,
                window_ms: 60_000,
            },
        );
        let mut limiter = RateLimiter::new(RateLimitConfig {
            default_max_calls: 100,
            default_window_ms: 60_000,
            overrides,
        });

        limiter.record("shell_execute");
        assert!(!limiter.check("shell_execute").allowed);
        // Other tools still use the generous default.
        limiter.record("file_read");
        assert!(limiter.check("file_read").allowed);
    }

    #[test]
    fn test_retry_after_bounded_by_window() {
        let mut limiter = limiter(1, 5_000);
        limiter.record("file_read");
        let decision = limiter.check("file_read");
        let retry_after = decision.retry_after.unwrap();
        assert!(retry_after <= Duration::from_millis(5_000));
    }
}
