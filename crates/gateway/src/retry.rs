use std::time::Duration;

use caserelay_core::config::LlmConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Exponential delay before retry number `retry` (1-based), capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let mut delay = self.base_delay;
        for _ in 1..retry {
            delay = delay.saturating_mul(2);
            if delay >= self.max_delay {
                break;
            }
        }
        delay.min(self.max_delay)
    }

    /// A server-provided `Retry-After` can lengthen the wait, never past the cap.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(retry);
        match retry_after {
            Some(hint) => hint.max(backoff).min(self.max_delay),
            None => backoff,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Transient,
    Auth,
    Rejected,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        401 | 403 => StatusClass::Auth,
        408 | 429 => StatusClass::Transient,
        500..=599 => StatusClass::Transient,
        _ => StatusClass::Rejected,
    }
}

/// Only 429 and 503 carry a meaningful `Retry-After` for this client.
pub fn honors_retry_after(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// Parses the delta-seconds form of `Retry-After`. HTTP dates are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{classify_status, honors_retry_after, parse_retry_after, RetryPolicy, StatusClass};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(1500),
        }
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = policy();
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(1000));
        assert_eq!(policy.backoff(4), Duration::from_millis(1500));
        assert_eq!(policy.backoff(60), Duration::from_millis(1500));
        assert_eq!(policy.max_attempts(), 5);
    }

    #[test]
    fn retry_after_raises_delay_within_cap() {
        let policy = policy();
        assert_eq!(policy.delay_for(1, Some(Duration::from_secs(1))), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, Some(Duration::from_secs(30))), Duration::from_millis(1500));
        assert_eq!(policy.delay_for(3, Some(Duration::ZERO)), Duration::from_millis(1000));
    }

    #[test]
    fn statuses_are_classified() {
        assert_eq!(classify_status(200), StatusClass::Success);
        assert_eq!(classify_status(401), StatusClass::Auth);
        assert_eq!(classify_status(403), StatusClass::Auth);
        assert_eq!(classify_status(408), StatusClass::Transient);
        assert_eq!(classify_status(429), StatusClass::Transient);
        assert_eq!(classify_status(500), StatusClass::Transient);
        assert_eq!(classify_status(529), StatusClass::Transient);
        assert_eq!(classify_status(400), StatusClass::Rejected);
        assert_eq!(classify_status(404), StatusClass::Rejected);
        assert_eq!(classify_status(422), StatusClass::Rejected);
    }

    #[test]
    fn retry_after_header_parsing() {
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert!(honors_retry_after(429));
        assert!(honors_retry_after(503));
        assert!(!honors_retry_after(500));
    }
}
