//! Refresh policy: expiry checks and the proactive-refresh decision

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::AuthError;

/// Thresholds governing when an access token is refreshed.
///
/// All values are in seconds. `refresh_before` opens the proactive window,
/// `clock_skew` pessimistically shortens the token's effective validity, and
/// `min_interval` rate-limits repeated proactive attempts. Reactive refresh
/// (token already expired) ignores `min_interval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Lead window before expiry in which a refresh becomes due
    pub refresh_before: u64,

    /// Assumed clock skew between this client and the server
    pub clock_skew: u64,

    /// Minimum interval between proactive refresh attempts
    pub min_interval: u64,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            refresh_before: 300,
            clock_skew: 60,
            min_interval: 30,
        }
    }
}

impl RefreshPolicy {
    /// Create a policy with the default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the proactive refresh window in seconds
    pub fn with_refresh_before(mut self, seconds: u64) -> Self {
        self.refresh_before = seconds;
        self
    }

    /// Set the assumed clock skew in seconds
    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.clock_skew = seconds;
        self
    }

    /// Set the minimum interval between proactive refreshes in seconds
    pub fn with_min_interval(mut self, seconds: u64) -> Self {
        self.min_interval = seconds;
        self
    }

    /// Build a policy from human-readable duration strings such as `"5m"`.
    ///
    /// Invalid strings are a configuration error and fail here, never at
    /// request time.
    pub fn parse(
        refresh_before: &str,
        clock_skew: &str,
        min_interval: &str,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            refresh_before: parse_duration(refresh_before)?,
            clock_skew: parse_duration(clock_skew)?,
            min_interval: parse_duration(min_interval)?,
        })
    }
}

/// Parse a duration string (`"90"`, `"5m"`, `"2h"`, `"1d"`) into seconds
pub fn parse_duration(input: &str) -> Result<u64, AuthError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AuthError::Config("empty duration string".to_string()));
    }

    let (digits, factor) = match input.chars().last() {
        Some('s') => (&input[..input.len() - 1], 1),
        Some('m') => (&input[..input.len() - 1], 60),
        Some('h') => (&input[..input.len() - 1], 3600),
        Some('d') => (&input[..input.len() - 1], 86400),
        Some(c) if c.is_ascii_digit() => (input, 1),
        _ => {
            return Err(AuthError::Config(format!(
                "invalid duration string: {}",
                input
            )))
        }
    };

    let value: u64 = digits.parse().map_err(|_| {
        AuthError::Config(format!("invalid duration string: {}", input))
    })?;

    value
        .checked_mul(factor)
        .ok_or_else(|| AuthError::Config(format!("duration overflows: {}", input)))
}

/// Whether the token is past its effective expiry.
///
/// Pessimistic: clock skew always shortens the validity window.
pub fn is_expired(expires_at: u64, now: u64, policy: &RefreshPolicy) -> bool {
    now + policy.clock_skew > expires_at
}

/// Whether a still-valid token should be proactively refreshed now
pub fn should_refresh(
    expires_at: u64,
    now: u64,
    last_refresh_at: Option<u64>,
    policy: &RefreshPolicy,
) -> bool {
    // Not yet inside the proactive window
    if expires_at.saturating_sub(now + policy.clock_skew) > policy.refresh_before {
        return false;
    }

    // Rate-limit repeated proactive attempts
    if let Some(last) = last_refresh_at {
        if now.saturating_sub(last) < policy.min_interval {
            return false;
        }
    }

    true
}

/// Current wall clock as Unix seconds
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds_and_units() {
        assert_eq!(parse_duration("90").unwrap(), 90);
        assert_eq!(parse_duration("45s").unwrap(), 45);
        assert_eq!(parse_duration("5m").unwrap(), 300);
        assert_eq!(parse_duration("2h").unwrap(), 7200);
        assert_eq!(parse_duration("1d").unwrap(), 86400);
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("m5").is_err());
        assert!(parse_duration("-3s").is_err());
        assert!(parse_duration("five").is_err());
    }

    #[test]
    fn policy_parse_fails_fast() {
        assert!(RefreshPolicy::parse("5m", "1m", "30s").is_ok());
        assert!(RefreshPolicy::parse("5m", "bogus", "30s").is_err());
    }

    #[test]
    fn expiry_is_pessimistic_about_skew() {
        let policy = RefreshPolicy::default();
        // 60s of skew: a token with exactly 60s left counts as not expired,
        // one second less and it is gone.
        assert!(!is_expired(1060, 1000, &policy));
        assert!(is_expired(1059, 1000, &policy));
    }

    #[test]
    fn proactive_window_boundary() {
        let policy = RefreshPolicy::default();
        let now = 1000;
        // refresh_before=300 + clock_skew=60: due at 360s remaining
        assert!(!should_refresh(now + 361, now, None, &policy));
        assert!(should_refresh(now + 359, now, None, &policy));
        assert!(should_refresh(now + 360, now, None, &policy));
    }

    #[test]
    fn min_interval_rate_limits_proactive_attempts() {
        let policy = RefreshPolicy::default();
        let now = 1000;
        let expires = now + 100;
        assert!(!should_refresh(expires, now, Some(now - 10), &policy));
        assert!(should_refresh(expires, now, Some(now - 30), &policy));
        assert!(should_refresh(expires, now, None, &policy));
    }
}
