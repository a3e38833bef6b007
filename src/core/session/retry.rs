//! Rate-limit detection and retry classification.
//!
//! Terminal response events are classified into a directive for the session
//! engine: back off and reconnect for rate limits, surface an error for
//! other failures, and quietly clear the processing indicator when the user
//! interrupted the assistant mid-response.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// Wait applied when a rate-limit message carries no parseable duration.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(2);

/// Settle delay between tearing the transport down and restarting it.
pub const RECONNECT_SETTLE_DELAY: Duration = Duration::from_secs(1);

// Matches e.g. "Rate limit reached ... Please try again in 1.5s".
static RATE_LIMIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rate limit.*?try again in ([0-9]*\.?[0-9]+)\s*s").expect("valid regex")
});

/// What the engine should do after a terminal response event.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDirective {
    /// Tear down, wait, and restart the transport
    Backoff(Duration),
    /// Show the error; leave the connection as the transport reports it
    SurfaceError(String),
    /// Clear the processing indicator without surfacing anything
    ClearProcessing,
}

/// True when the message is a rate-limit failure.
pub fn is_rate_limit(message: &str) -> bool {
    message.to_lowercase().contains("rate limit")
}

/// Extract the wait time embedded in a rate-limit message.
///
/// Returns `None` when the message is not a rate limit at all; an
/// unparseable wait in a rate-limit message yields the default.
pub fn parse_rate_limit_wait(message: &str) -> Option<Duration> {
    if !is_rate_limit(message) {
        return None;
    }
    let wait = RATE_LIMIT_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_RATE_LIMIT_WAIT);
    Some(wait)
}

/// Classify a failed response by its error message.
pub fn classify_failure(message: &str) -> RetryDirective {
    match parse_rate_limit_wait(message) {
        Some(wait) => RetryDirective::Backoff(wait),
        None => RetryDirective::SurfaceError(message.to_string()),
    }
}

/// Classify a cancelled response by its reason.
///
/// turn_detected means the user started talking over the assistant, which
/// is normal flow control; other cancellations are equally non-errors.
pub fn classify_cancellation(_reason: Option<&str>) -> RetryDirective {
    RetryDirective::ClearProcessing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wait_from_message() {
        let wait = parse_rate_limit_wait(
            "Rate limit reached for requests. Please try again in 1.5s.",
        );
        assert_eq!(wait, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_wait_integer_seconds() {
        let wait = parse_rate_limit_wait("Rate limit reached. Please try again in 20s.");
        assert_eq!(wait, Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_unparseable_wait_uses_default() {
        let wait = parse_rate_limit_wait("Rate limit exceeded. Please try again later.");
        assert_eq!(wait, Some(DEFAULT_RATE_LIMIT_WAIT));
    }

    #[test]
    fn test_non_rate_limit_message() {
        assert_eq!(parse_rate_limit_wait("The server had an error"), None);
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("Rate limit reached. Please try again in 0.5s."),
            RetryDirective::Backoff(Duration::from_millis(500))
        );
        assert_eq!(
            classify_failure("The model is overloaded"),
            RetryDirective::SurfaceError("The model is overloaded".to_string())
        );
    }

    #[test]
    fn test_classify_cancellation_is_silent() {
        assert_eq!(
            classify_cancellation(Some("turn_detected")),
            RetryDirective::ClearProcessing
        );
        assert_eq!(classify_cancellation(None), RetryDirective::ClearProcessing);
    }
}
