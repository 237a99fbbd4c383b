//! Constants for the download module (timeouts, retry caps).

use std::time::Duration;

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-request timeout (30 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum honoured Retry-After value; longer server requests are capped.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);
