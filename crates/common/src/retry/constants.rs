// Constants for the retry module
use std::time::Duration;

/// Retry count meaning "retry until the callback succeeds"
pub const RETRY_COUNT_FOREVER: i32 = -1;

/// Default number of retries for the simple policy
pub const DEFAULT_RETRY_COUNT: i32 = 2;

/// Default pause between attempts for the simple policy
pub const DEFAULT_FREQUENCY: Duration = Duration::from_millis(2000);

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Default multiplier for exponential backoff
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;
