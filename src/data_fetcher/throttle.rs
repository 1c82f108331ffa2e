use crate::error::AppError;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::trace;

/// Global request spacer shared by every fetch of a run.
///
/// Callers `acquire` before each request. Timing comes from a `governor`
/// limiter with a burst of one, so consecutive permits are at least
/// `1 / requests_per_second` apart. The lock is held while waiting, so
/// waiters are served one at a time no matter how many workers there are.
pub struct Throttle {
    interval: Duration,
    limiter: DefaultDirectRateLimiter,
    gate: Mutex<()>,
    granted: AtomicU64,
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("interval", &self.interval)
            .field("granted", &self.permits_granted())
            .finish_non_exhaustive()
    }
}

impl Throttle {
    pub fn new(requests_per_second: f64) -> Result<Self, AppError> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(AppError::config_error(format!(
                "requests per second must be a positive number, got {requests_per_second}"
            )));
        }
        let interval = Duration::try_from_secs_f64(1.0 / requests_per_second)
            .map_err(|e| AppError::config_error(format!("invalid request rate: {e}")))?;
        let quota = Quota::with_period(interval).ok_or_else(|| {
            AppError::config_error(format!(
                "requests per second is too high: {requests_per_second}"
            ))
        })?;
        Ok(Throttle {
            interval,
            limiter: RateLimiter::direct(quota),
            gate: Mutex::new(()),
            granted: AtomicU64::new(0),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the next request may be issued.
    pub async fn acquire(&self) {
        let _gate = self.gate.lock().await;
        self.limiter.until_ready().await;
        let n = self.granted.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("Throttle permit {n} granted");
    }

    /// Number of permits handed out so far.
    pub fn permits_granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }
}
