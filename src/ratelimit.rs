use governor::{
    Quota, RateLimiter as GovernorRateLimiter,
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use log::debug;
use nonzero_ext::nonzero;
use rand::Rng;
use std::{num::NonZeroU32, time::Duration};

const DEFAULT_REQ_PER_SEC: NonZeroU32 = nonzero!(2u32);
// No two requests closer than this, whatever the per-second quota allows.
const MS_BETWEEN_REQ: Duration = Duration::from_millis(250);

type SpecificGovernorRateLimiter =
    GovernorRateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

/// Caps the request rate of a single client.
pub struct RateLimiter {
    req_per_sec: SpecificGovernorRateLimiter,
    ms_between_req: SpecificGovernorRateLimiter,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_REQ_PER_SEC);
        let req_per_sec = GovernorRateLimiter::direct(Quota::per_second(per_second));
        let ms_between_req = GovernorRateLimiter::direct(
            Quota::with_period(MS_BETWEEN_REQ).unwrap_or_else(|| Quota::per_second(per_second)),
        );

        RateLimiter {
            req_per_sec,
            ms_between_req,
        }
    }

    pub async fn wait_until_ready(&self) {
        // Average quota first, then the spacing check, so a burst admitted by
        // the first limiter is still released one request at a time.
        self.req_per_sec.until_ready().await;
        self.ms_between_req.until_ready().await;
    }
}

/// Sleeps between review pages of the same attraction: a fixed base delay
/// plus a random jitter.
#[derive(Debug, Clone, Copy)]
pub struct PageThrottle {
    base: Duration,
    jitter: Duration,
}

impl PageThrottle {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        debug!("Sleeping {} ms before next page", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
