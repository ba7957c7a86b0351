use std::{sync::Arc, time::Duration};

use counter::RateCounter;
use middleware::{global::GlobalLimiter, user::UserRateLimiter};

pub mod counter;

pub mod middleware {
    pub mod global;
    pub mod user;
}

pub fn global_middleware(permits_per_second: u32) -> GlobalLimiter {
    GlobalLimiter::new(permits_per_second)
}

/// Per-identity fixed-window limiter: `max_requests` per `window`.
pub fn user_middleware(
    counter: Arc<dyn RateCounter>,
    max_requests: u64,
    window: Duration,
) -> UserRateLimiter {
    UserRateLimiter::new(counter, max_requests, window)
}
