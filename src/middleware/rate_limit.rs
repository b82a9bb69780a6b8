use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{Error, Result};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket holding up to `burst` requests, refilled at `rps` per second.
/// One bucket is shared by every request through the layer.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    rps: f64,
    burst: f64,
    bucket: Arc<Mutex<Bucket>>,
}

impl RateLimiter {
    pub fn new(rps: u32) -> Self {
        let rps = f64::from(rps.max(1));
        Self {
            rps,
            burst: rps,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: rps,
                refilled_at: Instant::now(),
            })),
        }
    }

    /// Takes one token, or reports how long until the next one is available.
    pub fn try_acquire(&self) -> std::result::Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> std::result::Result<(), Duration> {
        let mut bucket = self
            .bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rps).min(self.burst);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - bucket.tokens) / self.rps))
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Result<Response> {
    if let Err(wait) = limiter.try_acquire() {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            retry_in_ms = wait.as_millis() as u64,
            "request rejected by rate limiter"
        );
        return Err(Error::RateLimited(wait));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;

    #[test]
    fn burst_is_capped_at_rps() {
        let limiter = RateLimiter::new(2);
        let now = Instant::now();
        assert!(limiter.try_acquire_at(now).is_ok());
        assert!(limiter.try_acquire_at(now).is_ok());
        let wait = limiter.try_acquire_at(now).unwrap_err();
        assert!(wait > Duration::ZERO && wait <= Duration::from_millis(500));
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(4);
        let start = Instant::now();
        for _ in 0..4 {
            assert!(limiter.try_acquire_at(start).is_ok());
        }
        assert!(limiter.try_acquire_at(start).is_err());

        let later = start + Duration::from_millis(250);
        assert!(limiter.try_acquire_at(later).is_ok());
        assert!(limiter.try_acquire_at(later).is_err());

        // An idle period never banks more than one burst.
        let idle = later + Duration::from_secs(60);
        for _ in 0..4 {
            assert!(limiter.try_acquire_at(idle).is_ok());
        }
        assert!(limiter.try_acquire_at(idle).is_err());
    }

    #[test]
    fn zero_rps_still_admits_one() {
        let limiter = RateLimiter::new(0);
        let now = Instant::now();
        assert!(limiter.try_acquire_at(now).is_ok());
        assert!(limiter.try_acquire_at(now).is_err());
    }

    #[test]
    fn rejection_carries_retry_after() {
        let resp = Error::RateLimited(Duration::from_millis(1200)).into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "2");

        let resp = Error::RateLimited(Duration::from_millis(10)).into_response();
        assert_eq!(resp.headers()[header::RETRY_AFTER], "1");
    }
}
