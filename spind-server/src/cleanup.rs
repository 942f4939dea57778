//! Background cleanup: prune idle rate-limit buckets.

use crate::rate_limit::RateLimiter;
use std::time::Duration;
use tokio::time;

/// Buckets idle this long are full again and can be forgotten.
const BUCKET_IDLE: Duration = Duration::from_secs(600);

pub fn spawn_cleanup_task(limiter: RateLimiter) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let pruned = limiter.prune(BUCKET_IDLE);
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned idle rate-limit buckets");
            }
        }
    })
}
