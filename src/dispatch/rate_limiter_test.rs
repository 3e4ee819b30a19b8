use tokio::time::Instant;

use super::rate_limiter::CategoryRateLimiter;
use super::rate_limiter::RateClass;
use crate::DispatchConfig;

#[tokio::test(start_paused = true)]
async fn individual_sends_burst_up_to_the_ceiling_then_pace() {
    let limiter = CategoryRateLimiter::new(&DispatchConfig::default());

    let start = Instant::now();
    for _ in 0..10 {
        limiter.acquire(RateClass::Individual).await;
    }
    // The initial burst drains the bucket without waiting.
    assert_eq!(start.elapsed().as_millis(), 0);

    limiter.acquire(RateClass::Individual).await;
    // The 11th send waits for one refill at 10/s.
    assert!(start.elapsed().as_millis() >= 100);
}

#[tokio::test(start_paused = true)]
async fn broadcasts_are_paced_to_one_per_minute() {
    let limiter = CategoryRateLimiter::new(&DispatchConfig::default());

    let start = Instant::now();
    limiter.acquire(RateClass::Broadcast).await;
    assert_eq!(start.elapsed().as_secs(), 0);

    limiter.acquire(RateClass::Broadcast).await;
    assert!(start.elapsed().as_secs() >= 60);
}

#[tokio::test(start_paused = true)]
async fn classes_do_not_steal_each_other_s_tokens() {
    let limiter = CategoryRateLimiter::new(&DispatchConfig::default());

    limiter.acquire(RateClass::Broadcast).await;
    let start = Instant::now();
    // Individual sends are unaffected by the drained broadcast bucket.
    for _ in 0..5 {
        limiter.acquire(RateClass::Individual).await;
    }
    assert_eq!(start.elapsed().as_millis(), 0);
}
