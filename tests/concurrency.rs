use abuse_gate::infrastructure::mocks::MockClock;
use abuse_gate::{Metrics, RateLimitOptions, RateLimiter, ShardedStore};
use std::sync::{Arc, Barrier};
use std::thread;

const T0: u64 = 1_700_000_000_000;

fn limiter(clock: &MockClock) -> RateLimiter<Arc<ShardedStore>> {
    RateLimiter::new(
        Arc::new(ShardedStore::new()),
        Arc::new(clock.clone()),
        Metrics::new(),
    )
}

#[test]
fn test_same_key_admits_exactly_one() {
    let clock = MockClock::new(T0);
    let limiter = limiter(&clock);
    let options = RateLimitOptions::fixed_window(1, 30_000).unwrap();
    let barrier = Arc::new(Barrier::new(100));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let limiter = limiter.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                limiter
                    .check_and_consume("shared", "general", &options)
                    .allowed
            })
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|allowed| *allowed)
        .count();

    assert_eq!(admitted, 1);
    assert_eq!(limiter.entry("shared", "general").unwrap().count, 1);
}

#[test]
fn test_burst_cap_holds_under_contention() {
    let clock = MockClock::new(T0);
    let limiter = limiter(&clock);
    let options = RateLimitOptions::default();
    let barrier = Arc::new(Barrier::new(50));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                limiter
                    .check_and_consume("shared", "general", &options)
                    .allowed
            })
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|allowed| *allowed)
        .count();

    assert_eq!(admitted, 3);
}

#[test]
fn test_distinct_keys_do_not_interfere() {
    let clock = MockClock::new(T0);
    let limiter = limiter(&clock);
    let options = RateLimitOptions::fixed_window(1, 30_000).unwrap();

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let limiter = limiter.clone();
            thread::spawn(move || {
                let identity = format!("session-{}", i);
                let first = limiter.check_and_consume(&identity, "general", &options);
                let second = limiter.check_and_consume(&identity, "general", &options);
                (first.allowed, second.allowed)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), (true, false));
    }
    assert_eq!(limiter.len(), 32);
}

#[test]
fn test_sweep_during_traffic_keeps_live_entries() {
    let clock = MockClock::new(T0);
    let limiter = limiter(&clock);
    let options = RateLimitOptions::fixed_window(1_000, 30_000).unwrap();

    // Old entries that the sweep should drop
    for i in 0..100 {
        limiter.check_and_consume(&format!("old-{}", i), "general", &options);
    }
    clock.advance_ms(300_001);

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let limiter = limiter.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    let decision =
                        limiter.check_and_consume(&format!("live-{}-{}", w, i), "general", &options);
                    assert!(decision.allowed);
                }
            })
        })
        .collect();

    let sweeper = {
        let limiter = limiter.clone();
        thread::spawn(move || {
            let mut removed = 0;
            for _ in 0..10 {
                removed += limiter.sweep(300_000);
                thread::yield_now();
            }
            removed
        })
    };

    for worker in workers {
        worker.join().unwrap();
    }
    let removed = sweeper.join().unwrap();

    assert_eq!(removed, 100);
    assert_eq!(limiter.len(), 1_000);
    assert_eq!(limiter.metrics().entries_swept(), 100);
}
