//! Tests for lock-free bridge statistics
//!
//! Counters are bumped from host threads and event-loop tasks concurrently
//! and must not lose updates.

use callbridge::stats::StatsSnapshot;
use callbridge::BridgeStats;
use std::sync::Arc;

/// Test basic atomic stats increment
#[compio::test]
async fn test_atomic_stats_single_thread() {
    let stats = BridgeStats::new();

    stats.increment_completions_delivered();
    stats.increment_completions_delivered();
    stats.increment_host_failures();
    stats.increment_events_delivered();
    stats.increment_stale_events();
    stats.increment_foreign_exceptions();
    stats.increment_double_completions();

    assert_eq!(
        stats.snapshot(),
        StatsSnapshot {
            completions_delivered: 2,
            host_failures: 1,
            events_delivered: 1,
            stale_events: 1,
            foreign_exceptions: 1,
            double_completions: 1,
        }
    );
}

/// Test concurrent updates from multiple tasks
#[compio::test]
async fn test_atomic_stats_concurrent_tasks() {
    let stats = Arc::new(BridgeStats::new());

    // Spawn 100 concurrent tasks, each incrementing counters 10 times
    let mut handles = Vec::new();
    for _ in 0..100 {
        let stats_clone = Arc::clone(&stats);
        let handle = compio::runtime::spawn(async move {
            for _ in 0..10 {
                stats_clone.increment_events_delivered();
                stats_clone.increment_completions_delivered();
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(stats.events_delivered(), 1000, "Events delivered mismatch");
    assert_eq!(stats.completions_delivered(), 1000);
}

/// Test that host threads don't lose updates under heavy contention
#[test]
fn test_atomic_stats_no_lost_updates_across_threads() {
    let stats = Arc::new(BridgeStats::new());

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let stats_clone = Arc::clone(&stats);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    stats_clone.increment_stale_events();
                    stats_clone.increment_foreign_exceptions();
                }
            })
        })
        .collect();

    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(stats.stale_events(), 8000);
    assert_eq!(stats.foreign_exceptions(), 8000);
    assert_eq!(stats.host_failures(), 0);
}
