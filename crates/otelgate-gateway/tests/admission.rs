#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use otelgate_core::OtelGateError;
use otelgate_gateway::config::AdmissionSection;
use otelgate_gateway::AdmissionController;

fn controller() -> AdmissionController {
    AdmissionController::new(AdmissionSection::default())
}

/// Let spawned tasks observe timers fired by `advance`.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn sixty_requests_pass_and_the_sixty_first_is_limited() {
    let c = controller();
    for _ in 0..60 {
        c.check_limit("user-1").unwrap();
    }
    let err = c.check_limit("user-1").unwrap_err();
    assert!(matches!(err, OtelGateError::RateLimitExceeded));
    assert_eq!(err.http_status(), 429);

    // other principals are unaffected
    c.check_limit("user-2").unwrap();
}

#[tokio::test(start_paused = true)]
async fn window_resets_after_window_ms() {
    let c = controller();
    for _ in 0..60 {
        c.check_limit("user-1").unwrap();
    }
    assert!(c.check_limit("user-1").is_err());

    tokio::time::advance(Duration::from_millis(60_000)).await;
    c.check_limit("user-1").unwrap();
    assert_eq!(c.window_count("user-1"), Some(1));
}

#[tokio::test(start_paused = true)]
async fn end_to_end_burst_then_limited() {
    let c = controller();
    for i in 0..60u64 {
        // spread over the first ten seconds
        if i > 0 && i % 6 == 0 {
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        c.check_limit("user-1").unwrap();
    }

    tokio::time::advance(Duration::from_secs(2)).await;
    let err = c.check_limit("user-1").unwrap_err();
    assert_eq!(err.to_string(), "Rate limit exceeded. Try again later.");
    assert_eq!(err.http_status(), 429);
}

#[tokio::test]
async fn concurrency_cap_and_release() {
    let c = controller();
    for _ in 0..10 {
        c.acquire_slot("user-1").unwrap();
    }
    let err = c.acquire_slot("user-1").unwrap_err();
    assert!(matches!(err, OtelGateError::ConcurrencyExceeded));
    assert_eq!(err.to_string(), "Too many concurrent requests. Try again later.");
    assert_eq!(c.active_slots("user-1"), 10);

    c.release_slot("user-1");
    c.acquire_slot("user-1").unwrap();
}

#[tokio::test]
async fn double_release_never_goes_negative() {
    let c = controller();
    c.acquire_slot("user-1").unwrap();
    c.release_slot("user-1");
    c.release_slot("user-1");
    assert_eq!(c.active_slots("user-1"), 0);
    assert_eq!(c.concurrency_entries(), 0);

    for _ in 0..10 {
        c.acquire_slot("user-1").unwrap();
    }
    assert!(c.acquire_slot("user-1").is_err());
}

#[tokio::test]
async fn slot_guard_releases_on_drop() {
    let c = controller();
    {
        let guard = c.acquire("user-1").unwrap();
        assert_eq!(guard.principal(), "user-1");
        assert_eq!(c.active_slots("user-1"), 1);
    }
    assert_eq!(c.active_slots("user-1"), 0);
    assert_eq!(c.concurrency_entries(), 0);
}

#[tokio::test]
async fn slot_guard_releases_when_future_is_cancelled() {
    let c = controller();
    let held = c.clone();
    let task = tokio::spawn(async move {
        let _guard = held.acquire("user-1").unwrap();
        std::future::pending::<()>().await;
    });
    settle().await;
    assert_eq!(c.active_slots("user-1"), 1);

    task.abort();
    let _ = task.await;
    assert_eq!(c.active_slots("user-1"), 0);
}

#[tokio::test(start_paused = true)]
async fn full_rate_table_evicts_oldest_inserted() {
    let c = controller();
    for i in 0..50_000 {
        c.check_limit(&format!("p{i}")).unwrap();
    }
    assert_eq!(c.rate_entries(), 50_000);

    c.check_limit("newcomer").unwrap();
    assert_eq!(c.rate_entries(), 50_000);
    assert_eq!(c.window_count("p0"), None);
    assert_eq!(c.window_count("p1"), Some(1));
    assert_eq!(c.window_count("newcomer"), Some(1));
}

#[tokio::test(start_paused = true)]
async fn sweep_expired_removes_only_elapsed_windows() {
    let c = controller();
    c.check_limit("early").unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    c.check_limit("late").unwrap();

    assert_eq!(c.sweep_expired(), 0);
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(c.sweep_expired(), 1);
    assert_eq!(c.window_count("early"), None);
    assert_eq!(c.window_count("late"), Some(1));
}

#[tokio::test(start_paused = true)]
async fn background_sweep_runs_and_stops_on_shutdown() {
    let c = controller();
    let handle = c.spawn_sweeper();

    c.check_limit("early").unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    c.check_limit("late").unwrap();

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(c.rate_entries(), 1);
    assert_eq!(c.window_count("late"), Some(1));

    handle.shutdown().await;

    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(c.rate_entries(), 1);
}

#[tokio::test(start_paused = true)]
async fn background_sweep_ends_with_the_controller() {
    let c = controller();
    let handle = c.spawn_sweeper();
    drop(c);

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn independent_controllers_do_not_share_state() {
    let a = controller();
    let b = controller();
    for _ in 0..60 {
        a.check_limit("user-1").unwrap();
    }
    assert!(a.check_limit("user-1").is_err());
    b.check_limit("user-1").unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn guards_dropped_across_threads_leave_no_slots_behind() {
    let c = controller();
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let c = c.clone();
            tokio::spawn(async move {
                for _ in 0..20_000 {
                    if let Ok(guard) = c.acquire("shared") {
                        drop(guard);
                    }
                    if c.acquire_slot("shared").is_ok() {
                        c.release_slot("shared");
                    }
                }
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }

    assert_eq!(c.active_slots("shared"), 0);
    assert_eq!(c.concurrency_entries(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rate_checks_from_many_threads_are_all_counted() {
    let c = AdmissionController::new(AdmissionSection {
        max_requests: 1_000_000,
        ..AdmissionSection::default()
    });
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let c = c.clone();
            tokio::spawn(async move {
                for _ in 0..5_000 {
                    c.check_limit("shared").unwrap();
                }
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }

    assert_eq!(c.window_count("shared"), Some(40_000));
    assert_eq!(c.rate_entries(), 1);
}
